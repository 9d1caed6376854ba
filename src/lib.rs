//! fofax: terminal client for FOFA-compatible network asset search APIs.
//!
//! - [`formatter`] tokenizes `key=value && key=value` queries for highlighting
//! - [`coordinator`] runs searches and publishes [`coordinator::SearchState`]
//! - [`searcher`] talks to the remote `/search/all` and `/info/my` endpoints
//! - [`settings`] persists the API URL and key
//! - [`render`] turns all of the above into terminal output
//!
//! ```no_run
//! use fofax::coordinator::SearchCoordinator;
//! use fofax::searcher::fofa_searcher::FofaSearcher;
//! use fofax::settings::CredentialStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::new("/tmp/fofax");
//! let coordinator = SearchCoordinator::new(FofaSearcher::new(None)?, store.subscribe());
//! store.load().await;
//! coordinator.perform_search(Some("title=\"nginx\""), None, None).await;
//! println!("{}", fofax::render::state_view(&coordinator.state()));
//! # Ok(())
//! # }
//! ```

pub mod app_dirs;
pub mod cli;
pub mod coordinator;
pub mod deserializer;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod render;
pub mod searcher;
pub mod settings;
pub mod shell;

pub use error::{SearchError, SettingsError};
