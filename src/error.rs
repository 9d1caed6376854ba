//! Error types shared by the search client, the coordinator and the
//! credential store.

use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of a single round trip to the remote search service.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("search API request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error("{0}")]
    Api(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("invalid query format")]
    InvalidQuery,

    #[error("invalid API url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("internal concurrency error")]
    Semaphore,
}

impl SearchError {
    /// Message shown to the user once a search has failed.
    ///
    /// Service-provided messages pass through untouched, everything else
    /// collapses into one generic line.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Api(msg) if !msg.trim().is_empty() => msg.clone(),
            SearchError::Api(_) => "Unknown API error".to_string(),
            _ => GENERIC_SEARCH_FAILURE.to_string(),
        }
    }
}

pub const GENERIC_SEARCH_FAILURE: &str = "Failed to perform search. Please try again.";

/// Failures around persisted API credentials.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to determine the configuration directory")]
    ConfigDir,

    #[error("{0}")]
    Validation(String),
}
