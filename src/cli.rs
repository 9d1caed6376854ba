use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::coordinator::DEFAULT_PAGE_SIZE;

/// fofax - search FOFA-compatible asset APIs from the terminal
#[derive(Parser, Debug)]
#[command(name = "fofax", version, about = "Search FOFA-compatible network asset APIs", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// API base URL for this run (not persisted)
    #[arg(long, value_name = "URL", env = "FOFAX_API_URL", global = true)]
    pub api_url: Option<String>,

    /// API key for this run (not persisted)
    #[arg(
        long,
        value_name = "KEY",
        env = "FOFAX_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Request timeout in seconds (default: none)
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one search and print a page of results
    Search {
        /// Query, e.g. title="nginx" && country="US"
        query: String,

        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
        size: u32,

        /// Print the search state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive search prompt (default)
    Shell,

    /// Show or change the stored API credentials
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show account and quota information
    Account,

    /// Print the syntax-highlighted form of a query
    Highlight {
        query: String,

        /// Cursor position in characters
        #[arg(long)]
        cursor: Option<usize>,
    },

    /// Fetch every page of a query and write one URL per line
    Export {
        query: String,

        #[arg(short, long, default_value = "output.txt")]
        output: PathBuf,

        /// Results per page
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
        size: u32,

        /// Stop after this many pages
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        max_pages: u32,

        /// Concurrent page requests
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..))]
        threads: u8,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current credentials with the key masked
    Show,

    /// Validate against the account endpoint, then save
    Set {
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        key: Option<String>,
    },

    /// Restore the default URL and clear the key
    Reset,
}
