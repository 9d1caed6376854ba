//! Interactive search prompt.

use std::io::Write;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::coordinator::{SearchCoordinator, SearchState};
use crate::render;
use crate::searcher::fofa_searcher::{account_or_unknown, Searcher};

#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Exit,
    Help,
    Next,
    Prev,
    Page(u32),
    Size(u32),
    Account,
    Query(String),
    Invalid(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> ShellCommand {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let arg = words.next();
        let numeric = |cmd: fn(u32) -> ShellCommand| match arg.map(str::parse::<u32>) {
            Some(Ok(n)) if n > 0 && words.clone().next().is_none() => cmd(n),
            _ => ShellCommand::Invalid(format!("usage: {head} <number>")),
        };

        match head {
            "" | "exit" | "quit" => ShellCommand::Exit,
            "help" if arg.is_none() => ShellCommand::Help,
            "next" if arg.is_none() => ShellCommand::Next,
            "prev" if arg.is_none() => ShellCommand::Prev,
            "account" if arg.is_none() => ShellCommand::Account,
            "page" => numeric(ShellCommand::Page),
            "size" => numeric(ShellCommand::Size),
            _ => ShellCommand::Query(line.to_string()),
        }
    }
}

/// Paging and size changes re-run the stored query, so they need one.
fn needs_query(command: &ShellCommand, state: &SearchState) -> bool {
    matches!(
        command,
        ShellCommand::Next | ShellCommand::Prev | ShellCommand::Page(_) | ShellCommand::Size(_)
    ) && state.query.trim().is_empty()
}

pub fn print_help() {
    println!("\n📚 Available Commands:");
    println!("- Enter a search query");
    println!("- 'next' / 'prev' to move between pages, 'page N' to jump");
    println!("- 'size N' to change results per page");
    println!("- 'account' to show quota information");
    println!("- Type 'help' to show this help message");
    println!("- Press Enter with empty query to exit or type 'exit'");
    println!("\n💡 Example Queries:");
    println!("domain=\"example.com\"");
    println!("header=\"nginx\"");
    println!("protocol=\"http\" && country=\"US\"");
    println!();
}

pub async fn run<S: Searcher>(coordinator: &SearchCoordinator<S>) -> std::io::Result<()> {
    let mut updates = coordinator.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_size = None;
    print_help();

    loop {
        print!("\n🤔 Query> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = ShellCommand::parse(&line);
        if needs_query(&command, &coordinator.state()) {
            match command {
                ShellCommand::Size(n) => {
                    pending_size = Some(n);
                    println!("Page size set to {n}, it applies to the next query.");
                }
                _ => println!("{}", style("Run a query first.").dim()),
            }
            continue;
        }

        let moved = match command {
            ShellCommand::Exit => {
                println!("👋 Exiting...");
                break;
            }
            ShellCommand::Help => {
                print_help();
                continue;
            }
            ShellCommand::Invalid(usage) => {
                eprintln!("{}", style(usage).yellow());
                continue;
            }
            ShellCommand::Account => {
                let creds = coordinator.credentials();
                let info = account_or_unknown(coordinator.searcher(), &creds).await;
                println!("{}", render::account_badge(&info));
                continue;
            }
            ShellCommand::Next => coordinator.next_page().await,
            ShellCommand::Prev => coordinator.prev_page().await,
            ShellCommand::Page(n) => coordinator.goto_page(n).await,
            ShellCommand::Size(n) => {
                coordinator.perform_search(None, Some(1), Some(n)).await;
                true
            }
            ShellCommand::Query(query) => {
                println!("\n🚀 Searching for: {}", render::highlight(&query, None));
                coordinator
                    .perform_search(Some(&query), Some(1), pending_size.take())
                    .await;
                true
            }
        };

        if !moved {
            println!("{}", style("No page in that direction.").dim());
            continue;
        }
        if updates.has_changed().unwrap_or(false) {
            let state = updates.borrow_and_update().clone();
            println!("\n{}", render::state_view(&state));
        }
    }

    Ok(())
}
