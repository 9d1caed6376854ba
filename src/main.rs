use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use fofax::cli::{Cli, Command, SettingsAction};
use fofax::coordinator::{Phase, SearchCoordinator};
use fofax::searcher::export::{write_export, PageFetcher};
use fofax::searcher::fofa_searcher::{account_or_unknown, FofaSearcher, SearchRequest};
use fofax::settings::CredentialStore;
use fofax::{app_dirs, formatter, logging, render, shell};

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

async fn run_search(
    coordinator: &SearchCoordinator<FofaSearcher>,
    query: &str,
    page: u32,
    size: u32,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query is empty");
    }

    let pb = spinner("Searching...");
    coordinator
        .perform_search(Some(query), Some(page), Some(size))
        .await;
    pb.finish_and_clear();

    let state = coordinator.state();
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("🔍 {}\n", render::highlight(query, None));
        println!("{}", render::state_view(&state));
    }
    if state.phase() == Phase::Failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_settings(
    store: &CredentialStore,
    searcher: &FofaSearcher,
    action: SettingsAction,
) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let creds = store.current();
            println!("{} {}", style("API URL:").bold(), creds.api_url);
            println!("{} {}", style("API Key:").bold(), creds.masked_key());
            println!("{} {}", style("File:").dim(), store.path().display());
        }
        SettingsAction::Set { url, key } => {
            let current = store.current();
            let url = url.unwrap_or(current.api_url);
            let key = key.unwrap_or(current.api_key);

            let pb = spinner("Validating...");
            let saved = store.validate_and_save(searcher, &url, &key).await;
            pb.finish_and_clear();

            let saved = saved.context("settings were not saved")?;
            println!(
                "{} settings saved ({} / {})",
                style("✓").green().bold(),
                saved.api_url,
                saved.masked_key()
            );
        }
        SettingsAction::Reset => {
            store.reset().await?;
            println!("{} settings reset to defaults", style("✓").green().bold());
        }
    }
    Ok(())
}

async fn run_export(
    store: &CredentialStore,
    searcher: &FofaSearcher,
    query: &str,
    output: &Path,
    size: u32,
    max_pages: u32,
    threads: u8,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query is empty");
    }
    println!("🚀 Exporting: {}", render::highlight(query, None));

    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages")?
            .progress_chars("#>-"),
    );

    let request = SearchRequest::new(query).with_size(size);
    let fetcher = PageFetcher::new(searcher, store.current(), threads);
    let summary = fetcher.fetch_all(&request, max_pages, Some(&pb)).await;
    pb.finish_and_clear();
    let summary = summary.context("export failed")?;

    let written = write_export(output, &summary.items)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("\n📊 Search Statistics:");
    println!("   Total Results: {}", summary.total);
    println!("   Pages: {}/{}", summary.fetched_pages, summary.pages);
    println!("   Results per Page: {size}");
    println!(
        "\n✨ Wrote {} targets to {}",
        style(written).cyan().bold(),
        output.display()
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let store = CredentialStore::new(app_dirs::config_dir()?);
    let searcher = FofaSearcher::new(cli.timeout.map(Duration::from_secs))?;
    let coordinator = SearchCoordinator::new(searcher, store.subscribe());

    store.load().await;
    store.apply_overrides(cli.api_url, cli.api_key);

    match cli.command.unwrap_or(Command::Shell) {
        Command::Search {
            query,
            page,
            size,
            json,
        } => run_search(&coordinator, &query, page, size, json).await?,
        Command::Shell => {
            println!("\n🔍 FOFA Search CLI");
            if store.current().api_key.is_empty() {
                println!(
                    "{} no API key set, run `fofax settings set --key <KEY>`",
                    style("⚠").yellow()
                );
            }
            shell::run(&coordinator).await?;
        }
        Command::Settings { action } => {
            run_settings(&store, coordinator.searcher(), action).await?
        }
        Command::Account => {
            let info = account_or_unknown(coordinator.searcher(), &store.current()).await;
            println!("{}", render::account_badge(&info));
        }
        Command::Highlight { query, cursor } => {
            println!("{}", render::highlight(&query, cursor));
            if let Some(formatted) = formatter::format_query(&query, cursor) {
                for segment in &formatted.segments {
                    println!("  {:<8} {:?}", segment.role.class(), segment.text);
                }
                if let Some((index, offset)) = formatted.caret() {
                    println!("  {:<8} segment {index}, offset {offset}", "caret");
                }
            }
        }
        Command::Export {
            query,
            output,
            size,
            max_pages,
            threads,
        } => {
            run_export(
                &store,
                coordinator.searcher(),
                &query,
                &output,
                size,
                max_pages,
                threads,
            )
            .await?
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}
