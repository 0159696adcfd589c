use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::HttpRecordStore;
use curation::{filter_sort, DeadlineBadge, StatusSelection, ViewConfig};
use shared::{
    domain::{ImportMode, SortMode},
    protocol::OpportunityExport,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/listing.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Writes every local record as JSON, to stdout when no file is given.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Import {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "merge")]
        mode: ImportMode,
    },
    /// Pulls another environment's export and applies the newer records.
    Sync {
        #[arg(long = "from")]
        server_url: String,
    },
    /// Sends the local records to another environment's sync endpoint.
    Push {
        #[arg(long = "to")]
        server_url: String,
    },
    /// Prints the display sequence the listing would show.
    View {
        #[arg(long, default_value = "active")]
        statuses: String,
        #[arg(long, default_value = "default")]
        sort: SortMode,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        include_archived: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open database {}", cli.database_url))?;

    match cli.command {
        Command::Export { out } => {
            let records = storage.export_opportunities().await?;
            let json = serde_json::to_string_pretty(&records)?;
            match out {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(records = records.len(), path = %path.display(), "export written");
                }
                None => println!("{json}"),
            }
        }
        Command::Import { file, mode } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records: Vec<OpportunityExport> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not an opportunity export", file.display()))?;
            let report = storage.import_opportunities(mode, &records).await?;
            println!(
                "created={} updated={} skipped={}",
                report.created, report.updated, report.skipped
            );
            for error in &report.errors {
                eprintln!("{error}");
            }
        }
        Command::Sync { server_url } => {
            let remote = HttpRecordStore::new(server_url.as_str());
            let records = remote
                .export()
                .await
                .with_context(|| format!("failed to export from {server_url}"))?;
            let report = storage.sync_opportunities(&records).await?;
            println!(
                "created={} updated={} unchanged={}",
                report.created, report.updated, report.unchanged
            );
            for error in &report.errors {
                eprintln!("{error}");
            }
        }
        Command::Push { server_url } => {
            let records = storage.export_opportunities().await?;
            let remote = HttpRecordStore::new(server_url.as_str());
            let report = remote
                .sync(records)
                .await
                .with_context(|| format!("failed to sync into {server_url}"))?;
            println!(
                "created={} updated={} unchanged={}",
                report.created, report.updated, report.unchanged
            );
            for error in &report.errors {
                eprintln!("{error}");
            }
        }
        Command::View {
            statuses,
            sort,
            search,
            include_archived,
        } => {
            let now = Utc::now();
            let view = ViewConfig::public(now)
                .with_statuses(StatusSelection::parse_list(&statuses)?)
                .with_sort(sort)
                .with_search(search)
                .with_include_archived(include_archived);
            let records = storage.list_opportunities(&view.list_query()).await?;
            for record in filter_sort(&records, &view) {
                let badge = DeadlineBadge::classify(record.deadline, now);
                println!(
                    "{}\t{}\t{} ({})",
                    record.id,
                    badge.label(),
                    record.title,
                    record.provider
                );
            }
        }
    }

    Ok(())
}
