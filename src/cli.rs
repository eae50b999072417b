use std::path::PathBuf;

use clap::{Parser, Subcommand};

use darkgather_storage::ExportFormat;

#[derive(Parser)]
#[command(name = "darkgather", about = "Onion site crawler with an encrypted, deduplicated store")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl a hidden service and save what was found
    Scrape {
        /// Seed .onion URL
        #[arg(short, long)]
        url: String,

        /// Link hops to follow from the seed (1-3)
        #[arg(short, long)]
        depth: Option<u32>,
    },
    /// Search hidden services (placeholder results)
    Search {
        #[arg(short, long)]
        query: String,

        /// Max results (10-100)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Store the results
        #[arg(long)]
        save: bool,
    },
    /// Show store statistics, recent scans and proxy reachability
    Status,
    /// Dump decrypted records
    Export {
        /// json (one object per line) or csv
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Irreversibly destroy the database and its key
    Wipe {
        /// Confirm destruction
        #[arg(long)]
        yes: bool,
    },
    /// Request a new Tor circuit
    Renew,
}
