pub mod init;
pub mod normalize;
pub mod profiles;
pub mod report;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kpi-ledger",
    version,
    about = "Normalize monthly accounting statements into categorized KPI transactions."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/kpi-ledger/settings.json)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a settings file and initialize the record store.
    Init {
        /// Path for kpi-ledger data (default: ~/Documents/kpi-ledger)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// List the statement profiles available to --profile.
    Profiles,
    /// Parse, categorize and export a statement.
    Normalize {
        /// Path to the CSV or workbook statement export
        file: String,
        /// Statement profile (default: the one named in settings)
        #[arg(long)]
        profile: Option<String>,
        /// Output path (default: <file>-cleaned.<format> next to the input)
        #[arg(long)]
        output: Option<String>,
        /// Output format: csv or json
        #[arg(long, default_value = "csv")]
        format: String,
        /// Also replace the collection in the local record store
        #[arg(long)]
        upload: bool,
        /// Record store collection (default: the one named in settings)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Summarize a statement.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show settings, record store and last upload.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Monthly revenue, cost, net, cash on hand and runway.
    Monthly {
        /// Path to the statement export
        file: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Revenue and cost per major category.
    Categories {
        /// Path to the statement export
        file: String,
        #[arg(long)]
        profile: Option<String>,
    },
}
