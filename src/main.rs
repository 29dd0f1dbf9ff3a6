mod categorizer;
mod cli;
mod db;
mod error;
mod exporter;
mod fmt;
mod importer;
mod models;
mod reports;
mod settings;

use std::path::PathBuf;

use clap::Parser;

use cli::normalize::NormalizeArgs;
use cli::{Cli, Commands, ReportCommands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Some(path) = cli.config {
        settings::set_config_path(PathBuf::from(settings::shellexpand_path(&path)));
    }

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Profiles => cli::profiles::run(),
        Commands::Normalize {
            file,
            profile,
            output,
            format,
            upload,
            collection,
        } => cli::normalize::run(NormalizeArgs {
            file,
            profile,
            output,
            format,
            upload,
            collection,
        }),
        Commands::Report { command } => match command {
            ReportCommands::Monthly { file, profile } => {
                cli::report::monthly(&file, profile.as_deref())
            }
            ReportCommands::Categories { file, profile } => {
                cli::report::categories(&file, profile.as_deref())
            }
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        log::debug!("{e:?}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
