use std::path::PathBuf;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use waypack_engine::EngineConfig;

mod cli;
mod commands;
mod error;

use cli::{CliArgs, Command};
use error::AppError;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("waypack.log")?;

    let multi_writer = MakeWriterExt::and(std::io::stdout, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!(
        "waypack {} - offline-first city travel packs",
        env!("CARGO_PKG_VERSION")
    );
    info!("==================================================================");
    info!(origin = %args.origin, catalog = %args.catalog, "Configured upstream");

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./waypack-data"));

    let config = EngineConfig::builder()
        .with_origin(args.origin.clone())
        .with_data_dir(data_dir)
        .with_catalog(args.catalog.clone())
        .build();

    match args.command {
        Command::Catalog => commands::catalog(config).await,
        Command::Status { slug, verify } => commands::status(config, &slug, verify).await,
        Command::Download { slugs } => commands::download(config, &slugs).await,
        Command::Remove { slug } => commands::remove(config, &slug).await,
        Command::List => commands::list(config).await,
        Command::Serve {
            addr,
            manifest,
            public_origin,
        } => commands::serve(config, addr, manifest, public_origin).await,
    }
}
