use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Offline-first city travel pack tool",
    long_about = "Browse a catalog of city travel packs and make individual packs\n\
                  available offline. Downloads are recorded in a durable ledger and\n\
                  served cache-first by the gateway, so a downloaded pack keeps\n\
                  working with no network at all."
)]
pub struct CliArgs {
    /// Upstream origin serving /data/<catalog>/ resources
    #[arg(
        long,
        global = true,
        default_value = "http://127.0.0.1:4173",
        help = "Upstream origin serving pack data"
    )]
    pub origin: String,

    /// Data directory for the content store and the download ledger
    #[arg(
        long,
        global = true,
        help = "Directory holding the content store and ledger (default: ./waypack-data)"
    )]
    pub data_dir: Option<PathBuf>,

    /// Catalog name under /data/
    #[arg(long, global = true, default_value = "city-packs")]
    pub catalog: String,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the packs the upstream catalog offers
    Catalog,

    /// Show the download status of one pack
    Status {
        slug: String,

        /// Also verify that the cached resource physically exists
        #[arg(long)]
        verify: bool,
    },

    /// Make one or more packs available offline
    Download {
        #[arg(required = true)]
        slugs: Vec<String>,
    },

    /// Drop a pack from offline availability
    Remove { slug: String },

    /// List downloaded packs, most recent first
    List,

    /// Run the offline-first gateway
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: SocketAddr,

        /// Precache manifest produced by the frontend build
        #[arg(long, help = "Path to a precache manifest JSON file")]
        manifest: Option<PathBuf>,

        /// Externally visible base URL used in identity descriptors
        #[arg(long, help = "Public origin for identity start_url/scope (default: the listen address)")]
        public_origin: Option<String>,
    },
}
