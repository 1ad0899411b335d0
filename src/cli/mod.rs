//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "invoicedesk", version, about = "QuickBooks Online invoice assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Print the resolved configuration (secrets redacted)
    Config,
}

/// Arguments for `invoicedesk serve`. Flags override the environment.
#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Listen address, e.g. 127.0.0.1:3001
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Path of the conversation JSON file
    #[arg(long)]
    pub conversations: Option<PathBuf>,
}
