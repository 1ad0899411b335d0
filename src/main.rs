//! invoicedesk server binary.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use invoicedesk::cli::{Cli, Commands, ServeArgs};
use invoicedesk::config::DeskConfig;
use invoicedesk::error::Result;
use invoicedesk::server::{self, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("invoicedesk=info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Config => DeskConfig::from_env().map(|config| println!("{config:#?}")),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut config = DeskConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(path) = args.conversations {
        config.conversations_path = path;
    }
    tracing::debug!(?config, "configuration loaded");

    let state = AppState::from_config(&config).await?;
    let listener = TcpListener::bind(&config.bind).await?;
    server::serve(listener, state).await
}
