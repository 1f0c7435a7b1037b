//! contactpoints - manage the contact points of an alerting configuration.

use anyhow::Result;
use clap::Parser;
use contactpoints::{app::App, cli::Cli, config::Config};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    debug!(storage = ?config.storage, org_id = %config.org_id, "Configuration loaded");

    let Some(command) = cli.command else {
        error!("No command given; run with --help for usage");
        std::process::exit(2);
    };

    let app = App::builder(config).build()?;
    match app.run(command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}
