mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use thumbbox::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let mut config = match &args.config {
                Some(path) => Config::load_with_file(path.clone())?,
                None => Config::load()?,
            };
            args.apply(&mut config);
            config.validate()?;

            thumbbox::api::run(config).await?
        }
    }

    Ok(())
}
