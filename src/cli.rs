use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use thumbbox::config::Config;

#[derive(Parser, Debug)]
#[command(name = "thumbbox")]
#[command(about = "On-demand image thumbnails backed by an object store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP thumbnail server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to
    #[arg(short = 'a', long)]
    pub address: Option<SocketAddr>,

    /// Bucket holding sources and cached thumbnails
    #[arg(short = 'b', long)]
    pub bucket: Option<String>,

    /// Object store endpoint
    #[arg(short = 'e', long)]
    pub endpoint: Option<String>,

    /// Configuration file (defaults to $THUMBBOX_CONFIG or config/thumbbox.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

impl ServerArgs {
    /// Flags win over every other configuration source
    pub fn apply(&self, config: &mut Config) {
        if let Some(address) = self.address {
            config.server.bind_addr = address;
        }
        if let Some(bucket) = &self.bucket {
            config.storage.bucket = bucket.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.storage.endpoint = endpoint.clone();
        }
    }
}
