//! Command-line interface, parsed with clap.

use clap::{Parser, Subcommand};

use crate::config::Config;

/// Caching proxy for the ad-library API
#[derive(Parser, Debug)]
#[command(name = "adlib-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Overrides the listening port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Overrides the storage connection string (empty disables persistence)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Search advertisers once and print the upstream JSON
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        #[arg(long)]
        country_code: Option<String>,
    },

    /// Look up a page's ads once, through the cache
    #[command(alias = "ads")]
    PageAds {
        page_id: String,

        #[arg(long)]
        country_code: Option<String>,
    },

    /// Create default config file
    Init,
}

impl Cli {
    /// Applies command-line overrides, which win over file and environment.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.database_url {
            config.general.database_url.clone_from(url);
        }
    }
}
