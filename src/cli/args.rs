//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Forge command-line client
#[derive(Parser)]
#[command(
    name = "forge",
    version = env!("CARGO_PKG_VERSION"),
    about = "Work with a Forge server from the command line",
    styles = clap_cargo_style(),
)]
pub struct Cli {
    /// Path to a custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Make an authenticated REST request
    Api {
        /// Endpoint path (`repos/{owner}/{repo}`) or an absolute URL
        endpoint: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Add a request header (`name: value`); repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Read the request body from a file, or `-` for stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Cache the response for this many seconds
        #[arg(long, value_name = "SECONDS")]
        cache: Option<u64>,

        /// Print the response status line and headers before the body
        #[arg(short, long)]
        include: bool,
    },

    /// Make an authenticated GraphQL request
    Graphql {
        /// Query text, or `@file` to read it from a file
        #[arg(short, long)]
        query: String,

        /// Set a string variable (`key=value`); repeatable
        #[arg(short = 'F', long = "field")]
        fields: Vec<String>,

        /// Cache the response for this many seconds
        #[arg(long, value_name = "SECONDS")]
        cache: Option<u64>,
    },

    /// Show the resolved configuration
    Config,

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Token helpers
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Write a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete every cached response
    Clear,
}

#[derive(Subcommand)]
pub enum AuthAction {
    /// Show how to mint a token carrying additional scopes
    Refresh {
        /// Scope the new token needs; repeatable
        #[arg(short = 's', long = "scope")]
        scopes: Vec<String>,
    },
}
