//! Command line flags
//!
//! Every flag is optional. Without flags the server listens on port 6502 on
//! all interfaces and serves the working directory.

use clap::Parser;
use std::path::PathBuf;

/// Serve a directory over HTTP with cross-origin isolation headers.
#[derive(Debug, Default, Clone, Parser)]
#[command(name = "isoserve", version, about)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory to serve
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Address to bind
    #[arg(long, value_name = "IP")]
    pub host: Option<String>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Answer 403 instead of listing directories without an index file
    #[arg(long)]
    pub no_listing: bool,
}
