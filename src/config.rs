use std::path::PathBuf;

use clap::Parser;

/// CLI/config surface for the entry-point binary (`src/main.rs`). The core
/// library never parses argv itself; this struct exists so the binary has a
/// real configuration layer instead of hardcoded values.
#[derive(Debug, Parser)]
#[command(name = "git-server", about = "Smart-HTTP Git server")]
pub struct Cli {
    /// Address to bind the HTTP listener on.
    #[arg(long, env = "GIT_SERVER_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on; 0 requests an OS-assigned port.
    #[arg(long, env = "GIT_SERVER_PORT", default_value_t = 0)]
    pub port: u16,

    /// Root directory holding bare repositories.
    #[arg(long, env = "GIT_SERVER_ROOT")]
    pub root: PathBuf,

    /// Create missing repositories on demand via `git init --bare`.
    #[arg(long, env = "GIT_SERVER_AUTO_CREATE", default_value_t = false)]
    pub auto_create: bool,
}

/// The runtime options record: `{auto_create}`, minus the CLI plumbing.
/// `GitServer::new` takes this, not argv.
#[derive(Clone, Default)]
pub struct ServerOptions {
    pub auto_create: bool,
}
