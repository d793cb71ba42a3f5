//! Entry-point binary: parses CLI config, builds a `GitServer`, registers an
//! `error` logger, and runs until interrupted.

use clap::Parser;
use git_server::config::{Cli, ServerOptions};
use git_server::GitServer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let options = ServerOptions {
        auto_create: cli.auto_create,
    };

    let mut server = GitServer::new(cli.root.clone(), options);

    server.on_error(|message| log::error!("{message}"));

    let addr = server
        .listen(&cli.bind, cli.port)
        .await
        .map_err(std::io::Error::other)?;
    log::info!(
        "serving bare repositories under {} on {addr}",
        cli.root.display()
    );

    tokio::signal::ctrl_c().await?;
    log::info!("received ctrl-c, shutting down");
    server.close().await;

    Ok(())
}
