//! Shared scaffolding for the end-to-end tests: spin up a real `GitServer` on
//! loopback and drive it with the actual `git` binary.

use std::net::SocketAddr;
use std::path::Path;
use std::process::{Command, Output};

use git_server::{GitServer, ServerOptions};

pub async fn start_server(
    root: &Path,
    options: ServerOptions,
    configure: impl FnOnce(&mut GitServer),
) -> (GitServer, SocketAddr) {
    let mut server = GitServer::new(root.to_path_buf(), options);
    configure(&mut server);
    let addr = server
        .listen("127.0.0.1", 0)
        .await
        .expect("server failed to bind");
    (server, addr)
}

/// Run a `git` subcommand with a throwaway identity, so commits don't depend on
/// the host's global `user.name`/`user.email`.
pub fn git(args: &[&str], cwd: &Path) -> Output {
    Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git")
}

/// Create a small local repository with one commit, ready to be pushed.
pub fn init_source_repo(dir: &Path) {
    git(&["init", "-q"], dir);
    std::fs::write(dir.join("README.md"), "hello\n").unwrap();
    git(&["add", "README.md"], dir);
    let status = git(&["commit", "-q", "-m", "initial commit"], dir);
    assert!(status.status.success(), "{:?}", status);
}

pub fn repo_url(addr: SocketAddr, repo: &str) -> String {
    format!("http://{addr}/{repo}")
}

pub fn repo_url_with_auth(addr: SocketAddr, user: &str, pass: &str, repo: &str) -> String {
    format!("http://{user}:{pass}@{addr}/{repo}")
}
