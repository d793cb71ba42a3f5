//! Repository resolution: join the request's repo name onto the configured
//! root, lexically normalize, and verify the result is still rooted inside the
//! root before it is ever handed to `git`.

use std::path::{Component, Path, PathBuf};

use tokio::process::Command;

use crate::error::{ServerError, ServerResult};

/// Lexically collapse `.`/`..` components without touching the filesystem (the
/// Rust equivalent of `path.normalize` in the source). `..` past the start of the
/// path is simply dropped rather than escaping upward, since the containment
/// check below is the actual security boundary — this just mirrors what
/// `normalize` does before that check runs.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), None | Some(Component::RootDir)) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Reject a raw (pre-normalization) repo name containing an explicit `..`
/// segment or an ASCII control character.
fn validate_raw_name(name: &str) -> ServerResult<()> {
    if name
        .split('/')
        .any(|segment| segment == "..")
    {
        return Err(ServerError::NotFound);
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(ServerError::NotFound);
    }
    Ok(())
}

/// Resolve a repo name to an on-disk path, guaranteeing the result is rooted
/// inside `root` even after normalization collapses `.`/`..` components.
pub fn resolve_repo_path(root: &Path, name: &str) -> ServerResult<PathBuf> {
    validate_raw_name(name)?;

    let root = normalize_path(root);
    let joined = normalize_path(&root.join(name));

    if !joined.starts_with(&root) {
        return Err(ServerError::NotFound);
    }
    Ok(joined)
}

/// A repository is "present" iff its path is accessible as a directory.
pub async fn repo_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Recursively create the directory, then `git init --bare <path>`. Any
/// failure (spawn or non-zero exit) maps to an internal-error response.
pub async fn create_bare_repo(path: &Path) -> ServerResult<()> {
    log::info!("auto-creating bare repository at {}", path.display());

    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ServerError::Internal(format!("failed to create repository directory: {e}")))?;

    let output = Command::new("git")
        .arg("init")
        .arg("--bare")
        .arg(path)
        .output()
        .await
        .map_err(|e| ServerError::Internal(format!("failed to spawn git init: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServerError::Internal(format!(
            "git init --bare failed: {stderr}"
        )));
    }
    Ok(())
}

/// Ensure the repository exists, auto-creating it if configured and absent.
/// RPC requests never auto-create — callers pass `auto_create = false` there.
pub async fn ensure_repo(path: &Path, auto_create: bool) -> ServerResult<()> {
    if repo_exists(path).await {
        return Ok(());
    }
    if !auto_create {
        return Err(ServerError::RepositoryNotFound);
    }
    create_bare_repo(path).await
}
