//! Async `git` subprocess spawning and the streaming stdin/stdout bridge.
//!
//! A spawned task copies the caller's input into the child's stdin, stdout is
//! read chunk-by-chunk and forwarded over an mpsc channel that becomes the
//! response body's `async-stream`, and stderr lines are logged rather than
//! buffered — three independent data movements so a slow client, a slow `git`
//! child, and stderr chatter never block on each other.

use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, AsyncBufReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::{ServerError, ServerResult};

/// Which Git service to run, and in which mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceName {
    UploadPack,
    ReceivePack,
}

impl ServiceName {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::UploadPack => "upload-pack",
            ServiceName::ReceivePack => "receive-pack",
        }
    }

    pub fn from_query_value(value: &str) -> Option<Self> {
        match value {
            "git-upload-pack" => Some(ServiceName::UploadPack),
            "git-receive-pack" => Some(ServiceName::ReceivePack),
            _ => None,
        }
    }

    pub fn advertisement_content_type(self) -> String {
        format!("application/x-git-{}-advertisement", self.as_str())
    }

    pub fn result_content_type(self) -> String {
        format!("application/x-git-{}-result", self.as_str())
    }
}

/// Spawn `git <service> --stateless-rpc [--advertise-refs] <repo_path>` with
/// piped stdio.
fn spawn(repo_path: &Path, service: ServiceName, advertise_refs: bool) -> std::io::Result<Child> {
    let mut cmd = Command::new("git");
    cmd.arg(service.as_str()).arg("--stateless-rpc");
    if advertise_refs {
        cmd.arg("--advertise-refs");
    }
    cmd.arg(repo_path);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.spawn()
}

/// Log the child's stderr line-by-line as it arrives, rather than buffering it —
/// keeps stderr handling independent of the stdin/stdout data movements.
fn forward_stderr(stderr: tokio::process::ChildStderr, repo: String, service: ServiceName) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log::warn!("git {} [{repo}]: {line}", service.as_str());
        }
    });
}

/// Run the advertisement phase: spawn with `--advertise-refs`, collect stdout
/// in full (advertisements are small — a ref list, not a pack), and report the
/// exit status.
pub async fn run_advertisement(
    repo_path: &Path,
    service: ServiceName,
    repo_name: &str,
) -> ServerResult<Vec<u8>> {
    let mut child = spawn(repo_path, service, true)
        .map_err(|e| ServerError::Internal(format!("failed to spawn git {}: {e}", service.as_str())))?;

    // No client input for the advertisement phase; close stdin immediately so
    // git does not wait on it.
    drop(child.stdin.take());

    if let Some(stderr) = child.stderr.take() {
        forward_stderr(stderr, repo_name.to_string(), service);
    }

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ServerError::Internal("git child has no stdout".into()))?;
    let mut out = Vec::new();
    stdout
        .read_to_end(&mut out)
        .await
        .map_err(|e| ServerError::Internal(format!("failed to read git stdout: {e}")))?;

    let status = child
        .wait()
        .await
        .map_err(|e| ServerError::Internal(format!("failed to wait on git: {e}")))?;
    if !status.success() {
        return Err(ServerError::Internal(format!(
            "git {} --advertise-refs exited with {status}",
            service.as_str()
        )));
    }
    Ok(out)
}

/// The channel-backed stream handed to the actix response body. Bounded so a
/// slow HTTP client applies backpressure all the way back to the `git`
/// child's stdout pipe.
pub type StdoutStream = mpsc::Receiver<std::io::Result<Bytes>>;

/// Spawn `git <service> --stateless-rpc <repo_path>` and wire:
/// - `input`: an async byte stream already resumed from the paused request
///   buffer, copied into the child's stdin.
/// - stdout: read in bounded chunks and forwarded over the returned channel,
///   which the caller turns into the streaming HTTP response body.
///
/// Reads the first stdout chunk (or the child's immediate exit, if it closes
/// stdout before producing any output) before returning, so the caller can
/// build the response headers knowing the child has actually started cleanly.
/// Once this returns `Ok`, the remaining copy/wait machinery runs in a
/// background task so the caller can stream the rest of the response body as
/// it arrives, without blocking on the child's full output or exit.
pub async fn run_rpc_streaming(
    repo_path: &Path,
    service: ServiceName,
    repo_name: &str,
    mut input: mpsc::Receiver<Bytes>,
) -> ServerResult<StdoutStream> {
    let mut child = spawn(repo_path, service, false)
        .map_err(|e| ServerError::Internal(format!("failed to spawn git {}: {e}", service.as_str())))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ServerError::Internal("git child has no stdin".into()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ServerError::Internal("git child has no stdout".into()))?;
    if let Some(stderr) = child.stderr.take() {
        forward_stderr(stderr, repo_name.to_string(), service);
    }

    // client -> stdin
    let repo_for_stdin = repo_name.to_string();
    tokio::spawn(async move {
        while let Some(chunk) = input.recv().await {
            if stdin.write_all(&chunk).await.is_err() {
                log::warn!("git {} [{repo_for_stdin}]: stdin closed early", service.as_str());
                break;
            }
        }
        // Dropping stdin sends EOF, letting git know the command list/pack is done.
        drop(stdin);
    });

    let mut buf = vec![0u8; 64 * 1024];
    let first_chunk = match stdout.read(&mut buf).await {
        Ok(0) => {
            // stdout closed before producing anything: this is the one case where
            // the response status can still be changed, so resolve the exit
            // status now rather than handing back a stream that will fail later.
            let status = child
                .wait()
                .await
                .map_err(|e| ServerError::Internal(format!("failed to wait on git: {e}")))?;
            if !status.success() {
                return Err(ServerError::Internal(format!(
                    "git {} exited with {status} before producing any output",
                    service.as_str()
                )));
            }
            None
        }
        Ok(n) => Some(Bytes::copy_from_slice(&buf[..n])),
        Err(e) => {
            return Err(ServerError::Internal(format!(
                "failed to read git stdout: {e}"
            )));
        }
    };

    let Some(first_chunk) = first_chunk else {
        // Child exited successfully with no output at all; nothing left to stream.
        let (_tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(1);
        return Ok(rx);
    };

    // stdout -> channel -> HTTP response body
    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(16);
    let repo_for_stdout = repo_name.to_string();
    tokio::spawn(async move {
        if tx.send(Ok(first_chunk)).await.is_err() {
            return;
        }
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        // Client disconnected; stop reading and let the child's
                        // stdout pipe closure unwind it.
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        match child.wait().await {
            Ok(status) if !status.success() => {
                log::error!(
                    "git {} [{repo_for_stdout}] exited with {status}",
                    service.as_str()
                );
            }
            Err(e) => {
                log::error!("failed to wait on git {}: {e}", service.as_str());
            }
            _ => {}
        }
    });

    Ok(rx)
}
