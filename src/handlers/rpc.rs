//! RPC handler: `POST /<repo>/git-(upload|receive)-pack`.
//!
//! The critical invariant: the request body starts draining into an
//! intermediary channel the instant the handler begins, before the acceptance
//! event is even emitted, so no bytes are lost while a listener is thinking.
//! The channel's bounded capacity is what provides backpressure: once it
//! fills, the forwarding task's `send` blocks, which in turn stops pulling
//! bytes off the HTTP connection.

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::auth;
use crate::error::{ServerError, ServerResult};
use crate::events::{GitInfo, OperationType, Phase};
use crate::gate::{Gate, GateState};
use crate::handlers::no_cache_headers;
use crate::process::{self, ServiceName};
use crate::repo;
use crate::server::GitServerState;
use crate::tagsniff::TagSniffer;

/// How many body chunks may queue before the forwarding task blocks. Small
/// enough to apply real backpressure, large enough that the common case (a
/// request already fully buffered by the proxy/client) never stalls.
const BODY_CHANNEL_CAPACITY: usize = 64;

pub async fn handle(
    req: HttpRequest,
    mut payload: web::Payload,
    state: web::Data<GitServerState>,
    repo_name: String,
    action: String,
) -> ServerResult<HttpResponse> {
    let service = ServiceName::from_query_value(&action).ok_or(ServerError::NotFound)?;
    let operation = match service {
        ServiceName::ReceivePack => OperationType::Push,
        ServiceName::UploadPack => OperationType::Fetch,
    };

    auth::authenticate(state.authenticator.as_ref(), operation, &repo_name, &req).await?;

    let repo_path = repo::resolve_repo_path(&state.root, &repo_name)?;
    // RPC never auto-creates; the advertisement phase already would have.
    if !repo::repo_exists(&repo_path).await {
        return Err(ServerError::RepositoryNotFound);
    }

    // Immediately start draining the request body into the paused intermediary
    // buffer, before emitting the acceptance event.
    let (body_tx, body_rx) = mpsc::channel::<Bytes>(BODY_CHANNEL_CAPACITY);
    let events_for_tags = state.events.clone();
    let repo_for_tags = repo_name.clone();
    let sniff = operation == OperationType::Push;
    tokio::spawn(async move {
        let mut sniffer = sniff.then(|| TagSniffer::new(repo_for_tags.clone()));
        while let Some(item) = payload.next().await {
            let Ok(chunk) = item else { break };
            if let Some(sniffer) = sniffer.as_mut() {
                for tag in sniffer.feed(&chunk) {
                    events_for_tags.emit_tag(tag);
                }
            }
            if body_tx.send(chunk).await.is_err() {
                break;
            }
        }
    });

    let gate = Arc::new(Gate::new());
    let has_listeners = state.events.has_listeners(Phase::Rpc, operation);
    let info = GitInfo {
        repo: repo_name.clone(),
        operation,
        phase: Phase::Rpc,
        gate: gate.clone(),
    };

    log::debug!("routing {operation} RPC for {repo_name} (phase=rpc)");

    let decision = if has_listeners {
        log::debug!("awaiting listener decision for {operation} RPC on {repo_name}");
        state.events.emit(info);
        gate.await_decision().await
    } else {
        log::debug!("no listeners for {operation} RPC on {repo_name}; auto-accepting");
        gate.auto_accept()
    };

    match decision {
        // 500, not 403 — Git clients surface this as a post-handshake error.
        GateState::Rejected(message) => {
            log::warn!("{operation} RPC on {repo_name} rejected: {message}");
            Err(ServerError::RejectedRpc(message))
        }
        GateState::Pending => unreachable!("await_decision/auto_accept always resolve terminal"),
        GateState::Accepted => {
            // The child's health is resolved before the response is built: once
            // `.streaming()` is called, actix has already committed the status
            // code, so a failure surfacing only inside the stream can no longer
            // turn a 200 into a 500.
            let mut stdout_rx =
                process::run_rpc_streaming(&repo_path, service, &repo_name, body_rx).await?;
            let stream = async_stream::stream! {
                while let Some(item) = stdout_rx.recv().await {
                    yield item;
                }
            };

            let mut builder = HttpResponse::Ok();
            builder.content_type(service.result_content_type());
            no_cache_headers(&mut builder);
            Ok(builder.streaming(stream))
        }
    }
}
