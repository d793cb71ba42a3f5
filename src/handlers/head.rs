//! HEAD handler: `GET /<repo>/HEAD`.

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::{ServerError, ServerResult};
use crate::events::{GitInfo, OperationType, Phase};
use crate::gate::{Gate, GateState};
use crate::handlers::no_cache_headers;
use crate::repo;
use crate::server::GitServerState;

pub async fn handle(
    _req: HttpRequest,
    state: web::Data<GitServerState>,
    repo_name: String,
) -> ServerResult<HttpResponse> {
    let repo_path = repo::resolve_repo_path(&state.root, &repo_name)?;
    repo::ensure_repo(&repo_path, state.options.auto_create).await?;

    let gate = Arc::new(Gate::new());
    let has_listeners = state.events.has_listeners(Phase::Head, OperationType::Fetch);
    let info = GitInfo {
        repo: repo_name.clone(),
        // HEAD has no fetch/push distinction in the spec; Fetch is an arbitrary
        // but harmless placeholder since only `head` listeners are consulted.
        operation: OperationType::Fetch,
        phase: Phase::Head,
        gate: gate.clone(),
    };

    log::debug!("routing HEAD for {repo_name} (phase=head)");

    let decision = if has_listeners {
        log::debug!("awaiting listener decision for HEAD on {repo_name}");
        state.events.emit(info);
        gate.await_decision().await
    } else {
        log::debug!("no listeners for HEAD on {repo_name}; auto-accepting");
        gate.auto_accept()
    };

    match decision {
        GateState::Rejected(message) => {
            log::warn!("HEAD on {repo_name} rejected: {message}");
            Err(ServerError::Rejected(message))
        }
        GateState::Pending => unreachable!("await_decision/auto_accept always resolve terminal"),
        GateState::Accepted => {
            let mut builder = HttpResponse::Ok();
            builder.content_type("text/plain");
            no_cache_headers(&mut builder);
            Ok(builder.body(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{test, web, App};
    use std::sync::Arc;

    use crate::events::EventBus;
    use crate::server::GitServerState;

    #[actix_web::test]
    async fn head_on_missing_repo_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = web::Data::new(GitServerState {
            root: dir.path().to_path_buf(),
            options: crate::config::ServerOptions::default(),
            authenticator: None,
            events: Arc::new(EventBus::new()),
        });
        let app = test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(crate::router::dispatch)),
        )
        .await;

        let req = test::TestRequest::get().uri("/nope/HEAD").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn head_on_existing_repo_is_rejected_by_listener() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("r1");
        std::fs::create_dir_all(&repo).unwrap();

        let mut events = EventBus::new();
        events.on_head(|info| info.reject("closed for maintenance"));

        let state = web::Data::new(GitServerState {
            root: dir.path().to_path_buf(),
            options: crate::config::ServerOptions::default(),
            authenticator: None,
            events: Arc::new(events),
        });
        let app = test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(crate::router::dispatch)),
        )
        .await;

        let req = test::TestRequest::get().uri("/r1/HEAD").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }
}
