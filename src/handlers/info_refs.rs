//! Advertisement handler: `GET /<repo>/info/refs?service=git-(upload|receive)-pack`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth;
use crate::error::{ServerError, ServerResult};
use crate::events::{GitInfo, OperationType, Phase};
use crate::gate::{Gate, GateState};
use crate::handlers::no_cache_headers;
use crate::pktline;
use crate::process::{self, ServiceName};
use crate::repo;
use crate::server::GitServerState;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct Query {
    service: Option<String>,
}

pub async fn handle(
    req: HttpRequest,
    state: web::Data<GitServerState>,
    repo_name: String,
) -> ServerResult<HttpResponse> {
    let query: web::Query<Query> = web::Query::from_query(req.query_string())
        .map_err(|_| ServerError::ServiceParameterRequired)?;
    let Some(service_value) = query.service.as_deref() else {
        return Err(ServerError::ServiceParameterRequired);
    };
    let Some(service) = ServiceName::from_query_value(service_value) else {
        return Err(ServerError::InvalidService);
    };
    let operation = match service {
        ServiceName::ReceivePack => OperationType::Push,
        ServiceName::UploadPack => OperationType::Fetch,
    };

    auth::authenticate(state.authenticator.as_ref(), operation, &repo_name, &req).await?;

    let repo_path = repo::resolve_repo_path(&state.root, &repo_name)?;
    repo::ensure_repo(&repo_path, state.options.auto_create).await?;

    let gate = Arc::new(Gate::new());
    let has_listeners = state
        .events
        .has_listeners(Phase::Advertise, operation);
    let info = GitInfo {
        repo: repo_name.clone(),
        operation,
        phase: Phase::Advertise,
        gate: gate.clone(),
    };

    log::debug!("routing {operation} advertisement for {repo_name} (phase=advertise)");

    let decision = if has_listeners {
        log::debug!("awaiting listener decision for {operation} advertisement on {repo_name}");
        state.events.emit(info);
        gate.await_decision().await
    } else {
        log::debug!("no listeners for {operation} advertisement on {repo_name}; auto-accepting");
        gate.auto_accept()
    };

    match decision {
        GateState::Rejected(message) => {
            log::warn!("{operation} advertisement on {repo_name} rejected: {message}");
            Err(ServerError::Rejected(message))
        }
        GateState::Pending => unreachable!("await_decision/auto_accept always resolve terminal"),
        GateState::Accepted => {
            let stdout = process::run_advertisement(&repo_path, service, &repo_name).await?;

            let mut body = pktline::service_banner(service.as_str());
            body.extend_from_slice(&stdout);

            let mut builder = HttpResponse::Ok();
            builder.content_type(service.advertisement_content_type());
            no_cache_headers(&mut builder);
            Ok(builder.body(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{test, web, App};
    use std::sync::Arc;

    use crate::events::EventBus;
    use crate::server::GitServerState;

    fn test_state(root: std::path::PathBuf) -> web::Data<GitServerState> {
        web::Data::new(GitServerState {
            root,
            options: crate::config::ServerOptions::default(),
            authenticator: None,
            events: Arc::new(EventBus::new()),
        })
    }

    #[actix_web::test]
    async fn missing_service_query_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(crate::router::dispatch)),
        )
        .await;

        let req = test::TestRequest::get().uri("/r1/info/refs").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn invalid_service_value_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(crate::router::dispatch)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/r1/info/refs?service=git-frobnicate")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn missing_repo_without_auto_create_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path().to_path_buf());
        let app = test::init_service(
            App::new()
                .app_data(state)
                .default_service(web::route().to(crate::router::dispatch)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/nope/info/refs?service=git-upload-pack")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
