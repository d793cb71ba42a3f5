//! Request router: a single regex dispatches every inbound request to one
//! of the three handlers, or to a 404. Registered as the `actix-web` app's
//! `default_service` rather than per-route `actix-web` patterns, since the repo
//! name itself may contain `/` and needs a non-greedy capture — something
//! route-syntax path segments can't express.

use actix_web::{http::Method, web, HttpRequest, HttpResponse};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ServerError;
use crate::handlers;
use crate::server::GitServerState;

/// `^/(.+?)/(info/refs|git-(?:upload|receive)-pack|HEAD)$`, compiled once.
pub static ROUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(.+?)/(info/refs|git-(?:upload|receive)-pack|HEAD)$").unwrap());

pub async fn dispatch(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<GitServerState>,
) -> Result<HttpResponse, ServerError> {
    let path = req.path();
    let Some(captures) = ROUTE_RE.captures(path) else {
        return Err(ServerError::NotFound);
    };
    let repo_name = captures[1].to_string();
    let action = captures[2].to_string();

    match (req.method().clone(), action.as_str()) {
        (Method::GET, "info/refs") => {
            handlers::info_refs::handle(req, state, repo_name).await
        }
        (Method::GET, "HEAD") => handlers::head::handle(req, state, repo_name).await,
        (Method::POST, "git-upload-pack") | (Method::POST, "git-receive-pack") => {
            handlers::rpc::handle(req, payload, state, repo_name, action).await
        }
        _ => Err(ServerError::NotFound),
    }
}
