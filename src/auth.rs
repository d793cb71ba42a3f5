//! HTTP Basic authentication parsing and delegation.
//!
//! Generalizes a hardcoded user-table check into a caller-supplied
//! `(type, repo, user?, pass?) -> result` hook: this server never owns
//! credentials itself, it only parses the header and calls out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use actix_web::HttpRequest;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{ServerError, ServerResult};
use crate::events::OperationType;

/// Parsed `Authorization: Basic ...` credentials. Both fields are `None` when
/// the header is absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Parse the `Authorization` header off a request. Returns `Err` only for a
/// malformed (present but unparsable) header; an absent header is `Ok(empty)`.
pub fn parse_authorization(req: &HttpRequest) -> ServerResult<Credentials> {
    let Some(header) = req.headers().get(actix_web::http::header::AUTHORIZATION) else {
        return Ok(Credentials::default());
    };
    let header = header
        .to_str()
        .map_err(|_| ServerError::AuthenticationFailed)?;

    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or("");
    let encoded = parts.next().unwrap_or("");
    if scheme != "Basic" || encoded.is_empty() {
        return Err(ServerError::AuthenticationFailed);
    }

    let decoded = BASE64
        .decode(encoded)
        .map_err(|_| ServerError::AuthenticationFailed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ServerError::AuthenticationFailed)?;

    let mut split = decoded.splitn(2, ':');
    let username = split.next().unwrap_or("").to_string();
    let password = split.next().unwrap_or("").to_string();

    Ok(Credentials {
        username: Some(username),
        password: Some(password),
    })
}

type AuthFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// The caller-supplied authenticator closure: `(type, repo, user?, pass?) -> result`.
/// Boxed as `dyn Fn` returning a boxed future so `GitServer` can hold one behind
/// an `Arc` and call it from any handler.
pub type Authenticator =
    Arc<dyn Fn(OperationType, &str, Option<&str>, Option<&str>) -> AuthFuture + Send + Sync>;

/// Run the configured authenticator, if any. No authenticator configured means
/// "always succeed" and credentials are not consulted at all.
pub async fn authenticate(
    authenticator: Option<&Authenticator>,
    op: OperationType,
    repo: &str,
    req: &HttpRequest,
) -> ServerResult<()> {
    let Some(authenticator) = authenticator else {
        return Ok(());
    };
    let creds = match parse_authorization(req) {
        Ok(creds) => creds,
        Err(e) => {
            log::warn!("rejecting {op} on {repo}: malformed Authorization header");
            return Err(e);
        }
    };
    let fut = (authenticator)(
        op,
        repo,
        creds.username.as_deref(),
        creds.password.as_deref(),
    );
    fut.await.map_err(|reason| {
        log::warn!("authentication failed for {op} on {repo}: {reason}");
        ServerError::AuthenticationFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn absent_header_is_empty_credentials() {
        let req = TestRequest::default().to_http_request();
        let creds = parse_authorization(&req).unwrap();
        assert_eq!(creds, Credentials::default());
    }

    #[test]
    fn decodes_valid_basic_header() {
        let encoded = BASE64.encode("alice:hunter2");
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Basic {encoded}")))
            .to_http_request();
        let creds = parse_authorization(&req).unwrap();
        assert_eq!(creds.username.as_deref(), Some("alice"));
        assert_eq!(creds.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn rejects_non_basic_scheme() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer sometoken"))
            .to_http_request();
        assert!(parse_authorization(&req).is_err());
    }

    #[test]
    fn rejects_empty_basic_payload() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic "))
            .to_http_request();
        assert!(parse_authorization(&req).is_err());
    }

    #[test]
    fn splits_password_containing_colons() {
        let encoded = BASE64.encode("bob:pa:ss:word");
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Basic {encoded}")))
            .to_http_request();
        let creds = parse_authorization(&req).unwrap();
        assert_eq!(creds.username.as_deref(), Some("bob"));
        assert_eq!(creds.password.as_deref(), Some("pa:ss:word"));
    }
}
