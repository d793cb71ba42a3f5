use actix_web::{http::header, HttpResponse};

/// The full error taxonomy, expressed as a single enum so handlers can bail
/// out with `?` and let `ResponseError` render the right status, body, and
/// headers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Not Found")]
    NotFound,

    #[error("service parameter required")]
    ServiceParameterRequired,

    #[error("Invalid service")]
    InvalidService,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Repository not found")]
    RepositoryNotFound,

    /// Acceptance gate rejected the advertisement or HEAD phase.
    #[error("{0}")]
    Rejected(String),

    /// Acceptance gate rejected the RPC phase; deliberately 500, not 403 —
    /// a post-handshake RPC failure can't be surfaced to Git as a clean 403.
    #[error("{0}")]
    RejectedRpc(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl actix_web::ResponseError for ServerError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ServerError::NotFound | ServerError::RepositoryNotFound => StatusCode::NOT_FOUND,
            ServerError::ServiceParameterRequired | ServerError::InvalidService => {
                StatusCode::BAD_REQUEST
            }
            ServerError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ServerError::Rejected(_) => StatusCode::FORBIDDEN,
            ServerError::RejectedRpc(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.content_type("text/plain; charset=utf-8");
        if matches!(self, ServerError::AuthenticationFailed) {
            builder.insert_header((header::WWW_AUTHENTICATE, "Basic realm=\"Git Server\""));
        }
        builder.body(self.to_string())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
