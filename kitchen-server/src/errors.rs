use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kitchen::{drafts::DraftError, form::SubmitError, validation::ValidationError};
use serde_json::json;

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    /// The detail is logged, never sent to the client.
    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
    #[error("Internal Server Error")]
    Template(#[from] minijinja::Error),
    /// A server-side setup problem the operator has to fix, such as a missing API key.
    #[error("{0}")]
    Misconfigured(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("{message}")]
    ExternalApi {
        status: StatusCode,
        message: String,
        details: serde_json::Value,
    },
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let display = self.to_string();
        let (status, details) = match self {
            WebError::Internal(ref e) => {
                tracing::error!("{e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            WebError::Template(ref e) => {
                tracing::error!("{e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            WebError::Misconfigured(ref message) => {
                tracing::error!(%message, "Server is misconfigured");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            // Auth failures are always explained
            WebError::Auth(_) => (StatusCode::UNAUTHORIZED, None),
            WebError::Conflict(_) => (StatusCode::CONFLICT, None),
            WebError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            WebError::NotFound => (StatusCode::NOT_FOUND, None),
            WebError::ExternalApi {
                status, details, ..
            } => (status, Some(details)),
        };
        let body = match details {
            Some(details) => json!({ "error": display, "details": details }),
            None => json!({ "error": display }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for WebError {
    fn from(e: ValidationError) -> Self {
        WebError::Validation(e.to_string())
    }
}

impl From<SubmitError> for WebError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Validation(e) => e.into(),
            SubmitError::NotFound(_) => WebError::NotFound,
            SubmitError::Persistence(e) => WebError::Internal(e),
        }
    }
}

impl From<DraftError> for WebError {
    fn from(e: DraftError) -> Self {
        match e {
            DraftError::InvalidKey(_) => WebError::Validation(e.to_string()),
            other => WebError::Internal(other.into()),
        }
    }
}
