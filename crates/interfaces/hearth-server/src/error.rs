use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hearth_app_core::LiveViewError;
use hearth_core::IdentityError;

/// Request-level rejections. Everything past the identity boundary is
/// reported through the live view instead.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no authenticated actor on this request")]
    Unauthenticated,
    #[error("invalid actor: {0}")]
    InvalidActor(#[source] IdentityError),
    #[error("missing connection id")]
    MissingConnection,
    #[error("invalid connection id: {0}")]
    InvalidConnection(#[source] IdentityError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthenticated | ServerError::InvalidActor(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::MissingConnection | ServerError::InvalidConnection(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl From<LiveViewError> for ServerError {
    fn from(err: LiveViewError) -> Self {
        match err {
            LiveViewError::Unauthenticated => ServerError::Unauthenticated,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "request rejected");
        (self.status(), self.to_string()).into_response()
    }
}
