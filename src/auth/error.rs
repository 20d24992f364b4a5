use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::dto::MessageResponse;

/// Everything the auth endpoints can fail with. Collaborator errors are
/// translated into one of these before leaving a flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("User already exists")]
    DuplicateAccount,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Access denied. No token provided.")]
    MissingToken,
    #[error("Invalid or expired token.")]
    InvalidToken,
    #[error("User not found")]
    NotFound,
    /// Cause is logged where it happens and never sent to the client.
    #[error("Server Error")]
    Persistence,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateAccount | Self::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::InvalidToken => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = MessageResponse {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
