use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the whole API. The web boundary maps the variant to a
/// status code; nothing anywhere switches on message text.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Missing credentials entirely (no Authorization header).
    #[error("Authorization header missing")]
    Unauthenticated,

    /// Login failure. Unknown email and wrong password share this variant so
    /// the two causes are indistinguishable to the caller.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Refresh token rejected: bad signature, expired, unknown user, or
    /// already rotated out.
    #[error("Invalid refresh token")]
    InvalidToken,

    /// Bearer token present but malformed, invalid or expired.
    #[error("Invalid or expired token")]
    Forbidden,

    #[error("Access denied: you are not the owner of this project")]
    AccessDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Email already registered")]
    Conflict,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_access_denied_are_distinct() {
        assert_eq!(ApiError::NotFound("Project").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AccessDenied.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(ApiError::Conflict.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn missing_header_and_bad_token_differ() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
    }
}
