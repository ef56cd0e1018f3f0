use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Every way a request can be rejected.
///
/// Authentication failures all map to 401 so that a caller cannot tell a
/// missing token from a forged one. Backend failures map to 500 so they are
/// never mistaken for bad credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("username is already registered")]
    DuplicateIdentity,

    #[error("not found")]
    NotFound,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid session token")]
    InvalidToken,

    #[error("session token has expired")]
    ExpiredToken,

    #[error("authentication required")]
    MissingToken,

    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Persistence(#[from] sqlx::Error),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateIdentity => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Persistence(_) | AuthError::TaskJoin(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_share_one_status() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::InvalidToken,
            AuthError::ExpiredToken,
            AuthError::MissingToken,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn persistence_is_not_an_auth_failure() {
        let err = AuthError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn duplicate_is_conflict() {
        assert_eq!(AuthError::DuplicateIdentity.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::Validation("x").status(), StatusCode::BAD_REQUEST);
    }
}
