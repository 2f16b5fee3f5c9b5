use crate::tickets::models::TicketStatus;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors produced by lifecycle operations. Every variant leaves the ticket
/// unmodified in the store.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("ticket not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Lifecycle(e) => {
                let status = match e {
                    LifecycleError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
                    LifecycleError::Conflict(_) => StatusCode::CONFLICT,
                    LifecycleError::NotFound => StatusCode::NOT_FOUND,
                    LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string())
            }
            ApiError::Database(diesel::result::Error::NotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            ApiError::Database(e) => {
                log::error!("database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ApiError::Pool(e) => {
                log::error!("connection pool error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_states() {
        let e = LifecycleError::InvalidTransition {
            from: TicketStatus::Closed,
            to: TicketStatus::Resolved,
        };
        assert_eq!(e.to_string(), "invalid transition from closed to resolved");
    }
}
