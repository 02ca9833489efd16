//! Error types for pulse-dashboard.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::allocation::AllocationError;

/// Result alias for dashboard operations.
pub type DashboardResult<T> = std::result::Result<T, DashboardError>;

/// Dashboard service errors.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Basket not found: {0}")]
    BasketNotFound(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Basket is locked: {0}")]
    BasketLocked(String),

    #[error("Symbol already in basket: {0}")]
    DuplicateSymbol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BasketNotFound(_) => (StatusCode::NOT_FOUND, "BASKET_NOT_FOUND"),
            Self::EntryNotFound(_) => (StatusCode::NOT_FOUND, "ENTRY_NOT_FOUND"),
            Self::BasketLocked(_) => (StatusCode::CONFLICT, "BASKET_LOCKED"),
            Self::DuplicateSymbol(_) => (StatusCode::CONFLICT, "DUPLICATE_SYMBOL"),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Allocation(AllocationError::CannotReconcileAllocations { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CANNOT_RECONCILE_ALLOCATIONS",
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<anyhow::Error> for DashboardError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<JsonRejection> for DashboardError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for DashboardError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

/// Error body inside the response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DashboardError::BasketNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "Basket not found: abc123");
    }

    #[test]
    fn test_error_into_response() {
        let err = DashboardError::InvalidRequest("missing name".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = DashboardError::BasketLocked("b1".to_string());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_reconcile_failure_is_unprocessable() {
        let err: DashboardError =
            AllocationError::CannotReconcileAllocations { rounded_sum: 99.0 }.into();
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "CANNOT_RECONCILE_ALLOCATIONS");
    }

    #[test]
    fn test_anyhow_maps_to_internal() {
        let err: DashboardError = anyhow::anyhow!("disk full").into();
        assert_eq!(
            err.status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_query_rejection_maps_to_invalid_request() {
        use axum::extract::Query;
        use axum::http::Uri;

        let uri: Uri = "/x?lag=-1".parse().unwrap();
        let rejection = Query::<std::collections::HashMap<String, u32>>::try_from_uri(&uri)
            .unwrap_err();
        let err: DashboardError = rejection.into();
        assert!(matches!(err, DashboardError::InvalidRequest(_)));
        assert_eq!(err.status_and_code().1, "INVALID_REQUEST");
    }
}
