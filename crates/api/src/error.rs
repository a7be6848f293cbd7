//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::{ClientError, OrchestratorError};
use order_store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or unusable caller identity.
    Unauthorized(String),
    /// Orchestrator-level failure.
    Orchestrator(OrchestratorError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Orchestrator(err) => orchestrator_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "success": false, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn orchestrator_error_to_response(err: OrchestratorError) -> (StatusCode, String) {
    let status = match &err {
        OrchestratorError::EmptyCart => StatusCode::BAD_REQUEST,
        OrchestratorError::CancellationWindowExpired { .. } => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InsufficientStock => StatusCode::BAD_REQUEST,
        OrchestratorError::OrderNumberExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        // every domain rule rejection is a 400; 409 is reserved for the
        // optimistic version conflict below
        OrchestratorError::Domain(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Client(client_err) => match client_err {
            ClientError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ClientError::UnexpectedStatus { .. } | ClientError::InvalidResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
        },
        OrchestratorError::Store(store_err) => match store_err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::VersionConflict { .. } => StatusCode::CONFLICT,
            StoreError::DuplicateOrderNumber(_)
            | StoreError::Database(_)
            | StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError::Orchestrator(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn business_rejections_map_to_400() {
        assert_eq!(
            status_of(OrchestratorError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::InsufficientStock.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                OrchestratorError::Domain(domain::OrderError::CannotCancel {
                    status: domain::OrderStatus::Shipped,
                })
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::NotFound(OrderId::new()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn conflicting_writes_map_to_409() {
        let err = OrchestratorError::Store(StoreError::VersionConflict {
            order_id: OrderId::new(),
            expected: 1,
            actual: 2,
        });
        assert_eq!(status_of(err.into()), StatusCode::CONFLICT);
    }

    #[test]
    fn collaborator_outage_maps_to_503() {
        let err = OrchestratorError::Client(ClientError::Unavailable {
            service: "catalog",
            reason: "connection refused".to_string(),
        });
        assert_eq!(status_of(err.into()), StatusCode::SERVICE_UNAVAILABLE);
    }
}
