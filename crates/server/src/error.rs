use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use coinstats_core::QueryError;

/// Error responses for the read endpoints
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::NotFound(msg) => write!(f, "not_found: {msg}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::MissingParameter(_) => {
                Self::BadRequest("Coin parameter is required".to_string())
            }
            QueryError::NotFound(_) => Self::NotFound("Coin not found".to_string()),
            QueryError::InsufficientData { .. } => {
                Self::NotFound("Not enough data for deviation calculation".to_string())
            }
            QueryError::Storage(e) => {
                // Detail stays in the log, never in the response
                error!("Database error: {e}");
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinstats_core::{AssetId, StoreError};

    #[test]
    fn test_query_error_mapping() {
        let cases = [
            (QueryError::MissingParameter("coin"), StatusCode::BAD_REQUEST),
            (QueryError::NotFound(AssetId::new("doge")), StatusCode::NOT_FOUND),
            (
                QueryError::InsufficientData {
                    asset: AssetId::new("bitcoin"),
                    available: 1,
                    required: 2,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                QueryError::Storage(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let resp = ApiError::from(err).into_response();
            assert_eq!(resp.status(), expected);
        }
    }
}
