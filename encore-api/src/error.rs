use serde::{Deserialize, Serialize};
use tower_api_client::{Error as TransportError, StatusCode};

#[derive(Debug)]
pub enum ApiError {
    Provider(StatusCode, ErrorDetail),
    Internal(TransportError),
}

impl From<TransportError> for ApiError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::ClientError(status, body) | TransportError::ServerError(status, body) => {
                ApiError::Provider(status, ErrorDetail::from_body(&body))
            }
            e => ApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Internal(e) => write!(f, "Internal error: {}", e),
            ApiError::Provider(status, detail) => write!(f, "({}) {}", status, detail.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error payload returned by a provider.
///
/// The catalog answers `{"error": {"status": 401, "message": "..."}}`, the events
/// service answers `{"response_status": {"message": "..."}}`. Anything else is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Catalog { error: ErrorDetail },
    Events { response_status: ErrorDetail },
}

impl ErrorDetail {
    fn from_body(body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody::Catalog { error }) => error,
            Ok(ErrorBody::Events { response_status }) => response_status,
            Err(_) => ErrorDetail {
                message: body.to_string(),
            },
        }
    }
}
