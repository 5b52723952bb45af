use axum::http::StatusCode;
use thiserror::Error;

/// Failure of a single upstream consumption request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned HTTP {status}")]
    Http { status: u16 },
    #[error("malformed payload: {0}")]
    Parse(String),
    #[error("request superseded by a newer one")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Http {
                status: status.as_u16(),
            },
            None => FetchError::Network(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("not a number: {0:?}")]
    Parse(String),
    #[error("meta must be a finite number greater than zero, got {0}")]
    Validation(f64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<MetaError> for AppError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Parse(_) | MetaError::Validation(_) => Self::unprocessable(err.to_string()),
            MetaError::Store(inner) => Self::internal(inner),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
