use axum::response::{IntoResponse, Response};
use diesel::r2d2;
use http::StatusCode;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    Database(diesel::result::Error),
    DatabaseConnection(String),
    Validation(validator::ValidationErrors),
    NotFound(String),
    Auth(String),
    Llm(String),
    Embedder(String),
    RuleSql(String),
    Fx(String),
    Notification(String),
    QueueFull,
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Database(e) => write!(f, "Database error: {}", e),
            ApiError::DatabaseConnection(e) => write!(f, "Database connection error: {}", e),
            ApiError::Validation(e) => write!(f, "Validation error: {}", e),
            ApiError::NotFound(e) => write!(f, "Not found: {}", e),
            ApiError::Auth(e) => write!(f, "Authentication error: {}", e),
            ApiError::Llm(e) => write!(f, "LLM error: {}", e),
            ApiError::Embedder(e) => write!(f, "Embedder error: {}", e),
            ApiError::RuleSql(e) => write!(f, "Rule SQL error: {}", e),
            ApiError::Fx(e) => write!(f, "FX error: {}", e),
            ApiError::Notification(e) => write!(f, "Notification error: {}", e),
            ApiError::QueueFull => write!(f, "Evaluation queue is full"),
            ApiError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Database(e) => Some(e),
            ApiError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<r2d2::PoolError> for ApiError {
    fn from(err: r2d2::PoolError) -> Self {
        ApiError::DatabaseConnection(err.to_string())
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        ApiError::Database(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err)
    }
}

impl From<ApiError> for (StatusCode, String) {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Database(e) => match e {
                diesel::result::Error::NotFound => {
                    (StatusCode::NOT_FOUND, "Record not found".to_string())
                }
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => (StatusCode::CONFLICT, format!("Database error: {}", e)),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {}", e),
                ),
            },
            ApiError::DatabaseConnection(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Database connection error: {}", e),
            ),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                format!("Validation error: {}", errors),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Auth(msg) => (StatusCode::UNAUTHORIZED, format!("Auth error: {}", msg)),
            ApiError::Llm(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("LLM provider error: {}", msg),
            ),
            ApiError::Embedder(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Embedder error: {}", msg),
            ),
            ApiError::RuleSql(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Rule SQL error: {}", msg),
            ),
            ApiError::Fx(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("FX error: {}", msg),
            ),
            ApiError::Notification(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Notification error: {}", msg),
            ),
            ApiError::QueueFull => (
                StatusCode::TOO_MANY_REQUESTS,
                "Evaluation queue is full, retry later".to_string(),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", msg),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body): (StatusCode, String) = self.into();
        (status, body).into_response()
    }
}
