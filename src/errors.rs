use actix_web::{HttpResponse, ResponseError};
use diesel::r2d2;
use serde_json::json;
use std::fmt;

use crate::hatena::ApiError;

/// Application-wide error types with user-friendly messages
#[derive(Debug)]
pub enum AppError {
    // Authentication & Authorization
    SessionExpired,
    Forbidden,

    // Validation Errors
    InvalidInput { field: String, message: String },
    ResourceNotFound { resource: String },

    // Feed-related Errors
    FeedParseError,

    // Database Errors
    DatabaseError,
    ConnectionPoolError,

    // External Service Errors
    NetworkError,
    ServiceUnavailable,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Authentication & Authorization
            AppError::SessionExpired => write!(f, "Session expired - please log in again"),
            AppError::Forbidden => write!(f, "Access denied"),

            // Validation Errors
            AppError::InvalidInput { field, message } => write!(f, "Invalid {}: {}", field, message),
            AppError::ResourceNotFound { resource } => write!(f, "{} not found", resource),

            // Feed-related Errors
            AppError::FeedParseError => write!(f, "Unable to parse bookmark feed - invalid format"),

            // Database Errors
            AppError::DatabaseError => write!(f, "A database error occurred - please try again"),
            AppError::ConnectionPoolError => write!(f, "Service temporarily unavailable - please try again"),

            // External Service Errors
            AppError::NetworkError => write!(f, "Could not reach the bookmark service"),
            AppError::ServiceUnavailable => write!(f, "Bookmark service unavailable - please try again later"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code, message) = match self {
            // 400 Bad Request
            AppError::InvalidInput { .. } => (400, "INVALID_INPUT", self.to_string()),

            // 401 Unauthorized
            AppError::SessionExpired => (401, "SESSION_EXPIRED", self.to_string()),

            // 403 Forbidden
            AppError::Forbidden => (403, "FORBIDDEN", self.to_string()),

            // 404 Not Found
            AppError::ResourceNotFound { .. } => (404, "RESOURCE_NOT_FOUND", self.to_string()),

            // 500 Internal Server Error
            AppError::DatabaseError => (500, "DATABASE_ERROR", self.to_string()),
            AppError::ConnectionPoolError => (500, "CONNECTION_POOL_ERROR", self.to_string()),

            // 502 Bad Gateway
            AppError::NetworkError => (502, "NETWORK_ERROR", self.to_string()),
            AppError::FeedParseError => (502, "FEED_PARSE_ERROR", self.to_string()),

            // 503 Service Unavailable
            AppError::ServiceUnavailable => (503, "SERVICE_UNAVAILABLE", self.to_string()),
        };

        match self {
            AppError::DatabaseError | AppError::ConnectionPoolError => {
                log::error!("Server error: {:?}", self);
            }
            AppError::NetworkError | AppError::ServiceUnavailable | AppError::FeedParseError => {
                log::warn!("Upstream error: {:?}", self);
            }
            _ => {
                log::info!("Client error: {:?}", self);
            }
        }

        let status = actix_web::http::StatusCode::from_u16(status)
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(json!({
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid_input(field: &str, message: &str) -> Self {
        AppError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn resource_not_found(resource: &str) -> Self {
        AppError::ResourceNotFound {
            resource: resource.to_string(),
        }
    }
}

/// Convert database connection pool errors
impl From<r2d2::PoolError> for AppError {
    fn from(err: r2d2::PoolError) -> Self {
        log::error!("Database connection pool error: {}", err);
        AppError::ConnectionPoolError
    }
}

/// Convert diesel database errors
impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error as DieselError;

        match err {
            DieselError::NotFound => AppError::ResourceNotFound {
                resource: "Session".to_string(),
            },
            _ => {
                log::error!("Database error: {}", err);
                AppError::DatabaseError
            }
        }
    }
}

/// Convert feed parsing errors
impl From<feed_rs::parser::ParseFeedError> for AppError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        log::warn!("Feed parse error: {}", err);
        AppError::FeedParseError
    }
}

/// Convert bookmark API errors. A rejected token means the stored login is
/// no longer usable.
impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        log::warn!("Bookmark API error: {}", err);
        match err {
            ApiError::Status { status: 401 | 403, .. } => AppError::SessionExpired,
            ApiError::Status { status: 404, .. } => AppError::resource_not_found("Bookmark"),
            ApiError::Status { .. } => AppError::ServiceUnavailable,
            ApiError::Transport(_) => AppError::NetworkError,
            ApiError::Malformed(_) => AppError::ServiceUnavailable,
        }
    }
}
