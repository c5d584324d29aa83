use crate::models::ApiResponse;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    /// A durable write failed after the gateway had already captured money.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Pending transaction exists: {0}")]
    PendingTransactionExists(String),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Payment gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Stable machine-readable code, also used in redirect query strings.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden => "FORBIDDEN",
            AppError::PendingTransactionExists(_) => "PENDING_TRANSACTION_EXISTS",
            AppError::AlreadyProcessed(_) => "ALREADY_PROCESSED",
            AppError::GatewayError(_) => "GATEWAY_ERROR",
            AppError::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
            AppError::PersistenceError(_) => "PERSISTENCE_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::InvalidRequest(msg) => {
                log::warn!("Invalid request: {msg}");
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (StatusCode::UNAUTHORIZED, "AUTH_ERROR", msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                (
                    StatusCode::UNAUTHORIZED,
                    "AUTH_ERROR",
                    "Invalid access token".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                (StatusCode::FORBIDDEN, "FORBIDDEN", "Forbidden".to_string())
            }
            AppError::PendingTransactionExists(msg) => (
                StatusCode::CONFLICT,
                "PENDING_TRANSACTION_EXISTS",
                msg.clone(),
            ),
            AppError::AlreadyProcessed(msg) => {
                log::warn!("Duplicate payment confirmation: {msg}");
                (StatusCode::CONFLICT, "ALREADY_PROCESSED", msg.clone())
            }
            AppError::GatewayError(msg) => {
                log::error!("Payment gateway error: {msg}");
                (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR", msg.clone())
            }
            AppError::GatewayTimeout(msg) => {
                log::error!("Payment gateway timeout: {msg}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "GATEWAY_TIMEOUT",
                    "Payment provider did not respond in time".to_string(),
                )
            }
            AppError::PersistenceError(msg) => {
                log::error!("Persistence error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_ERROR",
                    "Payment received but membership could not be updated; it will be reconciled"
                        .to_string(),
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::PendingTransactionExists(_) | AppError::AlreadyProcessed(_) => {
                StatusCode::CONFLICT
            }
            AppError::GatewayError(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = self.parts();
        HttpResponse::build(status_code).json(ApiResponse::error(error_code.to_string(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_map_to_409() {
        let resp = AppError::PendingTransactionExists("busy".into()).error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = AppError::AlreadyProcessed("PAY-1".into()).error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_gateway_timeout_is_distinct_from_gateway_error() {
        assert_eq!(
            AppError::GatewayTimeout("t".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            AppError::GatewayError("e".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_database_error_is_not_leaked() {
        let err = AppError::DatabaseError(sea_orm::DbErr::Custom("secret detail".into()));
        let (status, code, message) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "DATABASE_ERROR");
        assert!(!message.contains("secret detail"));
    }
}
