use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

/// Message returned with every ownership check failure.
pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to perform this action.";

/// The primary error type for the application.
///
/// Every handler returns `AppResult<T>`; the variant decides the HTTP status and
/// the `code` field of the JSON error body.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For malformed requests (bad JSON, bad query string).
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For errors related to database operations.
    Database(String),
    /// For when a service is temporarily unavailable.
    ServiceUnavailable(String),
    /// For writes without a valid bearer token.
    Unauthorized(String),
    /// For an authenticated principal that is neither owner nor staff.
    PermissionDenied,
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::PermissionDenied => write!(f, "Permission denied: {}", PERMISSION_DENIED_MESSAGE),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                PERMISSION_DENIED_MESSAGE.to_string(),
                None,
            ),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// Field validators shared by the book and relation endpoints.
pub mod validation {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;

    pub const MAX_TEXT_LEN: usize = 255;
    /// `max_digits = 7, decimal_places = 2`
    pub const MAX_PRICE_DIGITS: u32 = 7;
    pub const PRICE_DECIMAL_PLACES: u32 = 2;

    fn invalid(field: &str, message: impl Into<String>) -> AppError {
        AppError::ValidationError { field: field.to_string(), message: message.into() }
    }

    /// Rejects blank text and text longer than [`MAX_TEXT_LEN`] characters.
    pub fn validate_text(value: &str, field: &str) -> AppResult<()> {
        if value.trim().is_empty() {
            return Err(invalid(field, "This field may not be blank."));
        }
        if value.chars().count() > MAX_TEXT_LEN {
            return Err(invalid(
                field,
                format!("Ensure this field has no more than {} characters.", MAX_TEXT_LEN),
            ));
        }
        Ok(())
    }

    /// Checks precision and scale of a price and converts it to integer cents.
    pub fn validate_price(value: Decimal, field: &str) -> AppResult<i64> {
        let normalized = value.normalize();
        if normalized.scale() > PRICE_DECIMAL_PLACES {
            return Err(invalid(
                field,
                format!("Ensure that there are no more than {} decimal places.", PRICE_DECIMAL_PLACES),
            ));
        }
        let whole_digits = MAX_PRICE_DIGITS - PRICE_DECIMAL_PLACES;
        let limit = Decimal::from(10i64.pow(whole_digits));
        if normalized.abs() >= limit {
            return Err(invalid(
                field,
                format!("Ensure that there are no more than {} digits in total.", MAX_PRICE_DIGITS),
            ));
        }
        (normalized * Decimal::from(100))
            .trunc()
            .to_i64()
            .ok_or_else(|| invalid(field, "A valid number is required."))
    }

    /// A rating is either absent or one of 1..=5.
    pub fn validate_rating(value: Option<i64>) -> AppResult<Option<i64>> {
        match value {
            None => Ok(None),
            Some(v) if (1..=5).contains(&v) => Ok(Some(v)),
            Some(v) => Err(invalid("rating", format!("\"{}\" is not a valid choice.", v))),
        }
    }
}
