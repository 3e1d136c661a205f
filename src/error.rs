//! Errors raised by the module services.

use bookstore_http::AppError;
use serde::Serialize;
use thiserror::Error;

/// One rejected field of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, error: &'static str) -> Self {
        Self { field, error }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid payload")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(fields) => {
                let details = fields
                    .iter()
                    .map(|field| serde_json::json!({ "field": field.field, "error": field.error }))
                    .collect();
                AppError::validation(details, "invalid payload")
            }
            ServiceError::NotFound(message) => AppError::not_found(message),
            ServiceError::Forbidden(message) => AppError::forbidden(message),
            ServiceError::Unauthorized(message) => AppError::unauthorized(message),
            ServiceError::Conflict(message) => AppError::conflict(message),
            ServiceError::Store(e) => AppError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn service_errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::NotFound("book not found"), StatusCode::NOT_FOUND),
            (
                ServiceError::Forbidden("You are not owner of this book"),
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::Unauthorized("Error, you need to be registered"),
                StatusCode::UNAUTHORIZED,
            ),
            (ServiceError::Conflict("exists"), StatusCode::CONFLICT),
            (
                ServiceError::Validation(vec![FieldError::new("name", "required")]),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServiceError::Store(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn validation_details_list_fields() {
        let err = AppError::from(ServiceError::Validation(vec![
            FieldError::new("price", "must be a positive number"),
            FieldError::new("stock", "must be a positive integer"),
        ]));

        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0]["field"], "price");
                assert_eq!(details[1]["error"], "must be a positive integer");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
