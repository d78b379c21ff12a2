use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use wayfare_auth::CredentialError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl AppError {
    /// Stable machine-readable tag for the error body
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::Persistence(_) | AppError::Database(_) => "persistence_error",
            AppError::Upstream { .. } => "upstream_error",
            AppError::Credential(_) | AppError::Config(_) | AppError::Server(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Upstream { status, .. } => *status,
            AppError::Persistence(_)
            | AppError::Database(_)
            | AppError::Credential(_)
            | AppError::Config(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a caller; storage and crypto details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "Something went wrong, please try again later.".to_string(),
            AppError::Credential(_) | AppError::Config(_) | AppError::Server(_) => {
                "Internal server error, please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn invalid_input() -> Self {
        AppError::Validation("Invalid inputs passed, please check your data.".to_string())
    }

    pub fn wrong_credentials() -> Self {
        AppError::Unauthorized("Wrong credentials, please try again.".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("{} ({}): {}", self.kind(), status, self);
        }

        let body = Json(json!({
            "error": self.kind(),
            "message": self.public_message()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::invalid_input().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Conflict("taken".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::wrong_credentials().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: "down".into()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Database(sea_orm::DbErr::Custom("disk I/O error".into()));

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "persistence_error");
        assert!(!err.public_message().contains("disk"));
    }
}
