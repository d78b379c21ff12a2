use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::{error::AppError, AppState};

/// The user a request is made on behalf of, taken from its bearer token
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

fn authentication_failed() -> AppError {
    AppError::Unauthorized("Authentication failed.".to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(authentication_failed)?;

        let claims = state.credentials.verify_token(token).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            authentication_failed()
        })?;

        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}
