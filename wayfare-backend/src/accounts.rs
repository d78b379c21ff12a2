use sea_orm::DatabaseConnection;
use std::sync::Arc;
use wayfare_auth::CredentialService;
use wayfare_types::{AuthResponse, LoginRequest, SignupRequest};

use crate::{
    database::{user_ops, NewUser},
    error::{AppError, Result},
};

/// Register a new user and hand back a session token
pub async fn signup(
    db: &DatabaseConnection,
    credentials: &Arc<CredentialService>,
    request: SignupRequest,
) -> Result<AuthResponse> {
    let email = normalize_email(&request.email);

    if user_ops::find_by_email(db, &email).await?.is_some() {
        return Err(AppError::Conflict(
            "User exists already, please login instead.".to_string(),
        ));
    }

    let password_hash = {
        let credentials = Arc::clone(credentials);
        let password = request.password;
        run_blocking(move || credentials.hash(&password)).await??
    };

    // The unique index still catches a racing signup for the same email
    let user = user_ops::create(
        db,
        NewUser {
            name: request.name.trim().to_string(),
            email,
            password_hash,
            image: request.image,
        },
    )
    .await?;

    let token = credentials.issue_token(user.id, &user.email)?;

    tracing::info!("👤 User signed up: {}", user.id);

    Ok(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    })
}

/// Check an email/password pair and hand back a session token.
///
/// An unknown email and a wrong password produce the same error, and both
/// paths spend one password verification.
pub async fn login(
    db: &DatabaseConnection,
    credentials: &Arc<CredentialService>,
    request: LoginRequest,
) -> Result<AuthResponse> {
    let email = normalize_email(&request.email);
    let existing_user = user_ops::find_by_email(db, &email).await?;

    let verifier = Arc::clone(credentials);
    let password = request.password;
    let stored_hash = existing_user.as_ref().map(|u| u.password_hash.clone());
    let is_valid = run_blocking(move || match stored_hash {
        Some(hash) => verifier.verify(&password, &hash),
        None => {
            verifier.verify_dummy(&password);
            Ok(false)
        }
    })
    .await??;

    let user = match existing_user {
        Some(user) if is_valid => user,
        _ => {
            tracing::debug!("Rejected login attempt");
            return Err(AppError::wrong_credentials());
        }
    };

    let token = credentials.issue_token(user.id, &user.email)?;

    Ok(AuthResponse {
        user_id: user.id,
        email: user.email,
        token,
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Run CPU-heavy credential work off the async workers
async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Server(format!("Credential task failed: {}", e)))
}
