use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use zeroize::ZeroizeOnDrop;

pub use argon2::Params as HashParams;

/// Session tokens are valid for one hour after issuance
pub const TOKEN_TTL_SECONDS: i64 = 60 * 60;

// Verified against when a login names an unknown email
const DUMMY_PASSWORD: &str = "wayfare-dummy-password";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Password hashing failed")]
    Hashing,
    #[error("Password verification failed")]
    Verification,
    #[error("Token signing failed: {0}")]
    Signing(String),
    #[error("Invalid or expired token")]
    InvalidToken,
}

/// HMAC secret used to sign session tokens; zeroed when dropped
#[derive(Clone, ZeroizeOnDrop)]
pub struct SigningKey {
    secret: Vec<u8>,
}

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.secret
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    /// Issued-at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// Hashes passwords and issues session tokens.
///
/// The signing key is injected at construction. A service built without one
/// still hashes and verifies passwords, but every token operation fails with
/// [`CredentialError::Signing`] or [`CredentialError::InvalidToken`].
#[derive(Clone)]
pub struct CredentialService {
    signing_key: Option<SigningKey>,
    params: Params,
    dummy_hash: String,
}

impl CredentialService {
    /// Create a service using the production hashing cost
    /// (Argon2id, 64 MiB, 3 passes).
    pub fn new(signing_key: Option<SigningKey>) -> Result<Self, CredentialError> {
        let params = Params::new(64 * 1024, 3, 1, None).map_err(|_| CredentialError::Hashing)?;
        Self::with_params(signing_key, params)
    }

    /// Create a service with explicit Argon2 parameters
    pub fn with_params(
        signing_key: Option<SigningKey>,
        params: Params,
    ) -> Result<Self, CredentialError> {
        let signing_key = signing_key.filter(|key| !key.as_bytes().is_empty());
        let mut service = Self {
            signing_key,
            params,
            dummy_hash: String::new(),
        };
        service.dummy_hash = service.hash(DUMMY_PASSWORD)?;
        Ok(service)
    }

    pub fn has_signing_key(&self) -> bool {
        self.signing_key.is_some()
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh random salt, returning a PHC string
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| CredentialError::Hashing)
    }

    /// Check a password against a stored PHC string.
    ///
    /// A mismatch is `Ok(false)`; only an unusable hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(hash).map_err(|_| CredentialError::Verification)?;

        match self.hasher().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(CredentialError::Verification),
        }
    }

    /// Spend one verification on a fixed hash and discard the result
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// Issue a signed session token for the user, valid for one hour
    pub fn issue_token(&self, user_id: Uuid, email: &str) -> Result<String, CredentialError> {
        self.issue_token_at(user_id, email, Utc::now())
    }

    /// Issue a session token as if the current time were `now`
    pub fn issue_token_at(
        &self,
        user_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| CredentialError::Signing("signing key unavailable".to_string()))?;

        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECONDS)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    /// Check signature and expiry of a session token and return its claims
    pub fn verify_token(&self, token: &str) -> Result<Claims, CredentialError> {
        let key = self
            .signing_key
            .as_ref()
            .ok_or(CredentialError::InvalidToken)?;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(key.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| CredentialError::InvalidToken)
    }
}
