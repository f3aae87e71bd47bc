//! Session core: token issuance, refresh rotation and request authentication.
//!
//! Each user holds at most one valid refresh token, stored on the user record.
//! Issuing a pair overwrites it, rotation replaces it, logout clears it. A
//! refresh token is accepted only while it is byte-for-byte the stored one, so
//! a token that has been rotated away is rejected even before it expires.

mod error;
mod store;

use std::sync::{Arc, LazyLock};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::{Database, NewUser, Principal};
use crate::jwt::{JwtConfig, SignedToken, TokenKind};
use crate::password::{hash_password, verify_password};

pub use error::{AuthFailure, PolicyError, SessionError};
pub use store::{PrincipalStore, RefreshTokenWrite, StoreError};

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum full name length.
pub const MAX_FULL_NAME_LENGTH: usize = 100;

/// How a refresh rotation writes the replacement token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RotationMode {
    /// Check the presented token, then overwrite unconditionally. Two racing
    /// rotations can both succeed; the last write wins.
    #[default]
    Overwrite,
    /// Replace the stored token only if it still equals the presented one.
    /// A lost race fails as unauthenticated.
    CompareAndSwap,
}

/// Session limits applied per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    max_active_sessions: usize,
    rotation: RotationMode,
}

impl SessionPolicy {
    /// The only session count the single-token storage can enforce.
    pub const SINGLE_SESSION: usize = 1;

    pub fn new(max_active_sessions: usize, rotation: RotationMode) -> Result<Self, PolicyError> {
        if max_active_sessions != Self::SINGLE_SESSION {
            return Err(PolicyError::UnsupportedSessionCount(max_active_sessions));
        }
        Ok(Self {
            max_active_sessions,
            rotation,
        })
    }

    pub fn single_session(rotation: RotationMode) -> Self {
        Self {
            max_active_sessions: Self::SINGLE_SESSION,
            rotation,
        }
    }

    pub fn max_active_sessions(&self) -> usize {
        self.max_active_sessions
    }

    pub fn rotation(&self) -> RotationMode {
        self.rotation
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::single_session(RotationMode::default())
    }
}

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

/// Registration input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub full_name: Option<String>,
}

/// Login input. Either username or email identifies the account.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Hash checked when a login names an unknown account, so the response time
/// does not reveal whether the account exists.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("dummy-password-for-timing").unwrap_or_default());

/// Issues, rotates, verifies and revokes session tokens over a principal store.
pub struct SessionService<S = Database> {
    store: S,
    jwt: Arc<JwtConfig>,
    policy: SessionPolicy,
}

impl<S: PrincipalStore> SessionService<S> {
    pub fn new(store: S, jwt: Arc<JwtConfig>, policy: SessionPolicy) -> Self {
        Self { store, jwt, policy }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    fn mint(&self, user_uuid: &str) -> Result<TokenPair, SessionError> {
        let access = self
            .jwt
            .sign(TokenKind::Access, user_uuid)
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        let refresh = self
            .jwt
            .sign(TokenKind::Refresh, user_uuid)
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        Ok(TokenPair { access, refresh })
    }

    /// Mint a new token pair and store the refresh token, replacing any
    /// previous session for this user. Performs exactly one store write.
    pub async fn issue(&self, user_uuid: &str) -> Result<TokenPair, SessionError> {
        let pair = self.mint(user_uuid)?;

        let written = self
            .store
            .write_refresh_token(user_uuid, RefreshTokenWrite::Set(&pair.refresh.token))
            .await?;
        if !written {
            return Err(SessionError::PrincipalNotFound);
        }

        Ok(pair)
    }

    /// Create an account and start its first session.
    pub async fn register(
        &self,
        registration: &Registration,
    ) -> Result<(Principal, TokenPair), SessionError> {
        let username = registration.username.trim().to_lowercase();
        let email = registration.email.trim().to_lowercase();
        let full_name = registration
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if username.is_empty() || email.is_empty() || registration.password.trim().is_empty() {
            return Err(SessionError::Validation("All fields are required".into()));
        }
        validate_username(&username)?;
        validate_email(&email)?;
        if full_name.is_some_and(|name| name.chars().count() > MAX_FULL_NAME_LENGTH) {
            return Err(SessionError::Validation(format!(
                "Full name cannot be longer than {} characters",
                MAX_FULL_NAME_LENGTH
            )));
        }

        let password_hash = hash_password(&registration.password)?;
        let uuid = uuid::Uuid::new_v4().to_string();

        let user = self
            .store
            .create(NewUser {
                uuid: &uuid,
                username: &username,
                email: &email,
                full_name,
                password_hash: &password_hash,
            })
            .await?;

        let tokens = self.issue(&user.uuid).await?;
        info!(user = %user.uuid, username = %user.username, "User registered");

        Ok((Principal::from(&user), tokens))
    }

    /// Check credentials and start a new session, ending any previous one.
    pub async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<(Principal, TokenPair), SessionError> {
        let normalize = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
        };
        let username = normalize(&credentials.username);
        let email = normalize(&credentials.email);

        if credentials.password.is_empty() || (username.is_none() && email.is_none()) {
            return Err(SessionError::Validation("Credentials missing".into()));
        }

        let Some(user) = self
            .store
            .find_by_login(username.as_deref(), email.as_deref())
            .await?
        else {
            let _ = verify_password(&credentials.password, &DUMMY_HASH);
            debug!("Login for unknown account");
            return Err(SessionError::unauthenticated(AuthFailure::BadCredentials));
        };

        if !verify_password(&credentials.password, &user.password_hash)? {
            debug!(user = %user.uuid, "Login with wrong password");
            return Err(SessionError::unauthenticated(AuthFailure::BadCredentials));
        }

        let tokens = self.issue(&user.uuid).await?;
        info!(user = %user.uuid, "User logged in");

        Ok((Principal::from(&user), tokens))
    }

    /// End the user's session by clearing the stored refresh token.
    pub async fn logout(&self, user_uuid: &str) -> Result<(), SessionError> {
        self.store
            .write_refresh_token(user_uuid, RefreshTokenWrite::Clear)
            .await?;
        info!(user = %user_uuid, "User logged out");
        Ok(())
    }

    /// Resolve the principal behind an access token.
    ///
    /// Read-only. Token and principal failures are `Unauthenticated`, with the
    /// reason kept for logging only. Store failures stay `Store`.
    pub async fn authenticate(&self, access_token: Option<&str>) -> Result<Principal, SessionError> {
        let token = access_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::unauthenticated(AuthFailure::MissingToken))?;

        let claims = self
            .jwt
            .verify(TokenKind::Access, token)
            .map_err(SessionError::unauthenticated)?;

        let user = self
            .store
            .find_by_uuid(&claims.sub)
            .await?
            .ok_or(SessionError::unauthenticated(AuthFailure::UnknownPrincipal))?;

        Ok(Principal::from(&user))
    }

    /// Exchange the current refresh token for a new pair.
    ///
    /// The presented token must verify and must equal the stored token exactly.
    /// On success the stored token is replaced, so the presented one can never
    /// be used again.
    ///
    /// Under [`RotationMode::Overwrite`], two concurrent rotations with the same
    /// token can both pass the equality check; the later write wins and the
    /// other client's new refresh token fails on its next use.
    pub async fn rotate(&self, presented: Option<&str>) -> Result<TokenPair, SessionError> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::unauthenticated(AuthFailure::MissingToken))?;

        let claims = self
            .jwt
            .verify(TokenKind::Refresh, presented)
            .map_err(SessionError::unauthenticated)?;

        let user = self
            .store
            .find_by_uuid(&claims.sub)
            .await?
            .ok_or(SessionError::unauthenticated(AuthFailure::UnknownPrincipal))?;

        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user = %user.uuid, "Rejected refresh token that is not the current one");
            return Err(SessionError::unauthenticated(AuthFailure::TokenReused));
        }

        match self.policy.rotation {
            RotationMode::Overwrite => match self.issue(&user.uuid).await {
                Err(SessionError::PrincipalNotFound) => Err(SessionError::unauthenticated(
                    AuthFailure::UnknownPrincipal,
                )),
                other => other,
            },
            RotationMode::CompareAndSwap => {
                let pair = self.mint(&user.uuid)?;
                let swapped = self
                    .store
                    .write_refresh_token(
                        &user.uuid,
                        RefreshTokenWrite::Replace {
                            expected: presented,
                            new: &pair.refresh.token,
                        },
                    )
                    .await?;
                if !swapped {
                    warn!(user = %user.uuid, "Refresh token changed during rotation");
                    return Err(SessionError::unauthenticated(AuthFailure::RotationConflict));
                }
                Ok(pair)
            }
        }
    }
}

fn validate_username(username: &str) -> Result<(), SessionError> {
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(SessionError::Validation(format!(
            "Username cannot be longer than {} characters",
            MAX_USERNAME_LENGTH
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(SessionError::Validation(
            "Username can only contain letters, numbers, and underscores".into(),
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), SessionError> {
    let invalid = || SessionError::Validation("Invalid email address".into());

    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    Ok(())
}
