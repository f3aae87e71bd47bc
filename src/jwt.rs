//! JWT token generation and validation.
//!
//! Two token kinds, each signed with its own secret:
//! - Access tokens: short-lived, stateless, never persisted
//! - Refresh tokens: long-lived, carry a JTI, current instance stored on the user row

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default access token lifetime: 15 minutes
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest lifetime accepted for either token kind (ten years).
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Token kind, embedded as the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// JWT ID, only present on refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Secret and lifetime for one token kind.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: Vec<u8>,
    pub ttl_secs: u64,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token lifetime in seconds
    pub ttl_secs: u64,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl KindKeys {
    fn new(settings: &TokenSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(&settings.secret),
            decoding: DecodingKey::from_secret(&settings.secret),
            ttl_secs: settings.ttl_secs,
        }
    }
}

/// Signing and verification keys for both token kinds.
pub struct JwtConfig {
    access: KindKeys,
    refresh: KindKeys,
}

impl JwtConfig {
    pub fn new(access: &TokenSettings, refresh: &TokenSettings) -> Self {
        Self {
            access: KindKeys::new(access),
            refresh: KindKeys::new(refresh),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of the given token kind in seconds.
    pub fn ttl_secs(&self, kind: TokenKind) -> u64 {
        self.keys(kind).ttl_secs
    }

    /// Sign a token of the given kind for a user.
    pub fn sign(&self, kind: TokenKind, user_uuid: &str) -> Result<SignedToken, JwtError> {
        self.sign_at(kind, user_uuid, now_secs()?)
    }

    fn sign_at(&self, kind: TokenKind, user_uuid: &str, now: u64) -> Result<SignedToken, JwtError> {
        let keys = self.keys(kind);
        let exp = now
            .checked_add(keys.ttl_secs)
            .ok_or(JwtError::TimeError)?;

        let claims = Claims {
            sub: user_uuid.to_string(),
            kind,
            jti: match kind {
                TokenKind::Access => None,
                TokenKind::Refresh => Some(uuid::Uuid::new_v4().to_string()),
            },
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding)
            .map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            issued_at: now,
            expires_at: exp,
            ttl_secs: keys.ttl_secs,
        })
    }

    /// Validate and decode a token of the given kind.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &validation)
                .map_err(JwtError::from_decode)?;

        if token_data.claims.kind != kind {
            return Err(JwtError::WrongKind);
        }

        Ok(token_data.claims)
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("wrong token kind")]
    WrongKind,
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    TimeError,
}

impl JwtError {
    fn from_decode(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::SignatureInvalid,
            _ => JwtError::Malformed(e),
        }
    }
}
