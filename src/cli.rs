//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{ClientIpHeader, DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS};
use crate::db::Database;
use crate::jwt::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS, TokenSettings,
};
use crate::rate_limit::RateLimitConfig;
use crate::session::{RotationMode, SessionPolicy};
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

pub const ACCESS_TOKEN_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_TOKEN_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "inkpost", about = "Posts API with cookie-based token sessions")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "inkpost.db")]
    pub database: String,

    /// Public origin the API is served from (https enables Secure cookies)
    #[arg(long, default_value = "http://localhost:8000")]
    pub public_origin: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds (also the refresh cookie Max-Age)
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TOKEN_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub refresh_token_ttl: u64,

    /// Access token cookie Max-Age in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS)]
    pub access_cookie_max_age: u64,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// How refresh rotation writes the new token
    #[arg(long, value_enum, default_value = "overwrite")]
    pub rotation: RotationMode,

    /// Maximum concurrent sessions per user (only 1 is supported)
    #[arg(long, default_value_t = SessionPolicy::SINGLE_SESSION)]
    pub max_sessions: usize,

    /// Disable new user registration
    #[arg(long)]
    pub no_signup: bool,

    /// Take the client IP from this proxy header (for rate limiting)
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("{env_var} is required. Set it (recommended) or pass the matching --*-secret-file option")]
    Missing { env_var: &'static str },
    #[error("failed to read secret file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("{env_var} is empty")]
    Empty { env_var: &'static str },
    #[error("{env_var} is shorter than 32 bytes. Use a longer secret")]
    TooShort { env_var: &'static str },
    #[error("access and refresh token secrets must differ")]
    Identical,
}

/// Load a token secret from an environment variable or a file.
///
/// The environment variable wins and is removed after reading.
pub fn load_secret(env_var: &'static str, file: Option<&str>) -> Result<String, SecretError> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // SAFETY: called during startup before the runtime spawns any task,
        // and no other code reads this variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        std::fs::read_to_string(path)
            .map_err(|source| SecretError::Read {
                path: path.to_string(),
                source,
            })?
            .trim()
            .to_string()
    } else {
        return Err(SecretError::Missing { env_var });
    };

    if secret.is_empty() {
        return Err(SecretError::Empty { env_var });
    }
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(SecretError::TooShort { env_var });
    }

    Ok(secret)
}

/// Access and refresh tokens must not share a signing secret.
pub fn validate_secrets(access: &str, refresh: &str) -> Result<(), SecretError> {
    if access == refresh {
        return Err(SecretError::Identical);
    }
    Ok(())
}

/// Load and validate both token secrets. Logs and returns None on failure.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let result = load_secret(
        ACCESS_TOKEN_SECRET_ENV,
        args.access_token_secret_file.as_deref(),
    )
    .and_then(|access| {
        let refresh = load_secret(
            REFRESH_TOKEN_SECRET_ENV,
            args.refresh_token_secret_file.as_deref(),
        )?;
        validate_secrets(&access, &refresh)?;
        Ok((access, refresh))
    });

    match result {
        Ok(secrets) => Some(secrets),
        Err(e) => {
            error!(error = %e, "Invalid token secret configuration");
            None
        }
    }
}

/// Parse and validate the public origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(public_origin: &str) -> Option<Url> {
    let url = match Url::parse(public_origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %public_origin, error = %e, "Invalid public-origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

    if !is_https && !is_localhost {
        error!("public-origin must use HTTPS for non-localhost deployments");
        return None;
    }
    if !is_https {
        warn!("Serving over plain HTTP: cookies use SameSite=Lax and are not Secure");
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the session policy is invalid.
pub fn build_config(
    args: &Args,
    db: Database,
    public_origin: &Url,
    access_secret: String,
    refresh_secret: String,
) -> Option<ServerConfig> {
    let session_policy = match SessionPolicy::new(args.max_sessions, args.rotation) {
        Ok(policy) => policy,
        Err(e) => {
            error!(error = %e, "Invalid session policy");
            return None;
        }
    };

    Some(ServerConfig {
        db,
        access_token: TokenSettings {
            secret: access_secret.into_bytes(),
            ttl_secs: args.access_token_ttl,
        },
        refresh_token: TokenSettings {
            secret: refresh_secret.into_bytes(),
            ttl_secs: args.refresh_token_ttl,
        },
        secure_cookies: public_origin.scheme() == "https",
        access_cookie_max_age: args.access_cookie_max_age,
        session_policy,
        no_signup: args.no_signup,
        rate_limit: RateLimitConfig::new(args.ip_header),
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
