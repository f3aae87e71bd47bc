//! Persistence seam for the session core.
//!
//! The session core only needs a handful of record operations: find a user,
//! create one, and read/write the single "current refresh token" field.
//! `Database` implements this over SQLite; tests may substitute their own.

use std::future::Future;

use crate::db::{Database, NewUser, User};

/// Errors surfaced by a principal store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (duplicate username or email).
    #[error("record already exists")]
    Duplicate,
    /// The store could not be reached or failed the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if crate::db::is_unique_violation(&e) {
            StoreError::Duplicate
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }
}

/// A write to the stored refresh token field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenWrite<'a> {
    /// Unconditionally overwrite with a new value.
    Set(&'a str),
    /// Overwrite only while the stored value still equals `expected`.
    Replace { expected: &'a str, new: &'a str },
    /// Clear the field (logout).
    Clear,
}

/// Record operations the session core depends on.
pub trait PrincipalStore: Send + Sync {
    /// Find a user by UUID.
    fn find_by_uuid(
        &self,
        uuid: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Find a user by lower-cased username or email.
    fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    /// Create a user. Fails with `StoreError::Duplicate` on a taken username or email.
    fn create(&self, new_user: NewUser<'_>)
    -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Apply a refresh token write. Returns false when no record matched
    /// (unknown UUID, or a `Replace` whose expectation no longer holds).
    fn write_refresh_token(
        &self,
        uuid: &str,
        write: RefreshTokenWrite<'_>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

impl PrincipalStore for Database {
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().get_by_uuid(uuid).await?)
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.users().get_by_login(username, email).await?)
    }

    async fn create(&self, new_user: NewUser<'_>) -> Result<User, StoreError> {
        Ok(self.users().create(new_user).await?)
    }

    async fn write_refresh_token(
        &self,
        uuid: &str,
        write: RefreshTokenWrite<'_>,
    ) -> Result<bool, StoreError> {
        let users = self.users();
        let matched = match write {
            RefreshTokenWrite::Set(token) => users.set_refresh_token(uuid, Some(token)).await?,
            RefreshTokenWrite::Replace { expected, new } => {
                users.swap_refresh_token(uuid, expected, new).await?
            }
            RefreshTokenWrite::Clear => users.set_refresh_token(uuid, None).await?,
        };
        Ok(matched)
    }
}
