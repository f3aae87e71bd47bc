use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// A stored user record, including secrets. Never serialized.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    /// The single refresh token currently valid for this user.
    pub refresh_token: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    username: String,
    email: String,
    full_name: Option<String>,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
        }
    }
}

/// Public view of a user. Does not expose the password hash, the refresh
/// token, or internal database IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(skip)]
    pub user_id: i64,
    #[serde(rename = "id")]
    pub uuid: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub created_at: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            uuid: user.uuid.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// Fields for inserting a new user. Username and email must already be lower-cased.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub uuid: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: Option<&'a str>,
    pub password_hash: &'a str,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user and return the stored record.
    pub async fn create(&self, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (uuid, username, email, full_name, password_hash) VALUES (?, ?, ?, ?, ?)
             RETURNING id, uuid, username, email, full_name, password_hash, refresh_token, created_at",
        )
        .bind(new_user.uuid)
        .bind(new_user.username)
        .bind(new_user.email)
        .bind(new_user.full_name)
        .bind(new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user matching either the username or the email.
    pub async fn get_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, username, email, full_name, password_hash, refresh_token, created_at FROM users WHERE username = ? OR email = ? LIMIT 1",
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Overwrite (or clear with `None`) the stored refresh token.
    /// Returns false if no user has this UUID.
    pub async fn set_refresh_token(
        &self,
        uuid: &str,
        token: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE uuid = ?")
            .bind(token)
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored refresh token only if it still equals `expected`.
    /// Returns false if the user is gone or the stored value changed.
    pub async fn swap_refresh_token(
        &self,
        uuid: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = ? WHERE uuid = ? AND refresh_token = ?")
                .bind(new)
                .bind(uuid)
                .bind(expected)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user by ID.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
