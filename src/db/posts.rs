//! Post storage.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

/// Publication status of a post. Only active posts are listed publicly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Inactive,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Active => "active",
            PostStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "inactive" => PostStatus::Inactive,
            _ => PostStatus::Active,
        }
    }
}

/// A post together with its author's username.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub author: String,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub featured_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    uuid: String,
    user_id: i64,
    author: String,
    title: String,
    content: String,
    status: String,
    featured_image: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            author: row.author,
            title: row.title,
            content: row.content,
            status: PostStatus::from_str(&row.status),
            featured_image: row.featured_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for creating or updating a post.
#[derive(Debug, Clone, Copy)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub status: PostStatus,
    pub featured_image: Option<&'a str>,
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new post. Returns the post UUID.
    pub async fn create(&self, user_id: i64, post: NewPost<'_>) -> Result<String, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO posts (uuid, user_id, title, content, status, featured_image) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(post.title)
        .bind(post.content)
        .bind(post.status.as_str())
        .bind(post.featured_image)
        .execute(&self.pool)
        .await?;

        Ok(uuid)
    }

    /// Get a post by UUID regardless of owner.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Post>, sqlx::Error> {
        let row: Option<PostRow> = sqlx::query_as(
            "SELECT p.id, p.uuid, p.user_id, u.username AS author, p.title, p.content, p.status, p.featured_image, p.created_at, p.updated_at
             FROM posts p JOIN users u ON u.id = p.user_id
             WHERE p.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Post::from))
    }

    /// List all active posts, newest first.
    pub async fn list_active(&self) -> Result<Vec<Post>, sqlx::Error> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT p.id, p.uuid, p.user_id, u.username AS author, p.title, p.content, p.status, p.featured_image, p.created_at, p.updated_at
             FROM posts p JOIN users u ON u.id = p.user_id
             WHERE p.status = 'active'
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// List every post owned by a user, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT p.id, p.uuid, p.user_id, u.username AS author, p.title, p.content, p.status, p.featured_image, p.created_at, p.updated_at
             FROM posts p JOIN users u ON u.id = p.user_id
             WHERE p.user_id = ?
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Update a post by UUID. Only updates if the post belongs to the given user.
    /// Returns true if the post was updated.
    pub async fn update(
        &self,
        uuid: &str,
        user_id: i64,
        post: NewPost<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET title = ?, content = ?, status = ?, featured_image = COALESCE(?, featured_image), updated_at = datetime('now')
             WHERE uuid = ? AND user_id = ?",
        )
        .bind(post.title)
        .bind(post.content)
        .bind(post.status.as_str())
        .bind(post.featured_image)
        .bind(uuid)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a post by UUID. Only deletes if the post belongs to the given user.
    pub async fn delete(&self, uuid: &str, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE uuid = ? AND user_id = ?")
            .bind(uuid)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
