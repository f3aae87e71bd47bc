//! Posts API.
//!
//! Listing active posts and reading a single post are public. Everything
//! else requires authentication, and only the owner may modify a post.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::error::{ApiError, ResultExt, validate_uuid};
use crate::auth::{Auth, CookiePolicy, MaybeAuth};
use crate::db::{Database, NewPost, Post, PostStatus, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::session::SessionService;

const MAX_TITLE_LENGTH: usize = 200;
const MAX_CONTENT_LENGTH: usize = 100_000;

/// State for posts endpoints.
#[derive(Clone)]
pub struct PostsState {
    pub db: Database,
    pub sessions: Arc<SessionService>,
    pub cookies: CookiePolicy,
}

impl_has_auth_backend!(PostsState);

pub fn router(state: PostsState) -> Router {
    Router::new()
        .route("/", get(list_own_posts).post(create_post))
        .route("/active", get(list_active_posts))
        .route(
            "/{uuid}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    status: Option<PostStatus>,
    featured_image: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePostRequest {
    title: Option<String>,
    content: Option<String>,
    status: Option<PostStatus>,
    featured_image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostResponse {
    id: String,
    author: String,
    title: String,
    content: String,
    status: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_image: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.uuid,
            author: post.author,
            title: post.title,
            content: post.content,
            status: post.status,
            featured_image: post.featured_image,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Serialize)]
struct PostEnvelope {
    post: PostResponse,
}

#[derive(Serialize)]
struct PostsEnvelope {
    posts: Vec<PostResponse>,
}

// --- Helpers ---

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Title cannot be longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    if content.len() > MAX_CONTENT_LENGTH {
        return Err(ApiError::bad_request("Content is too long"));
    }
    Ok(())
}

fn validate_image_url(image: &str) -> Result<(), ApiError> {
    match Url::parse(image) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ApiError::bad_request("Featured image must be an http(s) URL")),
    }
}

/// Fetch a post and check that `user_id` owns it.
async fn owned_post(db: &Database, uuid: &str, user_id: i64) -> Result<Post, ApiError> {
    validate_uuid(uuid)?;
    let post = db
        .posts()
        .get_by_uuid(uuid)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    if post.user_id != user_id {
        return Err(ApiError::forbidden("You can only modify your own posts"));
    }
    Ok(post)
}

fn title_conflict(e: sqlx::Error, context: &str) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::conflict("A post with this title already exists")
    } else {
        ApiError::db_error(context, e)
    }
}

// --- Handlers ---

async fn list_active_posts(
    State(state): State<PostsState>,
) -> Result<Json<PostsEnvelope>, ApiError> {
    let posts = state
        .db
        .posts()
        .list_active()
        .await
        .db_err("Failed to list posts")?;

    Ok(Json(PostsEnvelope {
        posts: posts.into_iter().map(PostResponse::from).collect(),
    }))
}

async fn list_own_posts(
    State(state): State<PostsState>,
    Auth(user): Auth,
) -> Result<Json<PostsEnvelope>, ApiError> {
    let posts = state
        .db
        .posts()
        .list_by_user(user.user_id)
        .await
        .db_err("Failed to list posts")?;

    Ok(Json(PostsEnvelope {
        posts: posts.into_iter().map(PostResponse::from).collect(),
    }))
}

/// Inactive posts are visible only to their owner.
async fn get_post(
    State(state): State<PostsState>,
    MaybeAuth(user): MaybeAuth,
    Path(uuid): Path<String>,
) -> Result<Json<PostEnvelope>, ApiError> {
    validate_uuid(&uuid)?;

    let post = state
        .db
        .posts()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let is_owner = user.is_some_and(|u| u.user_id == post.user_id);
    if post.status == PostStatus::Inactive && !is_owner {
        return Err(ApiError::not_found("Post not found"));
    }

    Ok(Json(PostEnvelope { post: post.into() }))
}

async fn create_post(
    State(state): State<PostsState>,
    Auth(user): Auth,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    let content = payload.content.trim();
    validate_title(title)?;
    validate_content(content)?;
    if let Some(image) = payload.featured_image.as_deref() {
        validate_image_url(image)?;
    }

    let uuid = state
        .db
        .posts()
        .create(
            user.user_id,
            NewPost {
                title,
                content,
                status: payload.status.unwrap_or(PostStatus::Active),
                featured_image: payload.featured_image.as_deref(),
            },
        )
        .await
        .map_err(|e| title_conflict(e, "Failed to create post"))?;

    let post = state
        .db
        .posts()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::internal("Post disappeared after creation"))?;

    info!(user = %user.uuid, post = %uuid, "Post created");

    Ok((StatusCode::CREATED, Json(PostEnvelope { post: post.into() })))
}

async fn update_post(
    State(state): State<PostsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostEnvelope>, ApiError> {
    let existing = owned_post(&state.db, &uuid, user.user_id).await?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .unwrap_or(existing.title.as_str());
    let content = payload
        .content
        .as_deref()
        .map(str::trim)
        .unwrap_or(existing.content.as_str());
    validate_title(title)?;
    validate_content(content)?;
    if let Some(image) = payload.featured_image.as_deref() {
        validate_image_url(image)?;
    }

    let updated = state
        .db
        .posts()
        .update(
            &uuid,
            user.user_id,
            NewPost {
                title,
                content,
                status: payload.status.unwrap_or(existing.status),
                featured_image: payload.featured_image.as_deref(),
            },
        )
        .await
        .map_err(|e| title_conflict(e, "Failed to update post"))?;

    if !updated {
        return Err(ApiError::not_found("Post not found"));
    }

    let post = state
        .db
        .posts()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(Json(PostEnvelope { post: post.into() }))
}

async fn delete_post(
    State(state): State<PostsState>,
    Auth(user): Auth,
    Path(uuid): Path<String>,
) -> Result<StatusCode, ApiError> {
    owned_post(&state.db, &uuid, user.user_id).await?;

    let deleted = state
        .db
        .posts()
        .delete(&uuid, user.user_id)
        .await
        .db_err("Failed to delete post")?;

    if !deleted {
        return Err(ApiError::not_found("Post not found"));
    }

    info!(user = %user.uuid, post = %uuid, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}
