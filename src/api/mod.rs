mod error;
mod posts;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::CookiePolicy;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionService;

pub use error::ApiError;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    sessions: Arc<SessionService>,
    cookies: CookiePolicy,
    no_signup: bool,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let posts_state = posts::PostsState {
        db,
        sessions: sessions.clone(),
        cookies,
    };

    let users_state = users::UsersState {
        sessions,
        cookies,
        no_signup,
        rate_limit_config,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/posts", posts::router(posts_state))
}
