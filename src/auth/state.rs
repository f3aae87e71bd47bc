//! Authentication state trait and macro.

use super::cookie::CookiePolicy;
use crate::session::SessionService;

/// Trait for state types that can authenticate requests.
pub trait HasAuthBackend {
    fn sessions(&self) -> &SessionService;
    fn cookies(&self) -> &CookiePolicy;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `sessions: Arc<SessionService>`
/// - `cookies: CookiePolicy`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub sessions: Arc<SessionService>,
///     pub cookies: CookiePolicy,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn sessions(&self) -> &$crate::session::SessionService {
                &self.sessions
            }
            fn cookies(&self) -> &$crate::auth::CookiePolicy {
                &self.cookies
            }
        }
    };
}
