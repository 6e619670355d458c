//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame denial, etc.)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Route guard (protected prefixes and auth pages)
//! 7. Rate limiting on the auth form posts (governor)

pub mod auth;
pub mod guest;
pub mod rate_limit;
pub mod request_id;
pub mod route_guard;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use guest::GuestToken;
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use route_guard::route_guard_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
