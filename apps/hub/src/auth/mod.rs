//! # Authentication
//!
//! PIN verification, the login rate limiter, and the session middleware.

pub mod middleware;
pub mod pin;
pub mod rate_limit;

pub use middleware::{require_session, ClientIp, CurrentSession};
pub use pin::{hash_pin, PinAuthenticator};
pub use rate_limit::RateLimiter;
