//! Authentication layer for the postbrand API server.
//!
//! A single strategy: short-lived bearer tokens carrying a role claim,
//! verified with HMAC-SHA256 against the configured signing secret.

pub mod middleware;
pub mod token;

pub use middleware::{auth_middleware, require_role};
pub use token::{Claims, Role};
