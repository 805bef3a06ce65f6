//! Authentication and authorization module
//!
//! JWT auth, TOTP multi-factor, roles, and middleware:
//! - [`JwtService`] - JWT token service
//! - [`CurrentUser`] - current user context
//! - [`totp`] - time-based one-time passwords and recovery codes
//! - [`require_auth`] - authentication middleware
//! - [`require_role`] / [`require_admin`] - role middleware

pub mod jwt;
pub mod middleware;
pub mod roles;
pub mod totp;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::{require_admin, require_auth, require_role};
