//! JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (15 min, stateless) and
//! long-lived opaque refresh tokens (7 days, database-tracked, rotated on
//! every exchange). The server only classifies failures; expired-token
//! recovery belongs to the client interceptor.

mod bearer;
mod errors;
mod extractors;
mod state;

pub use bearer::bearer_token;
pub use errors::{AuthError, AuthErrorKind};
pub use extractors::{AdminAuth, Auth, AuthPrincipal};
pub use state::HasAuthState;
