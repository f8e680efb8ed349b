//! Authentication state trait and impl macro.

use crate::db::Database;
use crate::jwt::JwtConfig;

/// Trait for router state types that provide JWT and database access for
/// authentication.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
}

/// Implement `HasAuthState` for state structs with the standard fields
/// `jwt: Arc<JwtConfig>` and `db: Database`.
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthState for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}
