//! JWT access-token issuance/validation and opaque refresh-token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::PrincipalRole;

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Number of random bytes in an opaque refresh token.
const REFRESH_TOKEN_BYTES: usize = 32;

/// JWT claims for access tokens.
///
/// One canonical shape for both audiences: `sub` is the principal uuid and
/// `role` carries the audience. Nothing else is embedded, so a member token
/// and an admin token differ only in `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal UUID)
    pub sub: String,
    /// Principal role (member or admin)
    pub role: PrincipalRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and the default
    /// 15-minute access token TTL.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_access_ttl(secret, ACCESS_TOKEN_DURATION_SECS)
    }

    /// Create a configuration with a custom access token TTL.
    /// Tests use short TTLs to exercise expiry without sleeping for minutes.
    pub fn with_access_ttl(secret: &[u8], access_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
        }
    }

    /// Access token TTL in seconds.
    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    /// Generate a signed access token for a principal.
    /// Access tokens are stateless: validity is signature plus expiry only.
    pub fn generate_access_token(
        &self,
        principal_uuid: &str,
        role: PrincipalRole,
    ) -> Result<String, JwtError> {
        let now = unix_timestamp()?;

        let claims = AccessClaims {
            sub: principal_uuid.to_string(),
            role,
            iat: now,
            exp: now + self.access_ttl_secs,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Validate and decode an access token.
    ///
    /// Expired tokens are reported distinctly from malformed ones: the client
    /// recovers from expiry via the refresh exchange, but a malformed token
    /// forces a fresh login.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(JwtError::Expired),
                _ => Err(JwtError::Malformed),
            },
        }
    }
}

/// Generate an opaque refresh token: random bytes, base64url-encoded.
///
/// Refresh tokens are deliberately not self-describing. Their validity is
/// determined solely by presence in the refresh-token store, which is what
/// makes rotation and revocation possible.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token signature is valid but the token has expired
    Expired,
    /// Token is missing claims, carries a bad signature, or is not a JWT
    Malformed,
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::Malformed => write!(f, "Malformed token"),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let token = config
            .generate_access_token("uuid-123", PrincipalRole::Member)
            .unwrap();

        let claims = config.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.role, PrincipalRole::Member);
        assert_eq!(claims.exp, claims.iat + ACCESS_TOKEN_DURATION_SECS);
    }

    #[test]
    fn test_admin_role_in_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let token = config
            .generate_access_token("uuid-456", PrincipalRole::Admin)
            .unwrap();

        let claims = config.validate_access_token(&token).unwrap();
        assert_eq!(claims.role, PrincipalRole::Admin);
    }

    #[test]
    fn test_invalid_token_is_malformed() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result = config.validate_access_token("invalid-token");
        assert!(matches!(result, Err(JwtError::Malformed)));
    }

    #[test]
    fn test_wrong_secret_is_malformed() {
        let config1 = JwtConfig::new(b"secret-1");
        let config2 = JwtConfig::new(b"secret-2");

        let token = config1
            .generate_access_token("uuid-123", PrincipalRole::Member)
            .unwrap();

        let result = config2.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::Malformed)));
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let secret = b"test-secret";
        let encoding_key = EncodingKey::from_secret(secret);

        let now = unix_timestamp().unwrap();
        let claims = AccessClaims {
            sub: "uuid-123".to_string(),
            role: PrincipalRole::Member,
            iat: now - 100,
            exp: now - 50, // Expired 50 seconds ago
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = JwtConfig::new(secret);
        let result = config.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_custom_access_ttl() {
        let config = JwtConfig::with_access_ttl(b"test-secret-key-for-testing", 60);

        let token = config
            .generate_access_token("uuid-123", PrincipalRole::Member)
            .unwrap();

        let claims = config.validate_access_token(&token).unwrap();
        assert_eq!(claims.exp, claims.iat + 60);
    }

    #[test]
    fn test_refresh_tokens_are_opaque_and_unique() {
        let t1 = generate_refresh_token();
        let t2 = generate_refresh_token();

        assert_ne!(t1, t2);
        // Not a JWT: no claim segments
        assert!(!t1.contains('.'));
    }
}
