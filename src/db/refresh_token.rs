//! Refresh-token store: the only server-side session state.
//!
//! Access tokens are stateless; refresh tokens are opaque keys into this
//! table. A token is valid exactly while its row exists and is unexpired,
//! which gives revocation (delete) and single-use rotation (transactional
//! delete + insert) for free.

use sqlx::sqlite::SqlitePool;

use super::PrincipalRole;

/// A stored refresh-token entry.
#[derive(Debug, Clone)]
pub struct RefreshTokenEntry {
    pub token: String,
    pub principal_uuid: String,
    pub role: PrincipalRole,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    token: String,
    principal_uuid: String,
    role: String,
    issued_at: i64,
    expires_at: i64,
}

impl From<RefreshTokenRow> for RefreshTokenEntry {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            token: row.token,
            principal_uuid: row.principal_uuid,
            role: PrincipalRole::from_str(&row.role),
            issued_at: row.issued_at,
            expires_at: row.expires_at,
        }
    }
}

/// Store for refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a refresh token for a principal (at login).
    pub async fn insert(
        &self,
        token: &str,
        principal_uuid: &str,
        role: PrincipalRole,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token, principal_uuid, role, issued_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(token)
        .bind(principal_uuid)
        .bind(role.as_str())
        .bind(issued_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a refresh token. Expired rows are treated as absent even
    /// before the cleanup task evicts them.
    pub async fn get(
        &self,
        token: &str,
        now: i64,
    ) -> Result<Option<RefreshTokenEntry>, sqlx::Error> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT token, principal_uuid, role, issued_at, expires_at
             FROM refresh_tokens WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenEntry::from))
    }

    /// Atomically replace `old_token` with `new_token` for the same
    /// principal, constrained to the expected audience.
    ///
    /// Returns the consumed entry, or `None` without any mutation when the
    /// old token is unknown, expired, or bound to a different audience.
    /// The delete and insert commit together, so two concurrent rotations of
    /// one token cannot both succeed: only one delete observes a row.
    pub async fn rotate(
        &self,
        old_token: &str,
        new_token: &str,
        role: PrincipalRole,
        now: i64,
        expires_at: i64,
    ) -> Result<Option<RefreshTokenEntry>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT token, principal_uuid, role, issued_at, expires_at
             FROM refresh_tokens WHERE token = ? AND role = ? AND expires_at > ?",
        )
        .bind(old_token)
        .bind(role.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(old_token)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (token, principal_uuid, role, issued_at, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_token)
        .bind(&row.principal_uuid)
        .bind(&row.role)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(RefreshTokenEntry::from(row)))
    }

    /// Delete a refresh token (logout / explicit revocation).
    pub async fn delete(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired tokens (TTL eviction).
    pub async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every token for a principal (logout everywhere).
    pub async fn delete_all_for_principal(
        &self,
        principal_uuid: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE principal_uuid = ?")
            .bind(principal_uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count unexpired tokens for a principal.
    pub async fn count_for_principal(
        &self,
        principal_uuid: &str,
        now: i64,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM refresh_tokens WHERE principal_uuid = ? AND expires_at > ?",
        )
        .bind(principal_uuid)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Count all unexpired tokens (active sessions across both audiences).
    pub async fn count_active(&self, now: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE expires_at > ?")
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}
