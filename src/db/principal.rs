use sqlx::sqlite::SqlitePool;

/// Principal role for authorization. Members and admins share one table and
/// one login flow; the role column is the only difference between audiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalRole {
    Member,
    Admin,
}

impl PrincipalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalRole::Member => "member",
            PrincipalRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => PrincipalRole::Admin,
            _ => PrincipalRole::Member,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, PrincipalRole::Admin)
    }
}

/// Account status. Inactive principals cannot log in, refresh, or use
/// admin-gated routes; already-issued access tokens for member routes remain
/// valid until expiry because member routes are checked statelessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    Active,
    Inactive,
}

impl PrincipalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalStatus::Active => "active",
            PrincipalStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "inactive" => PrincipalStatus::Inactive,
            _ => PrincipalStatus::Active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: PrincipalRole,
    pub status: PrincipalStatus,
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: i64,
    uuid: String,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    status: String,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: PrincipalRole::from_str(&row.role),
            status: PrincipalStatus::from_str(&row.status),
        }
    }
}

/// Store for member and admin accounts.
#[derive(Clone)]
pub struct PrincipalStore {
    pool: SqlitePool,
}

impl PrincipalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new active principal. Returns the row ID.
    pub async fn create(
        &self,
        uuid: &str,
        email: &str,
        name: &str,
        password_hash: &str,
        role: PrincipalRole,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO principals (uuid, email, name, password_hash, role, status)
             VALUES (?, ?, ?, ?, ?, 'active')",
        )
        .bind(uuid)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a principal by email, constrained to one audience.
    /// Login uses this so member credentials never match the admin endpoint.
    pub async fn get_by_email(
        &self,
        email: &str,
        role: PrincipalRole,
    ) -> Result<Option<Principal>, sqlx::Error> {
        let row: Option<PrincipalRow> = sqlx::query_as(
            "SELECT id, uuid, email, name, password_hash, role, status
             FROM principals WHERE email = ? AND role = ?",
        )
        .bind(email)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Principal::from))
    }

    /// Get a principal by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Principal>, sqlx::Error> {
        let row: Option<PrincipalRow> = sqlx::query_as(
            "SELECT id, uuid, email, name, password_hash, role, status
             FROM principals WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Principal::from))
    }

    /// Set the status for a principal.
    pub async fn set_status(
        &self,
        uuid: &str,
        status: PrincipalStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE principals SET status = ? WHERE uuid = ?")
            .bind(status.as_str())
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count principals with the given role.
    pub async fn count_by_role(&self, role: PrincipalRole) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM principals WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
