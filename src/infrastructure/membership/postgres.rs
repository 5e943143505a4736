//! PostgreSQL membership repository with connection pooling
//!
//! Every mutating operation runs in a single transaction that takes
//! `SELECT ... FOR UPDATE` row locks on the organisation's active
//! membership rows before re-checking the invariant it is about to rely
//! on. Two concurrent demotions/removals on the same organisation
//! therefore serialize on those locks; the loser re-reads the owner count
//! and fails with `LastOwner` instead of committing a violating write. A
//! partial unique index on the active (organisation, user) pair backstops
//! the uniqueness check.
//!
//! Transient transaction failures (serialization conflicts, deadlocks) are
//! retried a bounded number of times before surfacing a storage error;
//! domain errors are never retried.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    DomainError, Membership, MembershipId, MembershipRepository, OrgId, OrgRole, UserId,
};

const MEMBERSHIPS_TABLE: &str = "organization_memberships";
const MAX_TX_RETRIES: u32 = 3;
const TX_RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/engage".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Errors inside a write transaction, before retry classification
enum TxError {
    Domain(DomainError),
    Db(sqlx::Error),
}

impl From<sqlx::Error> for TxError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(e)
    }
}

impl From<DomainError> for TxError {
    fn from(e: DomainError) -> Self {
        Self::Domain(e)
    }
}

fn is_transient(e: &sqlx::Error) -> bool {
    // 40001 = serialization_failure, 40P01 = deadlock_detected
    matches!(
        e.as_database_error().and_then(|d| d.code()).as_deref(),
        Some("40001") | Some("40P01")
    )
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e.as_database_error().and_then(|d| d.code()).as_deref(),
        Some("23505")
    )
}

fn membership_from_row(row: &PgRow) -> Result<Membership, DomainError> {
    let id: Uuid = row.get("id");
    let user_id: String = row.get("user_id");
    let org_id: String = row.get("organization_id");
    let role: String = row.get("role");
    let deleted: bool = row.get("deleted");
    let created_at = row.get("created_at");
    let updated_at = row.get("updated_at");

    let user_id = UserId::new(user_id)
        .map_err(|e| DomainError::storage(format!("Corrupt user_id in storage: {}", e)))?;
    let org_id = OrgId::new(org_id)
        .map_err(|e| DomainError::storage(format!("Corrupt organization_id in storage: {}", e)))?;
    let role = OrgRole::parse(&role)
        .ok_or_else(|| DomainError::storage(format!("Unknown role '{}' in storage", role)))?;

    Ok(Membership::from_parts(
        MembershipId::from(id),
        user_id,
        org_id,
        role,
        deleted,
        created_at,
        updated_at,
    ))
}

/// PostgreSQL implementation of [`MembershipRepository`]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgMembershipRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgMembershipRepository").finish()
    }
}

impl PgMembershipRepository {
    /// Creates a repository on an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository with its own connection pool
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensures the memberships table and its indexes exist
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        let table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                user_id VARCHAR(50) NOT NULL,
                organization_id VARCHAR(50) NOT NULL,
                role VARCHAR(16) NOT NULL,
                deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            MEMBERSHIPS_TABLE
        );

        sqlx::query(&table)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        // Uniqueness backstop: one active row per (organisation, user) pair
        let unique_idx = format!(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS {table}_active_pair_idx
            ON {table} (organization_id, user_id)
            WHERE NOT deleted
            "#,
            table = MEMBERSHIPS_TABLE
        );

        sqlx::query(&unique_idx)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create index: {}", e)))?;

        let org_idx = format!(
            "CREATE INDEX IF NOT EXISTS {table}_org_idx ON {table} (organization_id)",
            table = MEMBERSHIPS_TABLE
        );

        sqlx::query(&org_idx)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    /// Runs a write transaction attempt, retrying transient failures
    async fn run_with_retries<F, Fut>(
        &self,
        op: &str,
        attempt_fn: F,
    ) -> Result<Membership, DomainError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Membership, TxError>> + Send,
    {
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(membership) => return Ok(membership),
                Err(TxError::Domain(e)) => return Err(e),
                Err(TxError::Db(e)) if is_transient(&e) && attempt < MAX_TX_RETRIES => {
                    attempt += 1;
                    warn!(op, attempt, error = %e, "Transient transaction failure, retrying");
                    tokio::time::sleep(TX_RETRY_BACKOFF * attempt).await;
                }
                Err(TxError::Db(e)) => {
                    return Err(DomainError::storage(format!("{} failed: {}", op, e)));
                }
            }
        }
    }

    /// Locks the organisation's active membership rows and returns them.
    ///
    /// `ORDER BY id` keeps the lock acquisition order deterministic across
    /// concurrent transactions on the same organisation.
    async fn lock_active_rows(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        org_id: &OrgId,
    ) -> Result<Vec<Membership>, TxError> {
        let query = format!(
            "SELECT * FROM {} WHERE organization_id = $1 AND NOT deleted ORDER BY id FOR UPDATE",
            MEMBERSHIPS_TABLE
        );

        let rows = sqlx::query(&query)
            .bind(org_id.as_str())
            .fetch_all(&mut **tx)
            .await?;

        let mut memberships = Vec::with_capacity(rows.len());
        for row in &rows {
            memberships.push(membership_from_row(row)?);
        }

        Ok(memberships)
    }

    async fn insert_tx(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<Membership, TxError> {
        let mut tx = self.pool.begin().await?;

        let check = format!(
            "SELECT id FROM {} WHERE organization_id = $1 AND user_id = $2 AND NOT deleted FOR UPDATE",
            MEMBERSHIPS_TABLE
        );

        let existing = sqlx::query(&check)
            .bind(org_id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(DomainError::conflict(format!(
                "User '{}' is already a member of organization '{}'",
                user_id, org_id
            ))
            .into());
        }

        let insert = format!(
            r#"
            INSERT INTO {} (id, user_id, organization_id, role, deleted)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&insert)
            .bind(MembershipId::new().as_uuid())
            .bind(user_id.as_str())
            .bind(org_id.as_str())
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    TxError::Domain(DomainError::conflict(format!(
                        "User '{}' is already a member of organization '{}'",
                        user_id, org_id
                    )))
                } else {
                    TxError::Db(e)
                }
            })?;

        let membership = membership_from_row(&row)?;
        tx.commit().await?;

        Ok(membership)
    }

    async fn restore_tx(&self, id: &MembershipId, role: OrgRole) -> Result<Membership, TxError> {
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", MEMBERSHIPS_TABLE);

        let row = sqlx::query(&select)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        let current = membership_from_row(&row)?;
        if current.is_active() {
            return Err(
                DomainError::conflict(format!("Membership '{}' is not soft-deleted", id)).into(),
            );
        }

        let update = format!(
            r#"
            UPDATE {}
            SET deleted = FALSE, role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&update)
            .bind(id.as_uuid())
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let membership = membership_from_row(&row)?;
        tx.commit().await?;

        Ok(membership)
    }

    async fn update_role_tx(
        &self,
        id: &MembershipId,
        role: OrgRole,
    ) -> Result<Membership, TxError> {
        let mut tx = self.pool.begin().await?;

        let target = self.peek_active(&mut tx, id).await?;
        let locked = Self::lock_active_rows(&mut tx, target.org_id()).await?;

        // The target may have been soft-deleted between the peek and the lock
        let current = locked
            .iter()
            .find(|m| m.id() == *id)
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        if current.role().is_owner() && !role.is_owner() {
            let owners = locked.iter().filter(|m| m.role().is_owner()).count();
            if owners <= 1 {
                return Err(DomainError::last_owner(format!(
                    "Organization '{}' would be left without an owner",
                    current.org_id()
                ))
                .into());
            }
        }

        let update = format!(
            "UPDATE {} SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&update)
            .bind(id.as_uuid())
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let membership = membership_from_row(&row)?;
        tx.commit().await?;

        Ok(membership)
    }

    async fn soft_delete_tx(&self, id: &MembershipId) -> Result<Membership, TxError> {
        let mut tx = self.pool.begin().await?;

        let target = self.peek_active(&mut tx, id).await?;
        let locked = Self::lock_active_rows(&mut tx, target.org_id()).await?;

        let current = locked
            .iter()
            .find(|m| m.id() == *id)
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        if current.role().is_owner() {
            let owners = locked.iter().filter(|m| m.role().is_owner()).count();
            if owners <= 1 {
                return Err(DomainError::last_owner(format!(
                    "Organization '{}' would be left without an owner",
                    current.org_id()
                ))
                .into());
            }
        }

        let update = format!(
            "UPDATE {} SET deleted = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&update)
            .bind(id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

        let membership = membership_from_row(&row)?;
        tx.commit().await?;

        Ok(membership)
    }

    /// Unlocked read of an active membership inside a transaction, used
    /// only to learn the target organisation before taking the org-wide
    /// locks.
    async fn peek_active(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: &MembershipId,
    ) -> Result<Membership, TxError> {
        let query = format!(
            "SELECT * FROM {} WHERE id = $1 AND NOT deleted",
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Membership '{}' not found", id)))?;

        Ok(membership_from_row(&row)?)
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn find_active(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<Membership>, DomainError> {
        let query = format!(
            "SELECT * FROM {} WHERE organization_id = $1 AND user_id = $2 AND NOT deleted",
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&query)
            .bind(org_id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find membership: {}", e)))?;

        row.as_ref().map(membership_from_row).transpose()
    }

    async fn find_active_by_id(
        &self,
        id: &MembershipId,
    ) -> Result<Option<Membership>, DomainError> {
        let query = format!(
            "SELECT * FROM {} WHERE id = $1 AND NOT deleted",
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find membership: {}", e)))?;

        row.as_ref().map(membership_from_row).transpose()
    }

    async fn find_pair(
        &self,
        user_id: &UserId,
        org_id: &OrgId,
    ) -> Result<Option<Membership>, DomainError> {
        // Prefer the active row, then the most recently updated deleted one
        let query = format!(
            r#"
            SELECT * FROM {}
            WHERE organization_id = $1 AND user_id = $2
            ORDER BY deleted ASC, updated_at DESC
            LIMIT 1
            "#,
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&query)
            .bind(org_id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find membership: {}", e)))?;

        row.as_ref().map(membership_from_row).transpose()
    }

    async fn list_active(&self, org_id: &OrgId) -> Result<Vec<Membership>, DomainError> {
        let query = format!(
            "SELECT * FROM {} WHERE organization_id = $1 AND NOT deleted ORDER BY created_at DESC",
            MEMBERSHIPS_TABLE
        );

        let rows = sqlx::query(&query)
            .bind(org_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list memberships: {}", e)))?;

        rows.iter().map(membership_from_row).collect()
    }

    async fn count_active_with_role(
        &self,
        org_id: &OrgId,
        role: OrgRole,
    ) -> Result<usize, DomainError> {
        let query = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE organization_id = $1 AND role = $2 AND NOT deleted",
            MEMBERSHIPS_TABLE
        );

        let row = sqlx::query(&query)
            .bind(org_id.as_str())
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count memberships: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count as usize)
    }

    async fn insert(
        &self,
        user_id: UserId,
        org_id: OrgId,
        role: OrgRole,
    ) -> Result<Membership, DomainError> {
        self.run_with_retries("insert", || self.insert_tx(&user_id, &org_id, role))
            .await
    }

    async fn restore(&self, id: &MembershipId, role: OrgRole) -> Result<Membership, DomainError> {
        self.run_with_retries("restore", || self.restore_tx(id, role))
            .await
    }

    async fn update_role(
        &self,
        id: &MembershipId,
        role: OrgRole,
    ) -> Result<Membership, DomainError> {
        self.run_with_retries("update_role", || self.update_role_tx(id, role))
            .await
    }

    async fn soft_delete(&self, id: &MembershipId) -> Result<Membership, DomainError> {
        self.run_with_retries("soft_delete", || self.soft_delete_tx(id))
            .await
    }
}
