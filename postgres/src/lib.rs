//! `PostgreSQL` [`ShelterStore`] for the relief engine.
//!
//! Centers and guests are JSONB documents with a `version` column. Every
//! write in a [`Transaction`] becomes one version-guarded statement inside a
//! single SQL transaction:
//!
//! - insert: `INSERT ... ON CONFLICT (id) DO NOTHING`
//! - update: `UPDATE ... SET version = version + 1 WHERE id = $1 AND version = $expected`
//! - delete: `DELETE ... WHERE id = $1 AND version = $expected`
//!
//! A statement that touches no row means another writer got there first: the
//! SQL transaction is rolled back and the commit fails with
//! [`StoreError::Conflict`]. Row locks taken by the guarded statements
//! linearize writers of the same center, and deadlocks or serialization
//! failures between transactions are reported as conflicts too, so callers
//! simply retry.
//!
//! # Example
//!
//! ```ignore
//! use relief_postgres::PostgresShelterStore;
//!
//! let store = PostgresShelterStore::connect("postgres://localhost/relief", 10).await?;
//! store.migrate().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use relief_core::center::{Center, CenterId};
use relief_core::guest::{Guest, GuestId};
use relief_core::store::{
    ActivityRecord, Expectation, GuestQuery, ShelterStore, StoreError, StoreFuture, Transaction,
    Versioned, Write,
};
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// `SQLSTATE` for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";
/// `SQLSTATE` for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";

type PgTx<'c> = sqlx::Transaction<'c, Postgres>;

fn unavailable(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if matches!(db.code().as_deref(), Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)) {
            metrics::counter!("relief_postgres_lock_conflicts_total").increment(1);
            return StoreError::Conflict {
                key: "transaction".to_string(),
                expected: None,
                actual: None,
            };
        }
    }
    StoreError::Unavailable(err.to_string())
}

fn version_column(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Serialization(format!("version {version} out of range")))
}

fn version_value(column: i64) -> Result<u64, StoreError> {
    u64::try_from(column).map_err(|_| StoreError::Serialization(format!("negative version {column}")))
}

/// `%needle%` with `LIKE` wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `PostgreSQL`-backed shelter store.
#[derive(Clone, Debug)]
pub struct PostgresShelterStore {
    pool: PgPool,
}

impl PostgresShelterStore {
    /// Connect with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(unavailable)?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        tracing::info!("shelter store schema is up to date");
        Ok(())
    }

    // ========================================================================
    // Guarded writes
    // ========================================================================

    async fn guard(
        tx: &mut PgTx<'_>,
        result: PgQueryResult,
        key: String,
        expected: Expectation,
        lookup: &'static str,
        id: GuardKey,
    ) -> Result<(), StoreError> {
        if result.rows_affected() == 1 {
            return Ok(());
        }
        let found: Option<i64> = match id {
            GuardKey::Center(id) => {
                sqlx::query_scalar(lookup)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
            }
            GuardKey::Guest(id) => {
                sqlx::query_scalar(lookup)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
            }
        }
        .map_err(unavailable)?;
        let actual = found.map(version_value).transpose()?;
        tracing::debug!(%key, ?expected, ?actual, "guarded write matched no row");
        Err(StoreError::Conflict {
            key,
            expected: expected.version(),
            actual,
        })
    }

    async fn put_center(
        tx: &mut PgTx<'_>,
        center: &Center,
        expected: Expectation,
    ) -> Result<(), StoreError> {
        let id = *center.id.as_uuid();
        let result = match expected {
            Expectation::Absent => sqlx::query(
                "INSERT INTO centers (id, name, version, doc, updated_at)
                 VALUES ($1, $2, 1, $3, $4)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(id)
            .bind(&center.name)
            .bind(Json(center))
            .bind(center.last_updated)
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?,
            Expectation::Version(version) => sqlx::query(
                "UPDATE centers
                 SET name = $2, doc = $3, updated_at = $4, version = version + 1
                 WHERE id = $1 AND version = $5",
            )
            .bind(id)
            .bind(&center.name)
            .bind(Json(center))
            .bind(center.last_updated)
            .bind(version_column(version)?)
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?,
        };
        Self::guard(
            tx,
            result,
            format!("center/{}", center.id),
            expected,
            "SELECT version FROM centers WHERE id = $1",
            GuardKey::Center(id),
        )
        .await
    }

    async fn delete_center(tx: &mut PgTx<'_>, id: CenterId, expected: u64) -> Result<(), StoreError> {
        let uuid = *id.as_uuid();
        let result = sqlx::query("DELETE FROM centers WHERE id = $1 AND version = $2")
            .bind(uuid)
            .bind(version_column(expected)?)
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?;
        Self::guard(
            tx,
            result,
            format!("center/{id}"),
            Expectation::Version(expected),
            "SELECT version FROM centers WHERE id = $1",
            GuardKey::Center(uuid),
        )
        .await
    }

    async fn put_guest(
        tx: &mut PgTx<'_>,
        guest: &Guest,
        expected: Expectation,
    ) -> Result<(), StoreError> {
        let result = match expected {
            Expectation::Absent => sqlx::query(
                "INSERT INTO guests (id, center_id, status, created_at, version, doc)
                 VALUES ($1, $2, $3, $4, 1, $5)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(guest.id.as_str())
            .bind(*guest.center_id.as_uuid())
            .bind(guest.status.as_str())
            .bind(guest.created_at)
            .bind(Json(guest))
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?,
            Expectation::Version(version) => sqlx::query(
                "UPDATE guests
                 SET center_id = $2, status = $3, doc = $4, version = version + 1
                 WHERE id = $1 AND version = $5",
            )
            .bind(guest.id.as_str())
            .bind(*guest.center_id.as_uuid())
            .bind(guest.status.as_str())
            .bind(Json(guest))
            .bind(version_column(version)?)
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?,
        };
        Self::guard(
            tx,
            result,
            format!("guest/{}", guest.id),
            expected,
            "SELECT version FROM guests WHERE id = $1",
            GuardKey::Guest(guest.id.as_str().to_string()),
        )
        .await
    }

    async fn delete_guest(tx: &mut PgTx<'_>, id: &GuestId, expected: u64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM guests WHERE id = $1 AND version = $2")
            .bind(id.as_str())
            .bind(version_column(expected)?)
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?;
        Self::guard(
            tx,
            result,
            format!("guest/{id}"),
            Expectation::Version(expected),
            "SELECT version FROM guests WHERE id = $1",
            GuardKey::Guest(id.as_str().to_string()),
        )
        .await
    }

    async fn append_activity(tx: &mut PgTx<'_>, record: &ActivityRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO guest_activity (id, occurred_at, doc) VALUES ($1, $2, $3)")
            .bind(record.id)
            .bind(record.occurred_at)
            .bind(Json(record))
            .execute(&mut **tx)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn apply(&self, tx: Transaction) -> Result<(), StoreError> {
        if tx.is_empty() {
            return Ok(());
        }
        let mut sql_tx = self.pool.begin().await.map_err(unavailable)?;
        for write in tx.into_writes() {
            match write {
                Write::PutCenter { center, expected } => {
                    Self::put_center(&mut sql_tx, &center, expected).await?;
                }
                Write::DeleteCenter { id, expected } => {
                    Self::delete_center(&mut sql_tx, id, expected).await?;
                }
                Write::PutGuest { guest, expected } => {
                    Self::put_guest(&mut sql_tx, &guest, expected).await?;
                }
                Write::DeleteGuest { id, expected } => {
                    Self::delete_guest(&mut sql_tx, &id, expected).await?;
                }
                Write::AppendActivity(record) => {
                    Self::append_activity(&mut sql_tx, &record).await?;
                }
            }
        }
        sql_tx.commit().await.map_err(unavailable)
    }
}

enum GuardKey {
    Center(Uuid),
    Guest(String),
}

type DocRow<T> = (i64, Json<T>);

fn versioned<T>((version, Json(value)): DocRow<T>) -> Result<Versioned<T>, StoreError> {
    Ok(Versioned::new(value, version_value(version)?))
}

impl ShelterStore for PostgresShelterStore {
    fn load_center(&self, id: CenterId) -> StoreFuture<'_, Option<Versioned<Center>>> {
        Box::pin(async move {
            let row: Option<DocRow<Center>> =
                sqlx::query_as("SELECT version, doc FROM centers WHERE id = $1")
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(unavailable)?;
            row.map(versioned).transpose()
        })
    }

    fn list_centers(&self) -> StoreFuture<'_, Vec<Versioned<Center>>> {
        Box::pin(async move {
            let rows: Vec<DocRow<Center>> =
                sqlx::query_as("SELECT version, doc FROM centers ORDER BY name, id")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(unavailable)?;
            rows.into_iter().map(versioned).collect()
        })
    }

    fn load_guest(&self, id: GuestId) -> StoreFuture<'_, Option<Versioned<Guest>>> {
        Box::pin(async move {
            let row: Option<DocRow<Guest>> =
                sqlx::query_as("SELECT version, doc FROM guests WHERE id = $1")
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(unavailable)?;
            row.map(versioned).transpose()
        })
    }

    fn find_guests(&self, query: GuestQuery) -> StoreFuture<'_, Vec<Guest>> {
        Box::pin(async move {
            let pattern = query.text.as_deref().map(|t| contains_pattern(&t.to_lowercase()));
            let rows: Vec<(Json<Guest>,)> = sqlx::query_as(
                r"
                SELECT doc FROM guests
                WHERE ($1::uuid IS NULL OR center_id = $1)
                  AND ($2::text IS NULL OR status = $2)
                  AND ($3::text IS NULL
                       OR doc->>'first_name' ILIKE $3 ESCAPE '\'
                       OR doc->>'last_name' ILIKE $3 ESCAPE '\'
                       OR ((doc->>'first_name') || ' ' || (doc->>'last_name')) ILIKE $3 ESCAPE '\'
                       OR coalesce(doc->>'phone', '') ILIKE $3 ESCAPE '\'
                       OR coalesce(doc->>'email', '') ILIKE $3 ESCAPE '\'
                       OR id ILIKE $3 ESCAPE '\')
                ORDER BY created_at, id
                ",
            )
            .bind(query.center_id.map(|c| *c.as_uuid()))
            .bind(query.status.map(|s| s.as_str()))
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
            Ok(rows.into_iter().map(|(Json(guest),)| guest).collect())
        })
    }

    fn activity_since(&self, since: DateTime<Utc>) -> StoreFuture<'_, Vec<ActivityRecord>> {
        Box::pin(async move {
            let rows: Vec<(Json<ActivityRecord>,)> = sqlx::query_as(
                "SELECT doc FROM guest_activity WHERE occurred_at >= $1 ORDER BY occurred_at, id",
            )
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
            Ok(rows.into_iter().map(|(Json(record),)| record).collect())
        })
    }

    fn commit(&self, tx: Transaction) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = self.apply(tx).await;
            if let Err(StoreError::Conflict { key, .. }) = &result {
                tracing::debug!(%key, "commit rejected on version mismatch");
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("nair"), "%nair%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_version_columns() {
        assert_eq!(version_column(3).ok(), Some(3));
        assert!(version_column(u64::MAX).is_err());
        assert!(version_value(-1).is_err());
    }
}
