//! Per-table schema migration framework.
//!
//! `lms_internal(tab TEXT UNIQUE, version INT)` tracks a schema version per
//! table, plus one reserved row (`tab = 'update_id'`) holding the global
//! scan-generation counter. A [`TableMigration`] is an ordered array of SQL
//! steps; `run_migrations` runs, for each table, every step whose index is
//! `>=` the table's currently recorded version, writing the new version back
//! after each step. Downgrades (a recorded version past the end of the
//! step array) are refused — logged and silently skipped, never rolled back.

use crate::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// One table's ordered migration steps. `steps[i]` is the SQL executed to
/// move the table from version `i` to version `i + 1`.
pub struct TableMigration {
    pub table: &'static str,
    pub steps: &'static [&'static str],
}

/// Ensure the `lms_internal` bookkeeping table exists.
pub async fn ensure_lms_internal(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lms_internal (
            tab TEXT UNIQUE NOT NULL,
            version INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn get_table_version(pool: &SqlitePool, table: &str) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM lms_internal WHERE tab = ?")
        .bind(table)
        .fetch_optional(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

async fn set_table_version(pool: &SqlitePool, table: &str, version: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lms_internal (tab, version) VALUES (?, ?)
        ON CONFLICT(tab) DO UPDATE SET version = excluded.version
        "#,
    )
    .bind(table)
    .bind(version)
    .execute(pool)
    .await?;
    Ok(())
}

/// Run every registered table's pending migration steps, then make sure the
/// `update_id` counter row exists (starting at 0 for a fresh database).
pub async fn run_migrations(pool: &SqlitePool, migrations: &[TableMigration]) -> Result<()> {
    ensure_lms_internal(pool).await?;

    for migration in migrations {
        let current = get_table_version(pool, migration.table).await?;
        let target = migration.steps.len() as i64;

        if current > target {
            warn!(
                table = migration.table,
                current, target, "schema version is newer than code; refusing to downgrade"
            );
            continue;
        }

        for (idx, step) in migration.steps.iter().enumerate().skip(current as usize) {
            sqlx::query(step).execute(pool).await?;
            set_table_version(pool, migration.table, idx as i64 + 1).await?;
        }
    }

    let has_update_id = get_table_version(pool, "update_id").await?;
    if has_update_id == 0 {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM lms_internal WHERE tab = 'update_id')")
                .fetch_one(pool)
                .await?;
        if !exists {
            set_table_version(pool, "update_id", 0).await?;
        }
    }

    Ok(())
}

/// Read the current global scan-generation counter.
pub async fn get_update_id(pool: &SqlitePool) -> Result<i64> {
    get_table_version(pool, "update_id").await
}

/// Persist a new scan-generation counter value. Called on every commit
/// boundary by the worker.
pub async fn set_update_id(pool: &SqlitePool, value: i64) -> Result<()> {
    set_table_version(pool, "update_id", value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn runs_steps_in_order_and_records_version() {
        let pool = memory_pool().await;
        let migrations = [TableMigration {
            table: "widgets",
            steps: &[
                "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)",
                "ALTER TABLE widgets ADD COLUMN color TEXT",
            ],
        }];
        run_migrations(&pool, &migrations).await.unwrap();

        let version = get_table_version(&pool, "widgets").await.unwrap();
        assert_eq!(version, 2);

        // idempotent: running again performs no further steps
        run_migrations(&pool, &migrations).await.unwrap();
        let version_again = get_table_version(&pool, "widgets").await.unwrap();
        assert_eq!(version_again, 2);
    }

    #[tokio::test]
    async fn update_id_row_initializes_once() {
        let pool = memory_pool().await;
        run_migrations(&pool, &[]).await.unwrap();
        assert_eq!(get_update_id(&pool).await.unwrap(), 0);

        set_update_id(&pool, 7).await.unwrap();
        run_migrations(&pool, &[]).await.unwrap();
        assert_eq!(get_update_id(&pool).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn downgrade_is_refused_not_rolled_back() {
        let pool = memory_pool().await;
        ensure_lms_internal(&pool).await.unwrap();
        set_table_version(&pool, "widgets", 5).await.unwrap();

        let migrations = [TableMigration {
            table: "widgets",
            steps: &["CREATE TABLE widgets (id INTEGER PRIMARY KEY)"],
        }];
        run_migrations(&pool, &migrations).await.unwrap();

        // version is untouched, and the step never ran
        assert_eq!(get_table_version(&pool, "widgets").await.unwrap(), 5);
        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='widgets')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(!table_exists);
    }
}
