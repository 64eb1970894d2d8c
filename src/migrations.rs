//! Versioned schema changes for the `users` table.
//!
//! Each migration under `migrations/` is reversible, so the chain can be walked forwards with
//! [`run`] and backwards with [`revert_to`].

use crate::state::SqlPool;

use sqlx::migrate::{Migrate, MigrateError, MigrationType, Migrator};

pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Applies every pending migration, oldest first.
pub async fn run(pool: &SqlPool) -> Result<(), MigrateError> {
    MIGRATOR
        .run(pool)
        .await
        .inspect_err(|e| error!("error: migrating database: {}", e))?;

    log::debug!("database schema at version {:?}", latest_version());
    Ok(())
}

/// Undoes applied migrations newer than `target`, newest first. `0` reverts everything.
pub async fn revert_to(pool: &SqlPool, target: i64) -> Result<(), MigrateError> {
    MIGRATOR
        .undo(pool, target)
        .await
        .inspect_err(|e| error!("error: reverting database to {}: {}", target, e))
}

/// Versions already applied to the database, in ascending order.
pub async fn applied(pool: &SqlPool) -> Result<Vec<i64>, MigrateError> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;

    let mut versions: Vec<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();

    Ok(versions)
}

/// Versions known to this build, in ascending order.
pub fn known_versions() -> Vec<i64> {
    MIGRATOR
        .iter()
        .filter(|m| {
            matches!(
                m.migration_type,
                MigrationType::Simple | MigrationType::ReversibleUp
            )
        })
        .map(|m| m.version)
        .collect()
}

pub fn latest_version() -> Option<i64> {
    known_versions().into_iter().max()
}
