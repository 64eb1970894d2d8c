use crate::config::Config;
use crate::gravatar::Gravatar;
use crate::migrations;
use crate::state::{AppStateRaw, PoolOptions, SqlPool, State};

use std::sync::Arc;

const MEMORY_DB: &str = "sqlite::memory:";

/// A fresh in-memory database. One connection only, since every connection would otherwise
/// see its own empty database.
pub async fn memory_pool() -> SqlPool {
    PoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(MEMORY_DB)
        .await
        .expect("open in-memory database")
}

/// State over a migrated in-memory database.
pub async fn memory_state(gravatar: Gravatar) -> AppStateRaw {
    let db_conn = memory_pool().await;
    migrations::run(&db_conn).await.expect("migrate in-memory database");

    Arc::new(State {
        config: Config {
            database_url: MEMORY_DB.to_string(),
            db_max_connections: 1,
            ..Config::default()
        },
        db_conn,
        gravatar,
    })
}

/// A verifying client pointed at a closed port, so every lookup fails.
pub fn unreachable_gravatar() -> Gravatar {
    Gravatar::new("http://127.0.0.1:1/avatar").verify(true)
}
