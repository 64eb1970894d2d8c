pub type SqlPool = sqlx::AnyPool;
pub type PoolOptions = sqlx::any::AnyPoolOptions;

use crate::config::Config;
use crate::gravatar::Gravatar;

#[derive(Clone)]
pub struct State {
    pub config: Config,
    pub db_conn: SqlPool,
    pub gravatar: Gravatar,
}

pub type AppStateRaw = std::sync::Arc<State>;
