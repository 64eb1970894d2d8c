use crate::gravatar::Gravatar;
use crate::state::*;

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Seconds to wait for a pooled connection before giving up.
    pub db_acquire_timeout: u64,
    pub gravatar_base_url: String,
    pub gravatar_size: Option<u16>,
    pub gravatar_default: Option<String>,
    pub gravatar_rating: Option<String>,
    pub gravatar_verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: String::new(),
            db_max_connections: 5,
            db_acquire_timeout: 30,
            gravatar_base_url: Gravatar::DEFAULT_BASE_URL.to_string(),
            gravatar_size: None,
            gravatar_default: None,
            gravatar_rating: None,
            gravatar_verify: false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no {0} environment variable present")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

fn parse_var<T: std::str::FromStr>(
    vars: &mut HashMap<String, String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match vars.remove(var) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

impl Config {
    pub fn parse_from_env() -> Self {
        // Load environment variables from a .env file. This is used for dev workflows.
        dotenv::dotenv().ok();

        let env_vars: HashMap<String, String> = env::vars().collect();

        // Without a usable config we can't do anything at all, and this only runs at startup.
        Self::from_vars(env_vars).unwrap_or_else(|e| panic!("invalid configuration: {}", e))
    }

    pub fn from_vars(mut vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let database_url = parse_var::<String>(&mut vars, "DATABASE_URL")?
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Config {
            database_url,
            db_max_connections: parse_var(&mut vars, "DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.db_max_connections),
            db_acquire_timeout: parse_var(&mut vars, "DB_ACQUIRE_TIMEOUT")?
                .unwrap_or(defaults.db_acquire_timeout),
            gravatar_base_url: parse_var(&mut vars, "GRAVATAR_BASE_URL")?
                .unwrap_or(defaults.gravatar_base_url),
            gravatar_size: parse_var(&mut vars, "GRAVATAR_SIZE")?,
            gravatar_default: parse_var(&mut vars, "GRAVATAR_DEFAULT")?,
            gravatar_rating: parse_var(&mut vars, "GRAVATAR_RATING")?,
            gravatar_verify: parse_var(&mut vars, "GRAVATAR_VERIFY")?
                .unwrap_or(defaults.gravatar_verify),
        })
    }

    pub fn gravatar(&self) -> Gravatar {
        Gravatar::new(&self.gravatar_base_url)
            .size(self.gravatar_size)
            .default_image(self.gravatar_default.clone())
            .rating(self.gravatar_rating.clone())
            .verify(self.gravatar_verify)
    }

    pub async fn connect(&self) -> Result<SqlPool, sqlx::Error> {
        PoolOptions::new()
            .max_connections(self.db_max_connections)
            .acquire_timeout(Duration::from_secs(self.db_acquire_timeout))
            .connect(&self.database_url)
            .await
    }

    pub async fn into_state(self) -> Result<AppStateRaw, sqlx::Error> {
        info!("config: {:?}", self.redacted());

        let db_conn = self.connect().await.inspect_err(|e| {
            error!("unable to connect to db: {}", e);
        })?;
        let gravatar = self.gravatar();

        Ok(Arc::new(State {
            config: self,
            db_conn,
            gravatar,
        }))
    }

    /// The config with the password stripped out of the database URL, for logging.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Ok(mut url) = url::Url::parse(&self.database_url) {
            if url.password().is_some() && url.set_password(Some("***")).is_ok() {
                config.database_url = url.to_string();
            }
        }
        config
    }

    // generate and show config string
    pub fn show() {
        let de: Self = Default::default();
        match serde_json::to_string_pretty(&de) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("failed to render default config: {}", e),
        }
    }
}

#[derive(clap::Parser, Debug)]
#[clap(version)]
pub struct Opts {
    // The number of occurrences of the `v/verbose` flag
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[clap(short, long, parse(from_occurrences), global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Print the user registered under an email.
    Show { email: String },
    /// Register a new user. The password is hashed before it is stored.
    Create {
        username: String,
        email: String,
        password: String,
    },
    /// Mark a user's email as confirmed.
    Confirm { email: String },
    /// Point a user's avatar at a new URL.
    Avatar { email: String, url: String },
    /// Drop the stored refresh token, forcing a fresh login.
    ClearToken { email: String },
    /// Print the default configuration.
    ShowConfig,
}

impl Opts {
    pub fn parse_from_args() -> (JoinHandle, Self) {
        use clap::Parser;
        let opt: Self = Opts::parse();

        let level = match opt.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _more => LevelFilter::Trace,
        };

        let handle = init_logger(level, opt.verbose > 1);

        info!("opt: {:?}", opt);

        (handle, opt)
    }
}

/// Starts the stdout logger. `sqlx` is held at warn unless `sqlx_debug` is set.
pub fn init_logger(level: LevelFilter, sqlx_debug: bool) -> JoinHandle {
    let formater = BaseFormater::new()
        .local(true)
        .color(true)
        .level(4)
        .formater(format);
    let filter = BaseFilter::new()
        .starts_with(true)
        .notfound(true)
        .max_level(level)
        .chain(
            "sqlx",
            if sqlx_debug {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            },
        );

    // Logging is set up before anything else runs, so there is nothing to fall back to.
    NonblockLogger::new()
        .filter(filter)
        .expect("failed to build log filter")
        .formater(formater)
        .log_to_stdout()
        .map_err(|e| eprintln!("failed to init nonblock_logger: {:?}", e))
        .expect("failed to init logger")
}

use nonblock_logger::{
    log::{LevelFilter, Record},
    BaseFilter, BaseFormater, FixedLevel, JoinHandle, NonblockLogger,
};

pub fn format(base: &BaseFormater, record: &Record) -> String {
    let level = FixedLevel::with_color(record.level(), base.color_get())
        .length(base.level_get())
        .into_colored()
        .into_coloredfg();

    format!(
        "[{} {}#{}:{} {}] {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        level,
        record.module_path().unwrap_or("*"),
        record.line().unwrap_or(0),
        nonblock_logger::current_thread_name(),
        record.args()
    )
}
