use clap::Parser;
use nonblock_logger::log::LevelFilter;
use users_repo::config::{init_logger, Config};
use users_repo::migrations;

#[derive(Parser, Debug)]
#[clap(version, about = "Apply or revert the users schema migrations")]
struct MigrateOpts {
    /// Undo every applied migration newer than this version instead of migrating forward.
    #[clap(long, value_name = "VERSION", conflicts_with = "status")]
    revert_to: Option<i64>,

    /// List applied and known migration versions, then exit.
    #[clap(long)]
    status: bool,
}

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    let opts = MigrateOpts::parse();
    let _handle = init_logger(LevelFilter::Info, false);

    let config = Config::parse_from_env();
    let pool = config.connect().await.map_err(|e| {
        log::error!("unable to connect to db: {}", e);
        anyhow::anyhow!("unable to connect to db: {}", e)
    })?;

    if opts.status {
        let applied = migrations::applied(&pool).await?;
        for version in migrations::known_versions() {
            let state = if applied.contains(&version) {
                "applied"
            } else {
                "pending"
            };
            println!("{} {}", version, state);
        }
        return Ok(());
    }

    match opts.revert_to {
        Some(target) => {
            migrations::revert_to(&pool, target).await?;
            log::info!("successfully reverted database to version {}", target);
        }
        None => {
            migrations::run(&pool).await?;
            log::info!("successfully migrated database");
        }
    }

    Ok(())
}
