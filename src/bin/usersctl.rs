#[macro_use]
extern crate lazy_static;

use anyhow::{anyhow, Context};
use users_repo::config::{Command, Config, Opts};
use users_repo::models::user::{user_dao::IUser, NewUser, User};
use users_repo::state::AppStateRaw;
use validator::Validate;

lazy_static! {
    pub static ref CONFIG: Config = Config::parse_from_env();
}

async fn connect() -> anyhow::Result<AppStateRaw> {
    let state = CONFIG.clone().into_state().await?;
    Ok(state)
}

fn print_user(user: &User) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    let (_handle, opt) = Opts::parse_from_args();

    match opt.command {
        Command::Show { email } => {
            let state = connect().await?;
            let user = state
                .get_user_by_email(&email)
                .await?
                .ok_or_else(|| anyhow!("no user registered under {}", email))?;
            print_user(&user)?;
        }
        Command::Create {
            username,
            email,
            password,
        } => {
            let new_user =
                NewUser::with_plain_password(&username, &email, &password, bcrypt::DEFAULT_COST)
                    .context("hashing password")?;
            new_user.validate()?;

            let state = connect().await?;
            let user = state.create_user(&new_user).await?;
            print_user(&user)?;
        }
        Command::Confirm { email } => {
            let state = connect().await?;
            state.confirm_email(&email).await?;
            log::info!("confirmed {}", email);
        }
        Command::Avatar { email, url } => {
            let state = connect().await?;
            let user = state
                .update_avatar(&email, &url)
                .await?
                .ok_or_else(|| anyhow!("no user registered under {}", email))?;
            print_user(&user)?;
        }
        Command::ClearToken { email } => {
            let state = connect().await?;
            let mut user = state
                .get_user_by_email(&email)
                .await?
                .ok_or_else(|| anyhow!("no user registered under {}", email))?;
            state.update_token(&mut user, None).await?;
            log::info!("cleared refresh token for {}", email);
        }
        Command::ShowConfig => Config::show(),
    }

    Ok(())
}
