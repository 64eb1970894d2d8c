use super::{NewUser, User};
use crate::gravatar::AvatarLookup;
use crate::state::{AppStateRaw, State};

use sqlx::{types::Uuid, Error};

macro_rules! user_columns {
    () => {
        "id, username, email, password, avatar, refresh_token, confirmed"
    };
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,
    #[error("email already exists")]
    AlreadyExists,
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

/// Unique violations: Postgres SQLSTATE, then SQLite's extended codes for UNIQUE and PRIMARY KEY.
const UNIQUE_VIOLATION_CODES: [&str; 3] = ["23505", "2067", "1555"];

impl From<sqlx::Error> for UserError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            Error::Database(ref err) => match err.code() {
                Some(code) if UNIQUE_VIOLATION_CODES.iter().any(|c| *c == code) => {
                    Self::AlreadyExists
                }
                _ => Self::Sqlx(e),
            },
            _ => Self::Sqlx(e),
        }
    }
}

/// User data access. Every call runs against the pool held in the state and commits on its own.
#[async_trait]
pub trait IUser: std::ops::Deref<Target = State> {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.db_conn)
        .await
        .inspect_err(|e| error!("error fetching user by email: {:?}", e))?;

        Ok(user)
    }

    /// Inserts a user. The avatar is looked up first; if none is available the user is stored
    /// without one.
    async fn create_user(&self, body: &NewUser) -> Result<User, UserError> {
        let avatar = match self.gravatar.lookup(&body.email).await {
            AvatarLookup::Fetched(url) => Some(url),
            AvatarLookup::Unavailable(reason) => {
                log::warn!("creating user without avatar: {}", reason);
                None
            }
        };

        let user = sqlx::query_as::<_, User>(concat!(
            "INSERT INTO users (id, username, email, password, avatar) ",
            "VALUES ($1, $2, $3, $4, $5) RETURNING ",
            user_columns!()
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(body.username.as_str())
        .bind(body.email.as_str())
        .bind(body.password.as_str())
        .bind(avatar)
        .fetch_one(&self.db_conn)
        .await
        .inspect_err(|e| error!("error inserting user: {:?}", e))?;

        log::debug!("inserted user {}", user.id);
        Ok(user)
    }

    async fn confirm_email(&self, email: &str) -> Result<(), UserError> {
        let res = sqlx::query("UPDATE users SET confirmed = $1 WHERE email = $2")
            .bind(true)
            .bind(email)
            .execute(&self.db_conn)
            .await
            .inspect_err(|e| error!("error confirming email: {:?}", e))?;

        if res.rows_affected() == 0 {
            Err(UserError::NotFound)
        } else {
            Ok(())
        }
    }

    /// Stores `token` as the user's refresh token; `None` clears it.
    async fn update_token(&self, user: &mut User, token: Option<&str>) -> Result<(), UserError> {
        sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(token.map(str::to_string))
            .bind(user.id.as_str())
            .execute(&self.db_conn)
            .await
            .inspect_err(|e| error!("error updating refresh token: {:?}", e))?;

        user.refresh_token = token.map(str::to_string);
        Ok(())
    }

    /// Returns the updated user, or `None` if nobody is registered under `email`.
    async fn update_avatar(&self, email: &str, url: &str) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as::<_, User>(concat!(
            "UPDATE users SET avatar = $1 WHERE email = $2 RETURNING ",
            user_columns!()
        ))
        .bind(url)
        .bind(email)
        .fetch_optional(&self.db_conn)
        .await
        .inspect_err(|e| error!("error updating avatar: {:?}", e))?;

        Ok(user)
    }
}

impl IUser for AppStateRaw {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gravatar::{hash_email, Gravatar};
    use crate::test_support::{memory_state, unreachable_gravatar};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "janedoe".to_string(),
            email: email.to_string(),
            password: "$2b$04$hash".to_string(),
        }
    }

    #[actix_rt::test]
    async fn finds_created_user_by_email() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;

        let created = state.create_user(&new_user("jane@example.com")).await.unwrap();
        let found = state
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found, created);
        assert_eq!(found.email, "jane@example.com");
        assert_eq!(found.confirmed, None);
        assert_eq!(found.refresh_token, None);
        assert_eq!(
            found.avatar,
            Some(format!(
                "https://www.gravatar.com/avatar/{}",
                hash_email("jane@example.com")
            ))
        );
    }

    #[actix_rt::test]
    async fn lookup_is_exact_match() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;
        state.create_user(&new_user("jane@example.com")).await.unwrap();

        assert_eq!(state.get_user_by_email("jane@example").await.unwrap(), None);
        assert_eq!(state.get_user_by_email("nobody@example.com").await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn avatar_failure_still_creates_user() {
        let state = memory_state(unreachable_gravatar()).await;

        let created = state.create_user(&new_user("jane@example.com")).await.unwrap();
        assert_eq!(created.avatar, None);

        let found = state
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.avatar, None);
    }

    #[actix_rt::test]
    async fn duplicate_email_is_rejected() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;
        state.create_user(&new_user("jane@example.com")).await.unwrap();

        let err = state
            .create_user(&new_user("jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists), "got {:?}", err);
    }

    #[actix_rt::test]
    async fn confirm_sets_flag_only() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;
        let created = state.create_user(&new_user("jane@example.com")).await.unwrap();

        state.confirm_email("jane@example.com").await.unwrap();

        let found = state
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.confirmed, Some(true));
        assert!(found.is_confirmed());
        assert_eq!(
            User {
                confirmed: None,
                ..found
            },
            created
        );
    }

    #[actix_rt::test]
    async fn confirm_unknown_email_is_not_found() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;

        let err = state.confirm_email("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, UserError::NotFound), "got {:?}", err);
    }

    #[actix_rt::test]
    async fn update_token_sets_and_clears() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;
        let mut user = state.create_user(&new_user("jane@example.com")).await.unwrap();

        state.update_token(&mut user, Some("refresh-1")).await.unwrap();
        assert_eq!(user.refresh_token.as_deref(), Some("refresh-1"));
        let stored = state
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));

        state.update_token(&mut user, None).await.unwrap();
        assert_eq!(user.refresh_token, None);
        let stored = state
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.refresh_token, None);
    }

    #[actix_rt::test]
    async fn update_avatar_returns_updated_user() {
        let state = memory_state(unreachable_gravatar()).await;
        state.create_user(&new_user("jane@example.com")).await.unwrap();

        let updated = state
            .update_avatar("jane@example.com", "https://cdn.example.com/jane.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            updated.avatar.as_deref(),
            Some("https://cdn.example.com/jane.png")
        );

        let stored = state
            .get_user_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, updated);
    }

    #[actix_rt::test]
    async fn update_avatar_unknown_email_is_none() {
        let state = memory_state(Gravatar::new(Gravatar::DEFAULT_BASE_URL)).await;

        let res = state
            .update_avatar("ghost@example.com", "https://cdn.example.com/ghost.png")
            .await
            .unwrap();
        assert_eq!(res, None);
    }
}
