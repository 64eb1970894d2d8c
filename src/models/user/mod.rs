pub mod user_dao;

use sqlx::FromRow;
use validator::Validate;

#[derive(FromRow, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// `None` until the address has been confirmed once.
    pub confirmed: Option<bool>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.unwrap_or(false)
    }
}

/// The fields needed to register a user. `password` holds the hash, never the plaintext.
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct NewUser {
    #[validate(length(min = 5, max = 16))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 1))]
    pub password: String,
}

impl NewUser {
    pub fn with_plain_password(
        username: &str,
        email: &str,
        password: &str,
        cost: u32,
    ) -> Result<Self, bcrypt::BcryptError> {
        Ok(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: bcrypt::hash(password, cost)?,
        })
    }
}
