//! Avatar lookup against the Gravatar service.
//!
//! Avatars are best effort: a lookup never fails, it reports either the URL it settled on or the
//! reason none is available, and the caller decides whether that is worth logging.

use ring::digest;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum AvatarUnavailable {
    #[error("email is empty")]
    InvalidEmail,
    #[error("invalid avatar base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("no avatar registered for this email")]
    NotFound,
    #[error("avatar service answered with status {0}")]
    Status(u16),
    #[error("avatar service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outcome of an avatar lookup.
#[derive(Debug)]
pub enum AvatarLookup {
    Fetched(String),
    Unavailable(AvatarUnavailable),
}

impl AvatarLookup {
    pub fn url(self) -> Option<String> {
        match self {
            AvatarLookup::Fetched(url) => Some(url),
            AvatarLookup::Unavailable(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Gravatar {
    base_url: String,
    size: Option<u16>,
    default_image: Option<String>,
    rating: Option<String>,
    /// When set, the service is asked whether an avatar actually exists before the URL is used.
    verify: bool,
    client: reqwest::Client,
}

/// Gravatar identifies accounts by the SHA-256 of the normalised address.
pub fn hash_email(email: &str) -> String {
    let normalised = email.trim().to_lowercase();
    hex::encode(digest::digest(&digest::SHA256, normalised.as_bytes()))
}

impl Gravatar {
    pub const DEFAULT_BASE_URL: &'static str = "https://www.gravatar.com/avatar";

    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to default http client: {}", e);
                reqwest::Client::new()
            });

        Gravatar {
            base_url: base_url.trim_end_matches('/').to_string(),
            size: None,
            default_image: None,
            rating: None,
            verify: false,
            client,
        }
    }

    pub fn size(mut self, size: Option<u16>) -> Self {
        self.size = size;
        self
    }

    pub fn default_image(mut self, default_image: Option<String>) -> Self {
        self.default_image = default_image;
        self
    }

    pub fn rating(mut self, rating: Option<String>) -> Self {
        self.rating = rating;
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Builds the avatar URL for `email` without contacting the service.
    pub fn url(&self, email: &str) -> Result<Url, AvatarUnavailable> {
        if email.trim().is_empty() {
            return Err(AvatarUnavailable::InvalidEmail);
        }

        let mut url = Url::parse(&format!("{}/{}", self.base_url, hash_email(email)))?;

        let mut params = Vec::new();
        if let Some(size) = self.size {
            params.push(("s", size.to_string()));
        }
        if let Some(default_image) = &self.default_image {
            params.push(("d", default_image.clone()));
        }
        if let Some(rating) = &self.rating {
            params.push(("r", rating.clone()));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url)
    }

    pub async fn lookup(&self, email: &str) -> AvatarLookup {
        let url = match self.url(email) {
            Ok(url) => url,
            Err(e) => return AvatarLookup::Unavailable(e),
        };

        if !self.verify {
            return AvatarLookup::Fetched(url.to_string());
        }

        match self.probe(&url).await {
            Ok(()) => AvatarLookup::Fetched(url.to_string()),
            Err(e) => AvatarLookup::Unavailable(e),
        }
    }

    async fn probe(&self, url: &Url) -> Result<(), AvatarUnavailable> {
        // `d=404` makes the service answer 404 instead of serving a placeholder image.
        let mut probe = url.clone();
        let params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "d")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        probe
            .query_pairs_mut()
            .clear()
            .extend_pairs(params)
            .append_pair("d", "404");

        let res = self.client.get(probe).send().await?;
        let status = res.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            Err(AvatarUnavailable::NotFound)
        } else if status.is_success() {
            Ok(())
        } else {
            Err(AvatarUnavailable::Status(status.as_u16()))
        }
    }
}
