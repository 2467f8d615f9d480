use reqwest::Url;
use rspotify::Credentials;
use std::env;
use std::time::Duration;
use thiserror::Error;

const DISCORD_API_TOKEN: &str = "DISCORD_API_TOKEN";
const SPOTIFY_API_CLIENT_ID: &str = "SPOTIFY_API_CLIENT_ID";
const SPOTIFY_API_CLIENT_SECRET: &str = "SPOTIFY_API_CLIENT_SECRET";
const INVIDIOUS_INSTANCE_URL: &str = "INVIDIOUS_INSTANCE_URL";
const HTTP_TIMEOUT_SECONDS: &str = "HTTP_TIMEOUT_SECONDS";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("the {0} environment variable is not set")]
    Missing(&'static str),
    #[error("the {name} environment variable is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub(crate) struct Config {
    pub(crate) discord_api_token: String,
    pub(crate) spotify_api_credentials: Credentials,
    /// Pins the video catalog instance, discovery is skipped when set.
    pub(crate) invidious_instance_url: Option<Url>,
    pub(crate) http_timeout: Duration,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(Error::Missing(name))
        };
        let optional = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let invidious_instance_url = optional(INVIDIOUS_INSTANCE_URL)
            .map(|url| {
                Url::parse(&url).map_err(|error| Error::Invalid {
                    name: INVIDIOUS_INSTANCE_URL,
                    reason: error.to_string(),
                })
            })
            .transpose()?;

        let http_timeout = optional(HTTP_TIMEOUT_SECONDS)
            .map(|seconds| {
                seconds
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|error| Error::Invalid {
                        name: HTTP_TIMEOUT_SECONDS,
                        reason: error.to_string(),
                    })
            })
            .transpose()?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        Ok(Self {
            discord_api_token: required(DISCORD_API_TOKEN)?,
            spotify_api_credentials: Credentials::new(
                &required(SPOTIFY_API_CLIENT_ID)?,
                &required(SPOTIFY_API_CLIENT_SECRET)?,
            ),
            invidious_instance_url,
            http_timeout,
        })
    }
}
