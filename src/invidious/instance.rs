use super::client::search;
use crate::error::{Error, Result};
use crate::http::{Request, Transport};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const REGISTRY_URL: &str = "https://api.invidious.io/instances.json";
pub const CANARY_QUERY: &str = "Never Gonna Give You Up";

#[derive(Deserialize)]
struct InstanceDescriptor {
    stats: Option<Value>,
    api: Option<bool>,
    #[serde(rename = "type")]
    kind: Option<String>,
    uri: Option<String>,
}

impl InstanceDescriptor {
    fn viable_uri(self) -> Option<Url> {
        if self.stats.is_none() || self.api != Some(true) || self.kind.as_deref() != Some("https") {
            return None;
        }

        self.uri
            .filter(|uri| !uri.is_empty())
            .and_then(|uri| Url::parse(&uri).ok())
    }
}

/// Finds an Invidious instance that answers API queries.
pub struct InstanceSelector<'a> {
    transport: &'a dyn Transport,
}

impl<'a> InstanceSelector<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Candidate base URLs in registry order. Entries that are malformed or
    /// lack stats, API access or HTTPS are not candidates.
    pub async fn discover_instances(&self) -> Result<Vec<Url>> {
        let registry_url = Url::parse(REGISTRY_URL)
            .map_err(|error| Error::Misconfiguration(format!("{REGISTRY_URL}: {error}")))?;
        let entries: Vec<Value> = self
            .transport
            .execute(Request::get(registry_url))
            .await?
            .ensure_success()?
            .json()?;

        let candidates = entries
            .into_iter()
            .filter_map(|entry| {
                match serde_json::from_value::<(String, InstanceDescriptor)>(entry) {
                    Ok((name, descriptor)) => descriptor.viable_uri().or_else(|| {
                        debug!(%name, "skipping a non-viable instance");
                        None
                    }),
                    Err(error) => {
                        debug!(%error, "skipping a malformed registry entry");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        debug!(count = candidates.len(), "discovered Invidious instances");

        Ok(candidates)
    }

    /// The first candidate that answers the canary search. Failing candidates
    /// are skipped and not tried again.
    pub async fn select(&self, candidates: Vec<Url>) -> Result<Url> {
        for candidate in candidates {
            match search(self.transport, &candidate, CANARY_QUERY).await {
                Ok(_) => {
                    info!(%candidate, "selected an Invidious instance");
                    return Ok(candidate);
                }
                Err(error) => warn!(%candidate, %error, "failed to connect, trying the next instance"),
            }
        }

        Err(Error::NoViableInstance)
    }

    pub async fn discover_and_select(&self) -> Result<Url> {
        let candidates = self.discover_instances().await?;
        self.select(candidates).await
    }
}
