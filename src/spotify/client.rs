use super::lease::TokenLease;
use crate::error::{Error, Result, UpstreamFailure};
use crate::http::{endpoint, Request, Response, Transport};
use crate::model::{Thumbnail, TrackRecord};
use crate::service::Service;
use reqwest::{StatusCode, Url};
use rspotify::model::{FullTrack, Id, Page};
use rspotify::Credentials;
use serde::Deserialize;
use serde_json::Value;
use serenity::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE_URL: &str = "https://api.spotify.com/v1";
const INVALID_CLIENT_ERROR: &str = "invalid_client";

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Granted {
        access_token: String,
        expires_in: u64,
    },
    Rejected {
        error: String,
        error_description: Option<String>,
    },
}

/// A catalog track as served by the tracks and search endpoints. The album's
/// track count is not part of the typed track model, so it is read from the
/// raw album object.
struct CatalogTrack {
    track: FullTrack,
    total_tracks_in_album: u32,
}

impl TryFrom<Value> for CatalogTrack {
    type Error = UpstreamFailure;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        let total_tracks_in_album = value
            .pointer("/album/total_tracks")
            .and_then(Value::as_u64)
            .and_then(|total| u32::try_from(total).ok())
            .unwrap_or_default();
        let track = FullTrack::deserialize(value).map_err(|error| UpstreamFailure::Malformed(error.to_string()))?;

        Ok(Self {
            track,
            total_tracks_in_album,
        })
    }
}

impl TryFrom<CatalogTrack> for TrackRecord {
    type Error = UpstreamFailure;

    fn try_from(catalog_track: CatalogTrack) -> std::result::Result<Self, Self::Error> {
        let CatalogTrack {
            mut track,
            total_tracks_in_album,
        } = catalog_track;
        let id = track
            .id
            .ok_or_else(|| UpstreamFailure::Malformed(format!("the track {} has no id", track.name)))?;

        Ok(Self {
            canonical_url: track.external_urls.remove("spotify").unwrap_or_else(|| id.url()),
            id: id.id().to_owned(),
            title: track.name,
            artists: track.artists.into_iter().map(|artist| artist.name).collect(),
            album_title: track.album.name,
            disc_number: u32::try_from(track.disc_number).unwrap_or_default(),
            total_tracks_in_album,
            duration_ms: u64::try_from(track.duration.num_milliseconds()).unwrap_or_default(),
            popularity: track.popularity,
            explicit: track.explicit,
            thumbnails: track
                .album
                .images
                .into_iter()
                .map(|image| Thumbnail {
                    url: image.url,
                    width: image.width,
                    height: image.height,
                })
                .collect(),
        })
    }
}

fn track_record(value: Value) -> Result<TrackRecord> {
    Ok(CatalogTrack::try_from(value)?.try_into()?)
}

#[derive(Deserialize)]
struct TrackSearch {
    tracks: Page<Value>,
}

/// Read and search access to the track catalog under the client-credentials
/// grant.
pub struct TrackCatalogClient {
    transport: Box<dyn Transport>,
    client_id: String,
    client_secret: String,
    token_url: Url,
    api_url: Url,
    /// Held across check-then-refresh, so concurrent callers wait for a
    /// single in-flight credential exchange and then share its token.
    lease: Mutex<TokenLease>,
}

impl TrackCatalogClient {
    pub fn new(credentials: &Credentials, transport: Box<dyn Transport>) -> Result<Self> {
        let client_secret = credentials
            .secret
            .clone()
            .ok_or_else(|| Error::Misconfiguration("the Spotify client secret is missing".to_owned()))?;
        if credentials.id.is_empty() || client_secret.is_empty() {
            return Err(Error::Misconfiguration(
                "the Spotify client id and secret must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            transport,
            client_id: credentials.id.clone(),
            client_secret,
            token_url: parse_constant_url(TOKEN_URL)?,
            api_url: parse_constant_url(API_BASE_URL)?,
            lease: Mutex::new(TokenLease::default()),
        })
    }

    #[instrument(skip(self))]
    pub async fn fetch_track(&self, id: &str) -> Result<TrackRecord> {
        let url = endpoint(&self.api_url, &["tracks", id])?;
        let track: Value = self.authorized(Request::get(url)).await?.json()?;

        track_record(track)
    }

    /// Tracks in the order the catalog ranked them.
    #[instrument(skip(self))]
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<TrackRecord>> {
        let url = endpoint(&self.api_url, &["search"])?;
        let request = Request::get(url).query("q", query).query("type", "track");
        let search: TrackSearch = self.authorized(request).await?.json()?;

        search.tracks.items.into_iter().map(track_record).collect()
    }

    async fn authorized(&self, request: Request) -> Result<Response> {
        let token = self.bearer_token().await?;
        let response = self
            .transport
            .execute(request.bearer_token(token.as_str()))
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            // Not retried here, the next call exchanges credentials again.
            self.lease.lock().await.invalidate(&token);
            return Err(UpstreamFailure::Unauthorized.into());
        }

        Ok(response.ensure_success()?)
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut lease = self.lease.lock().await;
        if let Some(token) = lease.usable_token(Instant::now()) {
            return Ok(token.to_owned());
        }

        let (token, lifetime) = self.exchange_credentials().await?;
        lease.renew(token.clone(), lifetime, Instant::now());

        Ok(token)
    }

    async fn exchange_credentials(&self) -> Result<(String, Duration)> {
        debug!("exchanging client credentials for an access token");

        let request = Request::post(self.token_url.clone())
            .form("grant_type", "client_credentials")
            .form("client_id", self.client_id.as_str())
            .form("client_secret", self.client_secret.as_str());
        let response = self.transport.execute(request).await?;

        match response.json::<TokenResponse>() {
            Ok(TokenResponse::Granted {
                access_token,
                expires_in,
            }) => {
                info!(expires_in, "obtained a Spotify access token");
                Ok((access_token, Duration::from_secs(expires_in)))
            }
            Ok(TokenResponse::Rejected { error, .. }) if error == INVALID_CLIENT_ERROR => Err(
                Error::Misconfiguration("invalid Spotify client id or secret".to_owned()),
            ),
            Ok(TokenResponse::Rejected {
                error,
                error_description,
            }) => Err(UpstreamFailure::Reported {
                message: error_description.unwrap_or(error),
            }
            .into()),
            Err(failure) => Err(response.ensure_success().err().unwrap_or(failure).into()),
        }
    }
}

#[async_trait]
impl Service for TrackCatalogClient {
    /// Fails fast on bad credentials instead of on the first lookup.
    async fn start(&self) -> Result<()> {
        self.bearer_token().await.map(|_| ())
    }

    async fn stop(&self) {
        self.transport.close().await;
    }
}

fn parse_constant_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|error| Error::Misconfiguration(format!("{url}: {error}")))
}
