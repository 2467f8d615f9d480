use crate::error::{Error, Result, TransportError, UpstreamFailure};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serenity::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub bearer_token: Option<String>,
    pub read_body: bool,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            form: Vec::new(),
            bearer_token: None,
            read_body: true,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Only the status and the final URL (after redirects) are of interest.
    pub fn without_body(mut self) -> Self {
        self.read_body = false;
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(query_key, _)| query_key == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub url: Url,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, UpstreamFailure> {
        serde_json::from_slice(&self.body).map_err(|error| UpstreamFailure::Malformed(error.to_string()))
    }

    pub fn ensure_success(self) -> std::result::Result<Self, UpstreamFailure> {
        if self.status.is_success() {
            return Ok(self);
        }

        Err(UpstreamFailure::Status {
            status: self.status.as_u16(),
            reason: self
                .status
                .canonical_reason()
                .unwrap_or("unknown")
                .to_owned(),
        })
    }
}

/// The single seam every upstream call goes through.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;

    /// Releases the underlying connection pool. Later calls fail with
    /// [`TransportError::Closed`].
    async fn close(&self);
}

pub struct HttpTransport {
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: RwLock::new(Some(client)),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or(TransportError::Closed)?;

        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = client.request(request.method, request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        if let Some(token) = request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let body = if request.read_body {
            response.bytes().await?.to_vec()
        } else {
            Vec::new()
        };

        Ok(Response { status, url, body })
    }

    async fn close(&self) {
        self.client.write().await.take();
    }
}

/// Appends path segments to `base`, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Misconfiguration(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use mockall::mock;
    use serde_json::Value;

    mock! {
        pub(crate) Transport {}

        #[async_trait]
        impl Transport for Transport {
            async fn execute(&self, request: Request) -> Result<Response>;
            async fn close(&self);
        }
    }

    pub(crate) fn json_response(status: u16, url: &Url, body: Value) -> Response {
        Response {
            status: StatusCode::from_u16(status).unwrap(),
            url: url.clone(),
            body: serde_json::to_vec(&body).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let base = Url::parse("https://invidious.example").unwrap();
        let url = endpoint(&base, &["api", "v1", "videos", "a b"]).unwrap();

        assert_eq!(url.as_str(), "https://invidious.example/api/v1/videos/a%20b");
    }

    #[test]
    fn endpoint_keeps_existing_path() {
        let base = Url::parse("https://api.spotify.com/v1").unwrap();
        let url = endpoint(&base, &["tracks", "ABC123"]).unwrap();

        assert_eq!(url.as_str(), "https://api.spotify.com/v1/tracks/ABC123");
    }

    #[test]
    fn non_success_status_carries_reason() {
        let response = Response {
            status: StatusCode::SERVICE_UNAVAILABLE,
            url: Url::parse("https://example.com").unwrap(),
            body: Vec::new(),
        };

        match response.ensure_success() {
            Err(UpstreamFailure::Status { status, reason }) => {
                assert_eq!(status, 503);
                assert_eq!(reason, "Service Unavailable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_transport_refuses_requests() {
        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        transport.close().await;

        let result = transport
            .execute(Request::get(Url::parse("https://example.com").unwrap()))
            .await;

        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::Closed))
        ));
    }
}
