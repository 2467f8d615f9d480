use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the catalog clients and the cross resolver.
///
/// None of these carry user-facing text, turning them into messages is the
/// presentation layer's job.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad credentials or an unusable configured value. Never retried.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),
    #[error("bad upstream response: {0}")]
    BadUpstreamResponse(#[from] UpstreamFailure),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Every discovered video catalog instance failed its probe.
    #[error("no viable video catalog instance")]
    NoViableInstance,
    /// A cross-platform search came back empty.
    #[error("no match found for {query:?}")]
    NoMatchFound { query: String },
    #[error("video {video_id} has no audio format")]
    NoAudioFormat { video_id: String },
}

#[derive(Error, Debug)]
pub enum UpstreamFailure {
    #[error("the access token was rejected")]
    Unauthorized,
    #[error("{status} {reason}")]
    Status { status: u16, reason: String },
    /// An error the upstream described inside an otherwise readable body.
    #[error("upstream reported an error: {message}")]
    Reported { message: String },
    #[error("malformed body: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("the transport has been closed")]
    Closed,
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(error))
    }
}

impl Error {
    /// Whether the failure means the looked up thing does not exist, as
    /// opposed to a service failing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NoMatchFound { .. }
                | Error::BadUpstreamResponse(UpstreamFailure::Status { status: 404, .. })
        )
    }
}
