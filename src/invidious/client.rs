use super::instance::InstanceSelector;
use crate::error::{Error, Result, UpstreamFailure};
use crate::http::{endpoint, Request, Transport};
use crate::model::{AudioFormat, Thumbnail, VideoRecord};
use crate::service::Service;
use reqwest::Url;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serenity::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

/// Invidious encodes `bitrate` as a string, accept both.
fn bitrate<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(number) => Ok(number),
        NumberOrString::String(string) => string.parse().map_err(D::Error::custom),
    }
}

fn itag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(number) => number.to_string(),
        NumberOrString::String(string) => string,
    })
}

#[derive(Deserialize)]
struct InvidiousFormat {
    #[serde(rename = "type")]
    mime_type: String,
    #[serde(deserialize_with = "bitrate")]
    bitrate: u64,
    #[serde(deserialize_with = "itag")]
    itag: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvidiousVideo {
    video_id: String,
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    length_seconds: u64,
    #[serde(default)]
    view_count: u64,
    like_count: Option<u64>,
    #[serde(default)]
    video_thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    adaptive_formats: Vec<InvidiousFormat>,
}

impl From<InvidiousVideo> for VideoRecord {
    fn from(video: InvidiousVideo) -> Self {
        Self {
            canonical_url: format!("{WATCH_URL}{}", video.video_id),
            id: video.video_id,
            title: video.title,
            author: video.author,
            length_seconds: video.length_seconds,
            view_count: video.view_count,
            like_count: video.like_count,
            thumbnails: video.video_thumbnails,
            audio_formats: video
                .adaptive_formats
                .into_iter()
                .map(|format| AudioFormat {
                    mime_type: format.mime_type,
                    bitrate: format.bitrate,
                    itag: format.itag,
                })
                .collect(),
        }
    }
}

/// Relevance-ranked video search against one instance.
///
/// Items other than videos (channels, playlists) are dropped.
pub(super) async fn search(
    transport: &dyn Transport,
    instance: &Url,
    query: &str,
) -> Result<Vec<VideoRecord>> {
    debug!(query, %instance, "searching videos");

    let request = Request::get(endpoint(instance, &["api", "v1", "search"])?)
        .query("q", query)
        .query("sort_by", "relevance")
        .query("type", "video");
    let items: Vec<Value> = transport.execute(request).await?.ensure_success()?.json()?;

    items
        .into_iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("video"))
        .map(|item| -> Result<VideoRecord> {
            let video: InvidiousVideo = serde_json::from_value(item)
                .map_err(|error| UpstreamFailure::Malformed(error.to_string()))?;
            Ok(video.into())
        })
        .collect()
}

async fn fetch_video(transport: &dyn Transport, instance: &Url, id: &str) -> Result<VideoRecord> {
    debug!(id, %instance, "fetching video");

    let response = transport
        .execute(Request::get(endpoint(instance, &["api", "v1", "videos", id])?))
        .await?;
    if let Ok(ErrorBody { error }) = response.json::<ErrorBody>() {
        return Err(UpstreamFailure::Reported { message: error }.into());
    }

    Ok(response.ensure_success()?.json::<InvidiousVideo>()?.into())
}

/// Video catalog access through one Invidious instance, chosen once and kept
/// for the client's lifetime.
pub struct VideoCatalogClient {
    transport: Box<dyn Transport>,
    /// `None` once selection has failed, no instance is tried again.
    instance: OnceCell<Option<Url>>,
}

impl VideoCatalogClient {
    /// With `pinned_instance`, discovery never runs and the instance is used
    /// without a health check.
    pub fn new(transport: Box<dyn Transport>, pinned_instance: Option<Url>) -> Self {
        Self {
            transport,
            instance: OnceCell::new_with(pinned_instance.map(Some)),
        }
    }

    /// The selected instance, running discovery and selection on first use.
    /// Concurrent first callers wait for a single selection.
    ///
    /// A failed selection is final: the first caller gets its cause, every
    /// later call fails with [`Error::NoViableInstance`] without touching the
    /// network.
    pub async fn instance(&self) -> Result<&Url> {
        let mut failure = None;
        let failure_slot = &mut failure;
        let selected = self
            .instance
            .get_or_init(|| async move {
                InstanceSelector::new(self.transport.as_ref())
                    .discover_and_select()
                    .await
                    .inspect_err(|error| error!(%error, "no usable Invidious instance"))
                    .map_err(|error| *failure_slot = Some(error))
                    .ok()
            })
            .await;

        match (selected, failure) {
            (Some(instance), _) => Ok(instance),
            (None, Some(error)) => Err(error),
            (None, None) => Err(Error::NoViableInstance),
        }
    }

    /// Fetches one video. An error reported in the response body is retried
    /// exactly once, instances intermittently answer with a different video
    /// than the requested one.
    #[instrument(skip(self))]
    pub async fn get_video(&self, id: &str) -> Result<VideoRecord> {
        let instance = self.instance().await?;

        match fetch_video(self.transport.as_ref(), instance, id).await {
            Err(Error::BadUpstreamResponse(UpstreamFailure::Reported { message })) => {
                warn!(id, error = %message, "failed to fetch the video, trying once more");
                fetch_video(self.transport.as_ref(), instance, id).await
            }
            result => result,
        }
    }

    #[instrument(skip(self))]
    pub async fn search_videos(&self, query: &str) -> Result<Vec<VideoRecord>> {
        search(self.transport.as_ref(), self.instance().await?, query).await
    }

    /// Direct playable URL of the video's best audio format.
    #[instrument(skip_all, fields(id = %video.id))]
    pub async fn locate_audio_source(&self, video: &VideoRecord) -> Result<Url> {
        let format = video
            .best_audio_format()
            .ok_or_else(|| Error::NoAudioFormat {
                video_id: video.id.clone(),
            })?;
        let instance = self.instance().await?;

        let request = Request::get(endpoint(instance, &["latest_version"])?)
            .query("id", video.id.as_str())
            .query("itag", format.itag.as_str())
            .query("local", "true")
            .without_body();

        Ok(self.transport.execute(request).await?.ensure_success()?.url)
    }
}

#[async_trait]
impl Service for VideoCatalogClient {
    async fn start(&self) -> Result<()> {
        let instance = self.instance().await?;
        info!(%instance, "using Invidious instance");

        Ok(())
    }

    async fn stop(&self) {
        self.transport.close().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::mock::{json_response, MockTransport};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) const INSTANCE: &str = "https://invidious.example";

    pub(crate) fn video_json(id: &str, title: &str) -> Value {
        json!({
            "type": "video",
            "videoId": id,
            "title": title,
            "author": "Uploader",
            "lengthSeconds": 213,
            "viewCount": 1_000_000,
            "likeCount": 10_000,
            "videoThumbnails": [
                { "quality": "maxres", "url": "https://i.ytimg.com/vi/x/maxres.jpg", "width": 1280, "height": 720 }
            ],
            "adaptiveFormats": [
                { "type": "audio/webm; codecs=\"opus\"", "bitrate": "128000", "itag": "251" },
                { "type": "audio/mp4; codecs=\"mp4a.40.2\"", "bitrate": "256000", "itag": "140" },
                { "type": "video/mp4; codecs=\"avc1\"", "bitrate": "1000000", "itag": "137" }
            ]
        })
    }

    pub(crate) fn search_item_json(id: &str, title: &str) -> Value {
        json!({
            "type": "video",
            "videoId": id,
            "title": title,
            "author": "Uploader",
            "lengthSeconds": 213,
            "viewCount": 1_000_000,
            "videoThumbnails": []
        })
    }

    pub(crate) fn pinned_client(transport: MockTransport) -> VideoCatalogClient {
        VideoCatalogClient::new(Box::new(transport), Some(Url::parse(INSTANCE).unwrap()))
    }

    fn expect_video_fetches(transport: &mut MockTransport, outcomes: Vec<Value>) -> Arc<AtomicUsize> {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        transport
            .expect_execute()
            .withf(|request| request.url.path() == "/api/v1/videos/XYZ987")
            .returning(move |request| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                Ok(json_response(200, &request.url, outcomes[attempt].clone()))
            });
        attempts
    }

    fn mismatch() -> Value {
        json!({ "error": "The video returned by YouTube isn't the requested one." })
    }

    #[tokio::test]
    async fn mismatch_then_success_is_retried_once() {
        let mut transport = MockTransport::new();
        let attempts =
            expect_video_fetches(&mut transport, vec![mismatch(), video_json("XYZ987", "Title")]);
        let client = pinned_client(transport);

        let video = client.get_video("XYZ987").await.unwrap();

        assert_eq!(video.id, "XYZ987");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn two_mismatches_fail_after_two_attempts() {
        let mut transport = MockTransport::new();
        let attempts = expect_video_fetches(&mut transport, vec![mismatch(), mismatch(), mismatch()]);
        let client = pinned_client(transport);

        let result = client.get_video("XYZ987").await;

        assert!(matches!(
            result,
            Err(Error::BadUpstreamResponse(UpstreamFailure::Reported { .. }))
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn status_errors_are_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|request| Ok(json_response(502, &request.url, json!("bad gateway"))));
        let client = pinned_client(transport);

        assert!(matches!(
            client.get_video("XYZ987").await,
            Err(Error::BadUpstreamResponse(UpstreamFailure::Status { status: 502, .. }))
        ));
    }

    #[tokio::test]
    async fn fetched_video_is_mapped() {
        let mut transport = MockTransport::new();
        expect_video_fetches(&mut transport, vec![video_json("XYZ987", "Title")]);
        let client = pinned_client(transport);

        let video = client.get_video("XYZ987").await.unwrap();

        assert_eq!(video.title, "Title");
        assert_eq!(video.author, "Uploader");
        assert_eq!(video.length_seconds, 213);
        assert_eq!(video.like_count, Some(10_000));
        assert_eq!(video.canonical_url, "https://www.youtube.com/watch?v=XYZ987");
        assert_eq!(video.audio_formats.len(), 3);
        assert_eq!(video.audio_formats[1].bitrate, 256_000);
        assert_eq!(video.audio_formats[1].itag, "140");
    }

    #[tokio::test]
    async fn search_keeps_only_videos_in_upstream_order() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|request| {
                assert_eq!(request.url.path(), "/api/v1/search");
                assert_eq!(request.query_value("q"), Some("some song"));
                assert_eq!(request.query_value("sort_by"), Some("relevance"));
                assert_eq!(request.query_value("type"), Some("video"));
                Ok(json_response(
                    200,
                    &request.url,
                    json!([
                        search_item_json("SECOND", "b"),
                        { "type": "channel", "author": "Someone", "authorId": "UC123" },
                        search_item_json("FIRST", "a")
                    ]),
                ))
            });
        let client = pinned_client(transport);

        let ids = client
            .search_videos("some song")
            .await
            .unwrap()
            .into_iter()
            .map(|video| video.id)
            .collect::<Vec<_>>();

        assert_eq!(ids, vec!["SECOND".to_owned(), "FIRST".to_owned()]);
    }

    #[tokio::test]
    async fn audio_source_uses_the_best_audio_itag() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|request| {
                assert_eq!(request.url.path(), "/latest_version");
                assert_eq!(request.query_value("id"), Some("XYZ987"));
                assert_eq!(request.query_value("itag"), Some("140"));
                assert_eq!(request.query_value("local"), Some("true"));
                assert!(!request.read_body);
                let redirected = Url::parse("https://invidious.example/videoplayback?itag=140").unwrap();
                Ok(json_response(200, &redirected, Value::Null))
            });
        let client = pinned_client(transport);
        let video: VideoRecord = serde_json::from_value::<InvidiousVideo>(video_json("XYZ987", "Title"))
            .unwrap()
            .into();

        let url = client.locate_audio_source(&video).await.unwrap();

        assert_eq!(url.as_str(), "https://invidious.example/videoplayback?itag=140");
    }

    #[tokio::test]
    async fn audio_source_requires_an_audio_format() {
        let client = pinned_client(MockTransport::new());
        let mut video: VideoRecord = serde_json::from_value::<InvidiousVideo>(video_json("XYZ987", "Title"))
            .unwrap()
            .into();
        video.audio_formats.retain(|format| format.mime_type.starts_with("video/"));

        assert!(matches!(
            client.locate_audio_source(&video).await,
            Err(Error::NoAudioFormat { .. })
        ));
    }

    #[tokio::test]
    async fn pinned_instance_skips_discovery() {
        let client = pinned_client(MockTransport::new());

        client.start().await.unwrap();

        assert_eq!(client.instance().await.unwrap().as_str(), "https://invidious.example/");
    }
}
