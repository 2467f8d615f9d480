use crate::error::{Error, Result};
use crate::invidious::VideoCatalogClient;
use crate::model::{TrackRecord, VideoRecord};
use crate::spotify::TrackCatalogClient;
use std::sync::Arc;
use tracing::debug;

trait ToSearchQuery {
    fn to_search_query(&self) -> String;
}

impl ToSearchQuery for TrackRecord {
    /// The title followed by every artist, in credit order.
    fn to_search_query(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.artists.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ToSearchQuery for VideoRecord {
    fn to_search_query(&self) -> String {
        self.title.clone()
    }
}

/// Finds the counterpart of a track on the video catalog and the other way
/// around.
///
/// Matching trusts the first search hit. There is no re-ranking and no
/// confidence threshold, so ambiguous titles can resolve to the wrong item.
#[derive(Clone)]
pub struct CrossResolver {
    tracks: Arc<TrackCatalogClient>,
    videos: Arc<VideoCatalogClient>,
}

impl CrossResolver {
    pub fn new(tracks: Arc<TrackCatalogClient>, videos: Arc<VideoCatalogClient>) -> Self {
        Self { tracks, videos }
    }

    pub async fn resolve_track_to_video(&self, track_id: &str) -> Result<String> {
        let track = self.tracks.fetch_track(track_id).await?;
        Ok(self.track_to_video(&track).await?.id)
    }

    pub async fn resolve_video_to_track(&self, video_id: &str) -> Result<String> {
        let video = self.videos.get_video(video_id).await?;
        Ok(self.video_to_track(&video).await?.id)
    }

    pub async fn track_to_video(&self, track: &TrackRecord) -> Result<VideoRecord> {
        let query = track.to_search_query();
        let video = self.videos.search_videos(&query).await?.into_iter().next();
        debug!(track = %track.id, video = ?video.as_ref().map(|video| &video.id), "resolved track");

        video.ok_or(Error::NoMatchFound { query })
    }

    pub async fn video_to_track(&self, video: &VideoRecord) -> Result<TrackRecord> {
        let query = video.to_search_query();
        let track = self.tracks.search_tracks(&query).await?.into_iter().next();
        debug!(video = %video.id, track = ?track.as_ref().map(|track| &track.id), "resolved video");

        track.ok_or(Error::NoMatchFound { query })
    }
}
