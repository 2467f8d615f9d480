use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Thumbnail {
    /// Pixel area, zero when a dimension is unknown.
    pub fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// Picks the largest candidate by area, the first one when areas tie.
pub fn best_thumbnail(thumbnails: &[Thumbnail]) -> Option<&Thumbnail> {
    thumbnails.iter().fold(None, |best: Option<&Thumbnail>, thumbnail| match best {
        Some(best) if best.area() >= thumbnail.area() => Some(best),
        _ => Some(thumbnail),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album_title: String,
    pub disc_number: u32,
    pub total_tracks_in_album: u32,
    pub duration_ms: u64,
    pub popularity: u32,
    pub explicit: bool,
    pub canonical_url: String,
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub mime_type: String,
    pub bitrate: u64,
    pub itag: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    pub length_seconds: u64,
    pub view_count: u64,
    /// Search results do not carry it.
    pub like_count: Option<u64>,
    pub canonical_url: String,
    pub thumbnails: Vec<Thumbnail>,
    /// Empty for search results.
    pub audio_formats: Vec<AudioFormat>,
}

impl VideoRecord {
    /// The `audio/*` format with the highest bitrate. The first one wins a tie.
    pub fn best_audio_format(&self) -> Option<&AudioFormat> {
        self.audio_formats
            .iter()
            .filter(|format| format.mime_type.starts_with("audio/"))
            .fold(None, |best: Option<&AudioFormat>, format| match best {
                Some(best) if best.bitrate >= format.bitrate => Some(best),
                _ => Some(format),
            })
    }
}
