use crate::error::Error;
use crate::model::{best_thumbnail, TrackRecord, VideoRecord};
use reqwest::Url;
use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use serenity::model::Color;

const SPOTIFY_COLOR: Color = Color::new(0x1DB954);
const YOUTUBE_COLOR: Color = Color::new(0xFF0000);
const YOUTUBE_SHORT_URL: &str = "https://youtu.be/";
const YOUTUBE_MUSIC_URL: &str = "https://music.youtube.com/watch?v=";

pub(crate) fn base(author_text: impl Into<String>, title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .footer(CreateEmbedFooter::new(format!("Slopify v{}", crate::VERSION)))
        .author(CreateEmbedAuthor::new(author_text))
        .title(title)
}

pub(crate) fn error(error: &Error) -> CreateEmbed {
    let (author_text, title) = if error.is_not_found() {
        ("Not found", "Nothing matching this link was found.")
    } else {
        ("Error", "A music service did not respond properly, try again later.")
    };

    base(author_text, title).color(Color::RED)
}

pub(crate) fn track(track: &TrackRecord, video: Option<&VideoRecord>) -> CreateEmbed {
    let mut description = format!("by **{}**\non *{}*", track.artists.join(", "), track.album_title);
    if let Some(video) = video {
        description.push_str(&format!("\n\n**Other platforms:** {}", video_links(&video.id)));
    }

    let embed = base("Spotify", track.title.as_str())
        .url(track.canonical_url.as_str())
        .description(description)
        .color(SPOTIFY_COLOR)
        .field("Length", format_duration(track.duration_ms / 1000), true)
        .field(
            "Album",
            format!("{} tracks, disc {}", track.total_tracks_in_album, track.disc_number),
            true,
        )
        .field("Popularity", format!("{}%", track.popularity), true);
    let embed = if track.explicit {
        embed.field("Explicit", "yes", true)
    } else {
        embed
    };

    match best_thumbnail(&track.thumbnails) {
        None => embed,
        Some(thumbnail) => embed.thumbnail(thumbnail.url.as_str()),
    }
}

pub(crate) fn video(
    video: &VideoRecord,
    track: Option<&TrackRecord>,
    audio_url: Option<&Url>,
) -> CreateEmbed {
    let mut description = format!("by **{}**", video.author);
    if let Some(track) = track {
        description.push_str(&format!("\n\n[Listen on Spotify]({})", track.canonical_url));
    }
    if let Some(audio_url) = audio_url {
        description.push_str(&format!("\n[Audio only]({audio_url})"));
    }

    let embed = base("YouTube", video.title.as_str())
        .url(video.canonical_url.as_str())
        .description(description)
        .color(YOUTUBE_COLOR)
        .field("Length", format_duration(video.length_seconds), true)
        .field("Views", video.view_count.to_string(), true);
    let embed = match video.like_count {
        None => embed,
        Some(like_count) => embed.field("Likes", like_count.to_string(), true),
    };

    match best_thumbnail(&video.thumbnails) {
        None => embed,
        Some(thumbnail) => embed.thumbnail(thumbnail.url.as_str()),
    }
}

fn video_links(video_id: &str) -> String {
    format!("[YouTube]({YOUTUBE_SHORT_URL}{video_id}), [YT Music]({YOUTUBE_MUSIC_URL}{video_id})")
}

fn format_duration(total_seconds: u64) -> String {
    let (hours, minutes, seconds) = (total_seconds / 3600, total_seconds / 60 % 60, total_seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
