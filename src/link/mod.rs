use regex::Regex;
use reqwest::Url;
use rspotify::model::TrackId;
use std::sync::LazyLock;

const TRACK_DOMAIN: &str = "spotify.com";
const TRACK_PATH_PREFIX: &str = "/track/";
const VIDEO_DOMAINS: [&str; 2] = ["youtube.com", "youtu.be"];
const VIDEO_ID_QUERY_KEY: &str = "v";

/// A bare http(s) URL that does not end in sentence punctuation or a closing
/// bracket or quote.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>]*[^\s<>.,;:!?)\]}'"]"#).expect("the URL pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Catalog {
    Track,
    Video,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub catalog: Catalog,
    pub id: String,
    pub url: Url,
}

/// Every recognised catalog link in `text`, in order of appearance.
///
/// A URL written as `<https://…>` is suppressed on purpose by its author and
/// is skipped. URLs of unrelated hosts are ignored.
pub fn extract_links(text: &str) -> Vec<Link> {
    URL_PATTERN
        .find_iter(text)
        .filter(|found| {
            !(text[..found.start()].ends_with('<') && text[found.end()..].starts_with('>'))
        })
        .filter_map(|found| Url::parse(found.as_str()).ok())
        .filter_map(classify)
        .collect()
}

pub fn classify(url: Url) -> Option<Link> {
    let host = url.host_str()?;

    let (catalog, id) = if host.ends_with(TRACK_DOMAIN) {
        if !url.path().starts_with(TRACK_PATH_PREFIX) {
            return None;
        }
        let id = url.path().split('/').nth(2)?;
        TrackId::from_id(id).ok()?;
        (Catalog::Track, id.to_owned())
    } else if VIDEO_DOMAINS.iter().any(|domain| host.ends_with(domain)) {
        let id = url
            .query_pairs()
            .find(|(key, _)| key == VIDEO_ID_QUERY_KEY)
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty())
            .or_else(|| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .map(str::to_owned)
            })
            .filter(|id| !id.is_empty())?;
        (Catalog::Video, id)
    } else {
        return None;
    };

    Some(Link { catalog, id, url })
}
