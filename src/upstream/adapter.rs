//! DTO -> domain conversion for upstream responses.
//!
//! Also home to the small parsing helpers the conversions need:
//! ISO-8601 duration decoding, "Artist - Title" splitting, and the
//! bridge from [`UpstreamTrack`] to a [`DiscoveredTrack`] with inferred
//! vibe attached.

use chrono::{DateTime, Utc};

use super::dto;
use super::UpstreamTrack;
use crate::db::DiscoveredTrack;
use crate::inference;

/// Convert a search item into a domain track.
///
/// Search results carry no duration/statistics; those arrive via the
/// detail endpoint. Items without a video id (channels, playlists) are
/// rejected as `None`.
pub fn from_search_item(item: dto::SearchItem) -> Option<UpstreamTrack> {
    let external_id = item.id.video_id?;
    if external_id.trim().is_empty() {
        return None;
    }
    Some(from_snippet(external_id, item.snippet, 0, 0))
}

/// Convert a full video item (detail/trending endpoints).
pub fn from_video_item(item: dto::VideoItem) -> Option<UpstreamTrack> {
    if item.id.trim().is_empty() {
        return None;
    }
    let duration_secs = item
        .content_details
        .as_ref()
        .map(|cd| parse_iso8601_duration(&cd.duration))
        .unwrap_or(0);
    let view_count = item
        .statistics
        .as_ref()
        .and_then(|s| s.view_count.as_deref())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    Some(from_snippet(item.id, item.snippet, duration_secs, view_count))
}

fn from_snippet(
    external_id: String,
    snippet: dto::Snippet,
    duration_secs: i64,
    view_count: i64,
) -> UpstreamTrack {
    let (artist, title) = split_artist_title(&snippet.title, &snippet.channel_title);
    let thumbnail_url = snippet
        .thumbnails
        .and_then(|t| t.medium.or(t.default))
        .map(|t| t.url);
    let published_at = snippet
        .published_at
        .as_deref()
        .and_then(parse_timestamp);

    UpstreamTrack {
        external_id,
        title,
        artist,
        channel_id: snippet.channel_id,
        channel_name: snippet.channel_title,
        duration_secs,
        thumbnail_url,
        view_count,
        published_at,
        description: snippet.description,
        tags: snippet.tags,
    }
}

/// Turn an upstream track into a discovery upsert, running vibe inference
/// over its text fields.
pub fn to_discovered(track: &UpstreamTrack) -> DiscoveredTrack {
    let extra = format!("{} {}", track.description, track.tags.join(" "));
    let profile =
        inference::infer_from_fields(&track.title, &track.artist, &track.channel_name, &extra);

    DiscoveredTrack {
        external_id: track.external_id.clone(),
        title: track.title.clone(),
        artist: track.artist.clone(),
        channel_id: track.channel_id.clone(),
        channel_name: track.channel_name.clone(),
        duration_secs: track.duration_secs,
        thumbnail_url: track.thumbnail_url.clone(),
        view_count: track.view_count,
        published_at: track.published_at,
        genres: profile.genres,
        language: profile.language,
        culture_tags: profile.culture_tags,
    }
}

/// Parse an ISO-8601 duration like "PT1H3M20S" into seconds.
///
/// Malformed input degrades to 0 rather than failing the whole response.
pub fn parse_iso8601_duration(s: &str) -> i64 {
    let Some(rest) = s.strip_prefix("PT").or_else(|| s.strip_prefix("P")) else {
        return 0;
    };

    let mut total: i64 = 0;
    let mut number = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let value: i64 = number.parse().unwrap_or(0);
        number.clear();
        match ch {
            'D' => total += value * 86_400,
            'H' => total += value * 3_600,
            'M' => total += value * 60,
            'S' => total += value,
            'T' => {}
            _ => return 0,
        }
    }
    total
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split "Artist - Title" style upload names.
///
/// Falls back to the channel name as artist when the title has no
/// separator. Common suffix noise like "(Official Video)" is stripped
/// from the title side.
pub fn split_artist_title(raw_title: &str, channel_name: &str) -> (String, String) {
    const SEPARATORS: &[&str] = &[" - ", " – ", " — ", " | "];

    for sep in SEPARATORS {
        if let Some((artist, title)) = raw_title.split_once(sep) {
            let artist = artist.trim();
            let title = strip_title_noise(title.trim());
            if !artist.is_empty() && !title.is_empty() {
                return (artist.to_string(), title);
            }
        }
    }

    let artist = channel_name
        .trim()
        .trim_end_matches(" - Topic")
        .trim()
        .to_string();
    (artist, strip_title_noise(raw_title.trim()))
}

fn strip_title_noise(title: &str) -> String {
    const NOISE: &[&str] = &[
        "(official video)",
        "(official music video)",
        "(official audio)",
        "(lyric video)",
        "(lyrics)",
        "[official video]",
        "[official audio]",
        "(audio)",
        "(hd)",
        "(4k)",
    ];

    let mut result = title.to_string();
    loop {
        let lower = result.to_lowercase();
        let Some(noise) = NOISE.iter().find(|n| lower.ends_with(*n)) else {
            break;
        };
        let cut = result.len() - noise.len();
        result.truncate(cut);
        result = result.trim_end().to_string();
    }
    if result.is_empty() {
        title.to_string()
    } else {
        result
    }
}
