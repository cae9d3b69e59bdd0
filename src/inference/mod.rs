//! Rule-based genre, language, and culture inference.
//!
//! Pure functions over free text (title, artist, channel name, description,
//! tags concatenated). No network, no state: identical input always yields
//! identical output, which keeps recommendation tests reproducible.
//!
//! Pattern tables are ordered; for language the first matching entry wins.
//! Genres and culture tags accumulate every match, deduplicated in table
//! order. A track that matches nothing still gets a genre: the fallback
//! tag keeps the "genres never empty" invariant.

use crate::model::{LANGUAGE_INSTRUMENTAL, LANGUAGE_UNKNOWN};

/// Genre applied when no pattern matches.
pub const FALLBACK_GENRE: &str = "pop";

/// Inferred vibe for a track.
#[derive(Debug, Clone, PartialEq)]
pub struct VibeProfile {
    /// Genre tags; never empty
    pub genres: Vec<String>,
    /// Language code, or "unknown"
    pub language: String,
    /// Culture tags; may be empty
    pub culture_tags: Vec<String>,
    /// Confidence in [0, 1], accumulated per matched category
    pub confidence: f32,
}

/// (genre tag, keywords that imply it)
const GENRE_PATTERNS: &[(&str, &[&str])] = &[
    ("hip-hop", &["hip hop", "hip-hop", "rap", "freestyle", "drill"]),
    ("r&b", &["r&b", "rnb", "soul", "neo soul"]),
    ("rock", &["rock", "punk", "grunge", "metal"]),
    ("electronic", &["edm", "electro", "house", "techno", "dubstep", "trance", "dance mix"]),
    ("reggae", &["reggae", "dancehall", "ragga"]),
    ("kompa", &["kompa", "konpa", "zouk"]),
    ("afrobeats", &["afrobeat", "afrobeats", "amapiano", "naija"]),
    ("latin", &["reggaeton", "bachata", "salsa", "merengue", "cumbia", "latino"]),
    ("k-pop", &["k-pop", "kpop"]),
    ("jazz", &["jazz", "bebop", "swing"]),
    ("classical", &["classical", "symphony", "orchestra", "concerto", "piano sonata"]),
    ("country", &["country", "bluegrass", "honky tonk"]),
    ("gospel", &["gospel", "worship", "praise", "hymn"]),
    ("lofi", &["lofi", "lo-fi", "chillhop", "study beats"]),
    ("folk", &["folk", "acoustic", "singer-songwriter"]),
];

/// (language code, markers). First match wins; instrumental checked first
/// so "piano instrumental" doesn't land on a vocal language.
const LANGUAGE_PATTERNS: &[(&str, &[&str])] = &[
    (LANGUAGE_INSTRUMENTAL, &["instrumental", "no vocals", "karaoke version", "backing track"]),
    ("ht", &["kreyol", "kreyòl", "haitian", "haiti", "ayiti"]),
    ("es", &["en español", "español", "spanish", "reggaeton", "bachata", "corrido"]),
    ("fr", &["français", "francais", "french", "chanson"]),
    ("pt", &["português", "portugues", "brasil", "brazilian", "sertanejo"]),
    ("ko", &["korean", "k-pop", "kpop", "한국"]),
    ("ja", &["japanese", "j-pop", "jpop", "日本"]),
    ("hi", &["hindi", "bollywood", "desi"]),
    ("en", &["english", "lyrics"]),
];

/// (culture tag, markers)
const CULTURE_PATTERNS: &[(&str, &[&str])] = &[
    ("caribbean", &["haiti", "kreyol", "kompa", "dancehall", "reggae", "soca", "jamaica"]),
    ("latin", &["reggaeton", "bachata", "salsa", "latino", "cumbia", "merengue"]),
    ("african", &["afrobeat", "amapiano", "naija", "africa"]),
    ("korean", &["k-pop", "kpop", "korean"]),
    ("japanese", &["j-pop", "jpop", "japanese"]),
    ("desi", &["bollywood", "hindi", "punjabi", "desi"]),
    ("francophone", &["français", "francais", "chanson", "quebec"]),
];

/// Confidence contributed by each matched category (genre, language, culture).
const CONFIDENCE_PER_CATEGORY: f32 = 0.25;

/// Infer a [`VibeProfile`] from concatenated track text.
///
/// Deterministic: iteration follows the static table order and the result
/// depends only on `text`.
pub fn infer(text: &str) -> VibeProfile {
    let haystack = text.to_lowercase();

    let mut genres = Vec::new();
    for (genre, keywords) in GENRE_PATTERNS {
        if keywords.iter().any(|k| haystack.contains(k)) {
            genres.push(genre.to_string());
        }
    }

    let language = LANGUAGE_PATTERNS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| haystack.contains(m)))
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| LANGUAGE_UNKNOWN.to_string());

    let mut culture_tags = Vec::new();
    for (tag, markers) in CULTURE_PATTERNS {
        if markers.iter().any(|m| haystack.contains(m)) {
            culture_tags.push(tag.to_string());
        }
    }

    let mut confidence = 0.0;
    if !genres.is_empty() {
        confidence += CONFIDENCE_PER_CATEGORY;
    }
    if language != LANGUAGE_UNKNOWN {
        confidence += CONFIDENCE_PER_CATEGORY;
    }
    if !culture_tags.is_empty() {
        confidence += CONFIDENCE_PER_CATEGORY;
    }

    if genres.is_empty() {
        genres.push(FALLBACK_GENRE.to_string());
    }

    VibeProfile {
        genres,
        language,
        culture_tags,
        confidence: confidence.min(1.0),
    }
}

/// Convenience: infer from the usual track fields.
pub fn infer_from_fields(title: &str, artist: &str, channel_name: &str, extra: &str) -> VibeProfile {
    infer(&format!("{title} {artist} {channel_name} {extra}"))
}
