//! Classification and canonicalization of Spotify references.
//!
//! Supported forms:
//! - `https://open.spotify.com/track/6rqhFgbbKwnb9MLmUQDhG6`
//! - `https://open.spotify.com/intl-de/track/6rqhFgbbKwnb9MLmUQDhG6?si=...`
//! - `https://open.spotify.com/embed/album/...`, `play.spotify.com`, `embed.spotify.com`
//! - `open.spotify.com/artist/...` (no scheme)
//! - `https://open.spotify.com/user/someone/playlist/...` (legacy)
//! - `spotify:track:...`, `spotify:user:someone:playlist:...`

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{InvalidReason, Result, ScrapeError};

const SPOTIFY_HOSTS: &[&str] = &[
    "open.spotify.com",
    "play.spotify.com",
    "embed.spotify.com",
    "spotify.com",
    "www.spotify.com",
];

const WEB_BASE: &str = "https://open.spotify.com";

const MAX_ID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Track,
        ContentKind::Album,
        ContentKind::Artist,
        ContentKind::Playlist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Track => "track",
            ContentKind::Album => "album",
            ContentKind::Artist => "artist",
            ContentKind::Playlist => "playlist",
        }
    }

    pub fn parse(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(segment))
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified reference: what kind of content and its canonical id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ContentKind,
    pub canonical_id: String,
}

impl Reference {
    pub fn uri(&self) -> String {
        format!("spotify:{}:{}", self.kind, self.canonical_id)
    }

    pub fn web_url(&self) -> String {
        format!("{}/{}/{}", WEB_BASE, self.kind, self.canonical_id)
    }

    pub fn embed_url(&self) -> String {
        format!("{}/embed/{}/{}", WEB_BASE, self.kind, self.canonical_id)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// True when `s` opens with `scheme://`. A `://` later in the path or
/// query does not count.
fn has_scheme(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, _)) => {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Classify a web URL or `spotify:` URI into a [`Reference`].
///
/// Query strings and fragments (`si`, `utm_*`, ...) never reach the canonical
/// form, and host variants collapse onto `open.spotify.com`.
pub fn classify(input: &str) -> Result<Reference> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::invalid(input, InvalidReason::Empty));
    }

    if let Some(rest) = strip_prefix_ignore_case(trimmed, "spotify:") {
        return classify_uri(input, rest);
    }

    let with_scheme = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ScrapeError::invalid(input, InvalidReason::Unparseable(e.to_string())))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ScrapeError::invalid(
                input,
                InvalidReason::UnsupportedScheme(other.to_string()),
            ));
        }
    }

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if !SPOTIFY_HOSTS.contains(&host.as_str()) {
        return Err(ScrapeError::invalid(input, InvalidReason::WrongHost(host)));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    classify_segments(input, &segments)
}

fn classify_uri(input: &str, rest: &str) -> Result<Reference> {
    // URIs occasionally arrive with a query attached when copied from apps.
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = rest.split(':').filter(|s| !s.is_empty()).collect();
    classify_segments(input, &segments)
}

fn classify_segments(input: &str, segments: &[&str]) -> Result<Reference> {
    let mut rest = segments;

    // Locale prefixes (`intl-de`) and embed paths carry no meaning of their own.
    while let Some((first, tail)) = rest.split_first() {
        let lower = first.to_ascii_lowercase();
        if lower.starts_with("intl-") || lower == "embed" || lower == "embed-legacy" {
            rest = tail;
        } else {
            break;
        }
    }

    // Legacy `user/<name>/playlist/<id>` form.
    if let [user, _, tail @ ..] = rest {
        if user.eq_ignore_ascii_case("user") && !tail.is_empty() {
            rest = tail;
        }
    }

    let Some((kind_segment, tail)) = rest.split_first() else {
        return Err(ScrapeError::invalid(input, InvalidReason::MissingId));
    };

    let kind = ContentKind::parse(kind_segment).ok_or_else(|| {
        ScrapeError::invalid(
            input,
            InvalidReason::UnsupportedKind(kind_segment.to_string()),
        )
    })?;

    let id = tail
        .first()
        .ok_or_else(|| ScrapeError::invalid(input, InvalidReason::MissingId))?;

    if !is_valid_id(id) {
        return Err(ScrapeError::invalid(
            input,
            InvalidReason::MalformedId(id.to_string()),
        ));
    }

    Ok(Reference {
        kind,
        canonical_id: id.to_string(),
    })
}

/// Spotify ids are base62; real ones are 22 characters but shorter ids exist
/// in fixtures and older links.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extract the id from a `spotify:<kind>:<id>` URI, if it is one.
pub fn id_from_uri(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("spotify:")?;
    let id = rest.rsplit(':').next()?;
    is_valid_id(id).then_some(id)
}

/// Extract the id from any supported URL or URI, ignoring its kind.
pub fn id_from_link(link: &str) -> Option<String> {
    classify(link).ok().map(|r| r.canonical_id)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
