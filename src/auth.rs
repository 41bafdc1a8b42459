//! Authentication material and the fields that need it.
//!
//! Credentials come from an `sp_dc` cookie value, a Netscape cookie file
//! exported from a browser, or a ready bearer token. They are only used for
//! authenticated-only fields (lyrics); every other field is scraped
//! anonymously.

use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ExtractorStage, Result, ScrapeError, TransportFailureKind};
use crate::models::{LyricLine, Lyrics};
use crate::resolver::ContentKind;
use crate::transport::{FetchOptions, Session, Transport};

pub const TOKEN_URL: &str =
    "https://open.spotify.com/get_access_token?reason=transport&productType=web_player";
pub const LYRICS_URL: &str = "https://spclient.wg.spotify.com/color-lyrics/v2/track";

pub const SESSION_COOKIE: &str = "sp_dc";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub sp_dc: Option<String>,
    pub access_token: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.sp_dc.is_none() && self.access_token.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieLine {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub name: String,
    pub value: String,
}

impl CookieLine {
    /// `Set-Cookie` style string for a cookie jar.
    pub fn to_set_cookie(&self) -> String {
        let mut s = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            s.push_str("; Secure");
        }
        s
    }

    /// URL the cookie applies to, used as the jar's origin.
    pub fn origin(&self) -> String {
        format!("https://{}{}", self.domain.trim_start_matches('.'), self.path)
    }
}

/// Parse a Netscape/Mozilla `cookies.txt` export. Malformed lines are skipped.
pub fn parse_netscape_cookies(content: &str) -> Vec<CookieLine> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 7 {
                debug!("Skipping malformed cookie line");
                return None;
            }
            Some(CookieLine {
                domain: fields[0].to_string(),
                path: fields[2].to_string(),
                secure: fields[3].eq_ignore_ascii_case("TRUE"),
                name: fields[5].to_string(),
                value: fields[6].to_string(),
            })
        })
        .collect()
}

pub fn load_cookie_file(path: &Path) -> Result<Vec<CookieLine>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScrapeError::Config(format!("Cannot read cookie file {}: {}", path.display(), e))
    })?;
    let cookies = parse_netscape_cookies(&content);
    info!("Loaded {} cookies from {}", cookies.len(), path.display());
    Ok(cookies)
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at_ms: Option<i64>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        match self.expires_at_ms {
            Some(at) => Utc::now().timestamp_millis() >= at,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "accessTokenExpirationTimestampMs")]
    expires_at_ms: Option<i64>,
    #[serde(rename = "isAnonymous", default)]
    is_anonymous: bool,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lyrics: LyricsBody,
}

#[derive(Debug, Deserialize)]
struct LyricsBody {
    #[serde(rename = "syncType")]
    sync_type: Option<String>,
    #[serde(default)]
    lines: Vec<LyricsLineBody>,
}

#[derive(Debug, Deserialize)]
struct LyricsLineBody {
    #[serde(rename = "startTimeMs")]
    start_time_ms: Option<String>,
    #[serde(default)]
    words: String,
}

fn auth_required(field: &'static str, detail: impl Into<String>) -> ScrapeError {
    ScrapeError::AuthenticationRequired {
        field,
        detail: detail.into(),
    }
}

/// Obtain a web-player bearer token, reusing the session's cached one while
/// it is valid.
pub async fn access_token(transport: &dyn Transport, session: &Session) -> Result<String> {
    let credentials = session.credentials();
    if let Some(token) = &credentials.access_token {
        return Ok(token.clone());
    }
    if credentials.sp_dc.is_none() {
        return Err(auth_required(
            "lyrics",
            "no sp_dc cookie or access token configured",
        ));
    }

    if let Some(token) = session.cached_token().await {
        return Ok(token.value);
    }

    let body = transport.fetch(TOKEN_URL, &FetchOptions::default()).await?;
    let response: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| auth_required("lyrics", format!("unexpected token response: {}", e)))?;

    if response.is_anonymous {
        return Err(auth_required(
            "lyrics",
            "session cookie was rejected (anonymous token issued)",
        ));
    }

    debug!("Obtained web-player access token");
    let token = AccessToken {
        value: response.access_token,
        expires_at_ms: response.expires_at_ms,
    };
    session.store_token(token.clone()).await;
    Ok(token.value)
}

/// Fetch lyrics for a track. `Ok(None)` means the track has no lyrics.
pub async fn fetch_lyrics(
    transport: &dyn Transport,
    session: &Session,
    track_id: &str,
) -> Result<Option<Lyrics>> {
    let token = access_token(transport, session).await?;
    let url = format!(
        "{}/{}?format=json&market=from_token",
        LYRICS_URL, track_id
    );
    let options = FetchOptions::with_bearer(token).header("app-platform", "WebPlayer");

    let body = match transport.fetch(&url, &options).await {
        Ok(body) => body,
        Err(ScrapeError::TransportFailure {
            kind: TransportFailureKind::HttpStatus(404),
            ..
        }) => return Ok(None),
        Err(ScrapeError::TransportFailure {
            kind: TransportFailureKind::HttpStatus(401),
            ..
        }) => return Err(auth_required("lyrics", "access token was refused")),
        Err(e) => return Err(e),
    };

    parse_lyrics(&body).map(Some)
}

pub fn parse_lyrics(body: &str) -> Result<Lyrics> {
    let response: LyricsResponse = serde_json::from_str(body).map_err(|e| {
        ScrapeError::unrecognized(
            ContentKind::Track,
            ExtractorStage::Primary,
            format!("bad lyrics document: {}", e),
        )
    })?;

    Ok(Lyrics {
        sync_type: response.lyrics.sync_type,
        lines: response
            .lyrics
            .lines
            .into_iter()
            .map(|l| LyricLine {
                start_ms: l.start_time_ms.and_then(|s| s.parse().ok()),
                words: l.words,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_netscape_cookies() {
        let content = "# Netscape HTTP Cookie File\n\
            .spotify.com\tTRUE\t/\tTRUE\t1999999999\tsp_dc\tsecretvalue\n\
            #HttpOnly_.spotify.com\tTRUE\t/\tTRUE\t1999999999\tsp_key\tkey\n\
            broken line\n\
            \n";
        let cookies = parse_netscape_cookies(content);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "sp_dc");
        assert_eq!(cookies[0].value, "secretvalue");
        assert!(cookies[0].secure);
        assert_eq!(cookies[1].name, "sp_key");
        assert_eq!(cookies[0].origin(), "https://spotify.com/");
        assert_eq!(
            cookies[0].to_set_cookie(),
            "sp_dc=secretvalue; Domain=.spotify.com; Path=/; Secure"
        );
    }

    #[test]
    fn test_parse_lyrics_document() {
        let body = r#"{"lyrics":{"syncType":"LINE_SYNCED","lines":[
            {"startTimeMs":"960","words":"Hello","syllables":[]},
            {"startTimeMs":"4120","words":"again"}
        ]},"colors":{}}"#;
        let lyrics = parse_lyrics(body).unwrap();
        assert_eq!(lyrics.sync_type.as_deref(), Some("LINE_SYNCED"));
        assert_eq!(lyrics.lines[1].start_ms, Some(4120));
        assert_eq!(lyrics.text(), "Hello\nagain");
    }

    #[test]
    fn test_malformed_lyrics_is_extraction_failure() {
        let err = parse_lyrics(r#"{"lyrics":{"lines":"not a list"}}"#).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExtractionFailure);
        assert!(!err.is_retryable());

        let err = parse_lyrics("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, ScrapeError::ExtractionFailure { .. }));
    }

    #[test]
    fn test_token_expiry() {
        let expired = AccessToken {
            value: "t".into(),
            expires_at_ms: Some(0),
        };
        let open_ended = AccessToken {
            value: "t".into(),
            expires_at_ms: None,
        };
        assert!(expired.is_expired());
        assert!(!open_ended.is_expired());
    }
}
