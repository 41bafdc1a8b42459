use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth;
use crate::bulk::{BulkProcessor, BulkReport};
use crate::config::Config;
use crate::error::{ExtractorStage, InvalidReason, MediaFailureKind, Result, ScrapeError};
use crate::extract::{RawMapping, extract_fallback, extract_primary};
use crate::media::{
    self, DownloadAction, Downloaded, resolve_audio_source, resolve_image_source, sanitize_file_name,
};
use crate::models::{Album, Artist, Entity, Playlist, Track};
use crate::normalize::normalize;
use crate::resolver::{ContentKind, Reference, classify};
use crate::transport::{
    BrowserSession, FetchOptions, HttpTransport, Session, Transport, TransportStrategy,
};

/// An entity plus the non-fatal problems met while building it, such as an
/// authenticated-only field that could not be filled.
#[derive(Debug)]
pub struct Extraction<T> {
    pub entity: T,
    pub warnings: Vec<ScrapeError>,
}

/// Raw mappings found for one reference.
#[derive(Debug, Default)]
struct PageData {
    primary: Option<RawMapping>,
    fallback: Option<RawMapping>,
}

/// Entry point: resolves references, fetches pages, extracts and normalizes
/// entities, and downloads media.
pub struct SpotifyScraper {
    config: Config,
    session: Session,
    pages: Arc<dyn Transport>,
    http: HttpTransport,
}

impl SpotifyScraper {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let session = Session::from_config(&config)?;
        let http = HttpTransport::new(&config, &session)?;
        Ok(Self {
            pages: Arc::new(http.clone()),
            http,
            session,
            config,
        })
    }

    /// Use `pages` for page and API fetches instead of the HTTP transport.
    pub fn with_transport(config: Config, session: Session, pages: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let http = HttpTransport::new(&config, &session)?;
        Ok(Self {
            config,
            session,
            pages,
            http,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn get_track(&self, url: &str) -> Result<Track> {
        match self.get_kind(url, ContentKind::Track).await? {
            Entity::Track(track) => Ok(track),
            other => Err(wrong_kind(url, other.kind())),
        }
    }

    /// Track plus lyrics when credentials allow. Missing or refused
    /// credentials leave `lyrics` empty and are reported as a warning.
    pub async fn get_track_with_lyrics(&self, url: &str) -> Result<Extraction<Track>> {
        let mut track = self.get_track(url).await?;
        let mut warnings = Vec::new();

        match auth::fetch_lyrics(self.pages.as_ref(), &self.session, &track.id).await {
            Ok(lyrics) => track.lyrics = lyrics,
            Err(e) => {
                warn!("Lyrics unavailable for {}: {}", track.id, e);
                warnings.push(e);
            }
        }

        Ok(Extraction {
            entity: track,
            warnings,
        })
    }

    pub async fn get_album(&self, url: &str) -> Result<Album> {
        match self.get_kind(url, ContentKind::Album).await? {
            Entity::Album(album) => Ok(album),
            other => Err(wrong_kind(url, other.kind())),
        }
    }

    pub async fn get_artist(&self, url: &str) -> Result<Artist> {
        match self.get_kind(url, ContentKind::Artist).await? {
            Entity::Artist(artist) => Ok(artist),
            other => Err(wrong_kind(url, other.kind())),
        }
    }

    pub async fn get_playlist(&self, url: &str) -> Result<Playlist> {
        match self.get_kind(url, ContentKind::Playlist).await? {
            Entity::Playlist(playlist) => Ok(playlist),
            other => Err(wrong_kind(url, other.kind())),
        }
    }

    /// Whatever kind the reference points at.
    pub async fn get_entity(&self, url: &str) -> Result<Entity> {
        let reference = classify(url)?;
        self.extract(&reference).await
    }

    async fn get_kind(&self, url: &str, kind: ContentKind) -> Result<Entity> {
        let reference = classify(url)?;
        if reference.kind != kind {
            return Err(wrong_kind(url, reference.kind));
        }
        self.extract(&reference).await
    }

    async fn extract(&self, reference: &Reference) -> Result<Entity> {
        info!("Extracting {}", reference);
        let page = self.load(reference).await?;
        let entity = normalize(page.primary.as_ref(), page.fallback.as_ref(), reference.kind)?;
        debug!("Normalized {} '{}'", entity.kind(), entity.name());
        Ok(entity)
    }

    /// Web page first, then the embed page, then (strategy permitting) a
    /// rendered page. Structured metadata is taken from the first page that
    /// has it.
    async fn load(&self, reference: &Reference) -> Result<PageData> {
        if self.config.transport == TransportStrategy::FullSession {
            let content = self.render(&reference.web_url()).await?;
            return Ok(page_data(&content, reference));
        }

        let content = self.fetch_page(&reference.web_url()).await?;
        let mut page = page_data(&content, reference);
        if page.primary.is_some() {
            return Ok(page);
        }

        debug!("No embedded state on web page for {}, trying embed page", reference);
        match self.fetch_page(&reference.embed_url()).await {
            Ok(content) => page.absorb(page_data(&content, reference)),
            Err(e) => warn!("Embed page for {} failed: {}", reference, e),
        }
        if page.primary.is_some() || self.config.transport == TransportStrategy::Lightweight {
            return Ok(page);
        }

        info!("Escalating {} to the full-session transport", reference);
        match self.render(&reference.web_url()).await {
            Ok(content) => page.absorb(page_data(&content, reference)),
            // Still normalizable from whatever the lightweight pages had.
            Err(e) if page.fallback.is_some() => warn!("Rendering {} failed: {}", reference, e),
            Err(e) => return Err(e),
        }
        Ok(page)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        if let Some(body) = self.session.cached_page(url).await {
            debug!("Page cache hit for {}", url);
            return Ok(body);
        }
        let body = self.pages.fetch(url, &FetchOptions::default()).await?;
        self.session.store_page(url, &body).await;
        Ok(body)
    }

    async fn render(&self, url: &str) -> Result<String> {
        BrowserSession::scoped(&self.config, &self.session, |browser| async move {
            browser.fetch(url, &FetchOptions::default()).await
        })
        .await
    }

    /// Download a track's preview clip into the output directory and tag it.
    pub async fn download_preview(&self, track: &Track, with_cover: bool) -> Result<Downloaded> {
        let url = resolve_audio_source(track).ok_or_else(|| {
            ScrapeError::media(
                MediaFailureKind::NoSource,
                format!("track {} has no preview", track.id),
            )
        })?;

        let file_name = sanitize_file_name(&format!(
            "{} - {}",
            track.artist_names().join(", "),
            track.name
        ));
        let destination = self.output_path(format!("{}.mp3", file_name));
        let downloaded = media::download(&self.http, url, &destination, self.config.overwrite).await?;

        if downloaded.action != DownloadAction::SkippedExisting {
            let cover = if with_cover { self.cover_bytes(track).await } else { None };
            media::embed_audio_tags(&downloaded.path, track, cover).await?;
        }
        Ok(downloaded)
    }

    /// Download the best cover image for `entity` per the quality preference.
    pub async fn download_cover(&self, entity: &Entity) -> Result<Downloaded> {
        let url = resolve_image_source(entity, &self.config.quality)?;
        let file_name = sanitize_file_name(&format!("{} cover", entity.name()));
        let destination = self.output_path(format!("{}.jpg", file_name));
        media::download(&self.http, &url, &destination, self.config.overwrite).await
    }

    /// Cover art bytes for tagging. A missing cover only costs the picture
    /// frame, so failures are logged, not returned.
    async fn cover_bytes(&self, track: &Track) -> Option<Vec<u8>> {
        let url = match resolve_image_source(track, &self.config.quality) {
            Ok(url) => url,
            Err(e) => {
                debug!("No cover for {}: {}", track.id, e);
                return None;
            }
        };
        match self.http.fetch_bytes(&url, &FetchOptions::default()).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Cover download for {} failed: {}", track.id, e);
                None
            }
        }
    }

    fn output_path(&self, file_name: String) -> PathBuf {
        self.config.output_dir.join(file_name)
    }

    /// A batch processor configured from this scraper's settings.
    pub fn bulk_processor(&self) -> BulkProcessor {
        BulkProcessor::new(&self.config)
    }

    /// Extract every reference, recording one result per input.
    pub async fn scrape_bulk(&self, processor: &BulkProcessor, urls: Vec<String>) -> BulkReport {
        processor
            .process(urls, |url| async move {
                let entity = self.get_entity(&url).await?;
                serde_json::to_value(&entity).map_err(|e| {
                    ScrapeError::unrecognized(entity.kind(), ExtractorStage::Merged, e.to_string())
                })
            })
            .await
    }
}

impl PageData {
    /// Fill whichever source is still missing from another page.
    fn absorb(&mut self, other: PageData) {
        if self.primary.is_none() {
            self.primary = other.primary;
        }
        if self.fallback.is_none() {
            self.fallback = other.fallback;
        }
    }
}

fn page_data(content: &str, reference: &Reference) -> PageData {
    PageData {
        primary: extract_primary(content, reference),
        fallback: extract_fallback(content, reference.kind),
    }
}

fn wrong_kind(url: &str, found: ContentKind) -> ScrapeError {
    ScrapeError::invalid(
        url,
        InvalidReason::UnsupportedKind(found.to_string()),
    )
}

impl<T: Serialize> Serialize for Extraction<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let warnings: Vec<String> = self.warnings.iter().map(ToString::to_string).collect();
        let mut state = serializer.serialize_struct("Extraction", 2)?;
        state.serialize_field("entity", &self.entity)?;
        state.serialize_field("warnings", &warnings)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TransportFailureKind};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies by URL and records requests.
    struct StubTransport {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| {
                ScrapeError::transport(url, TransportFailureKind::HttpStatus(404), "not found")
            })
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn lightweight() -> Config {
        Config {
            transport: TransportStrategy::Lightweight,
            max_retries: 0,
            ..Config::default()
        }
    }

    fn scraper(stub: Arc<StubTransport>) -> SpotifyScraper {
        SpotifyScraper::with_transport(lightweight(), Session::anonymous(), stub).unwrap()
    }

    const TRACK_PAGE: &str = r#"<html><head>
        <meta property="og:title" content="Fallback Title"/>
        <script type="application/ld+json">{"@type":"MusicRecording","name":"Fallback Title",
            "inAlbum":{"@type":"MusicAlbum","name":"Some Album","datePublished":"2021-05-07"}}</script>
        <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"state":{"data":{"entity":
            {"type":"track","id":"abc123XYZ","name":"Primary Title","album":{"name":"Some Album"},
             "artists":[{"name":"Band"}],"duration_ms":1000}}}}}}</script>
    </head><body></body></html>"#;

    #[tokio::test]
    async fn test_track_scenario() {
        let stub = StubTransport::new(&[("https://open.spotify.com/track/abc123XYZ", TRACK_PAGE)]);
        let scraper = scraper(stub.clone());

        let track = scraper
            .get_track("https://open.spotify.com/track/abc123XYZ?si=foo")
            .await
            .unwrap();

        assert_eq!(track.id, "abc123XYZ");
        assert_eq!(track.name, "Primary Title");
        assert_eq!(
            track.album.unwrap().release_date.as_deref(),
            Some("2021-05-07")
        );
        assert_eq!(stub.requested(), vec!["https://open.spotify.com/track/abc123XYZ"]);
    }

    #[tokio::test]
    async fn test_embed_page_used_when_web_page_has_no_state() {
        let web = r#"<html><head><meta property="og:title" content="From Meta"/></head></html>"#;
        let embed = r#"<script id="__NEXT_DATA__">{"props":{"pageProps":{"state":{"data":{"entity":
            {"type":"album","uri":"spotify:album:alb1","name":"Embed Name"}}}}}}</script>"#;
        let stub = StubTransport::new(&[
            ("https://open.spotify.com/album/alb1", web),
            ("https://open.spotify.com/embed/album/alb1", embed),
        ]);

        let album = scraper(stub.clone())
            .get_album("spotify:album:alb1")
            .await
            .unwrap();

        assert_eq!(album.name, "Embed Name");
        assert_eq!(stub.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_pages_are_cached_per_session() {
        let stub = StubTransport::new(&[("https://open.spotify.com/track/abc123XYZ", TRACK_PAGE)]);
        let scraper = scraper(stub.clone());

        scraper.get_track("spotify:track:abc123XYZ").await.unwrap();
        scraper.get_track("https://open.spotify.com/track/abc123XYZ").await.unwrap();

        assert_eq!(stub.requested().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_kind_is_invalid_reference() {
        let stub = StubTransport::new(&[]);
        let err = scraper(stub.clone())
            .get_album("https://open.spotify.com/track/abc123XYZ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert!(stub.requested().is_empty());
    }

    #[tokio::test]
    async fn test_lyrics_without_credentials_degrade() {
        let stub = StubTransport::new(&[("https://open.spotify.com/track/abc123XYZ", TRACK_PAGE)]);
        let extraction = scraper(stub)
            .get_track_with_lyrics("spotify:track:abc123XYZ")
            .await
            .unwrap();

        assert!(extraction.entity.lyrics.is_none());
        assert_eq!(extraction.warnings.len(), 1);
        assert_eq!(extraction.warnings[0].kind(), ErrorKind::AuthenticationRequired);
    }

    #[tokio::test]
    async fn test_unrecognized_page() {
        let stub = StubTransport::new(&[
            ("https://open.spotify.com/playlist/pl1", "<html><body>nothing</body></html>"),
            ("https://open.spotify.com/embed/playlist/pl1", "<html></html>"),
        ]);
        let err = scraper(stub)
            .get_playlist("https://open.spotify.com/playlist/pl1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExtractionFailure);
    }

    #[tokio::test]
    async fn test_bulk_records_every_reference() {
        let stub = StubTransport::new(&[("https://open.spotify.com/track/abc123XYZ", TRACK_PAGE)]);
        let scraper = SpotifyScraper::with_transport(
            Config {
                pacing_delay: std::time::Duration::ZERO,
                ..lightweight()
            },
            Session::anonymous(),
            stub,
        )
        .unwrap();

        let processor = scraper.bulk_processor();
        let report = scraper
            .scrape_bulk(
                &processor,
                vec![
                    "spotify:track:abc123XYZ".to_string(),
                    "https://example.com/track/abc".to_string(),
                    "https://open.spotify.com/track/missing".to_string(),
                ],
            )
            .await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 1);
        let invalid = report.entry("https://example.com/track/abc").unwrap();
        assert_eq!(invalid.error_kind, Some(ErrorKind::InvalidReference));
        let ok = report.entry("spotify:track:abc123XYZ").unwrap();
        assert_eq!(ok.data.as_ref().unwrap()["name"], "Primary Title");
    }
}
