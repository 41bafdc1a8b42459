//! Downloads and tagging against a local file server.

use id3::{Tag, TagLike};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spotify_scraper::error::ScrapeError;
use spotify_scraper::media::{self, DownloadAction, OverwritePolicy};
use spotify_scraper::models::{AlbumSummary, ArtistRef, Image};
use spotify_scraper::transport::{HttpTransport, Session};
use spotify_scraper::{Config, Entity, QualityPreference, SpotifyScraper, Track, TransportStrategy};

const AUDIO: &[u8] = &[0xFF, 0xFB, 0x90, 0x64, 0x00, 0x00, 0x00, 0x00, 0x11, 0x22];
const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

fn http() -> HttpTransport {
    let config = Config {
        max_retries: 0,
        ..Config::default()
    };
    HttpTransport::new(&config, &Session::anonymous()).unwrap()
}

async fn serve(server: &MockServer, route: &str, body: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_skip_policy_is_idempotent() {
    let server = MockServer::start().await;
    serve(&server, "/preview.mp3", AUDIO, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("nested").join("song.mp3");
    let url = format!("{}/preview.mp3", server.uri());

    let first = media::download(&http(), &url, &destination, OverwritePolicy::Skip)
        .await
        .unwrap();
    let second = media::download(&http(), &url, &destination, OverwritePolicy::Skip)
        .await
        .unwrap();

    assert_eq!(first.action, DownloadAction::Written);
    assert_eq!(second.action, DownloadAction::SkippedExisting);
    assert_eq!(second.path, destination);
    assert_eq!(std::fs::read(&destination).unwrap(), AUDIO);
    assert!(!dir.path().join("nested").join("song.mp3.part").exists());
}

#[tokio::test]
async fn test_rename_and_overwrite_policies() {
    let server = MockServer::start().await;
    serve(&server, "/cover.jpg", JPEG, 2).await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("cover.jpg");
    std::fs::write(&destination, b"old").unwrap();
    let url = format!("{}/cover.jpg", server.uri());

    let renamed = media::download(&http(), &url, &destination, OverwritePolicy::Rename)
        .await
        .unwrap();
    assert_eq!(renamed.action, DownloadAction::Renamed);
    assert_eq!(renamed.path, dir.path().join("cover (1).jpg"));
    assert_eq!(std::fs::read(&destination).unwrap(), b"old");

    let overwritten = media::download(&http(), &url, &destination, OverwritePolicy::Overwrite)
        .await
        .unwrap();
    assert_eq!(overwritten.action, DownloadAction::Overwritten);
    assert_eq!(std::fs::read(&destination).unwrap(), JPEG);
}

#[tokio::test]
async fn test_failed_fetch_leaves_nothing_behind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("gone.mp3");

    let err = media::download(
        &http(),
        &format!("{}/gone.mp3", server.uri()),
        &destination,
        OverwritePolicy::Skip,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ScrapeError::MediaFailure { .. }));
    assert!(!destination.exists());
}

fn track_served_by(server: &MockServer) -> Track {
    Track {
        id: "7ouMYWpwJ422jRcDASZB7P".to_string(),
        name: "Lights/Out".to_string(),
        artists: vec![ArtistRef {
            id: None,
            name: "Signal".to_string(),
        }],
        album: Some(AlbumSummary {
            id: None,
            name: "Frequencies".to_string(),
            release_date: Some("2018-10-05".to_string()),
            images: vec![
                Image {
                    url: format!("{}/img/large", server.uri()),
                    width: 640,
                    height: 640,
                },
                Image {
                    url: format!("{}/img/medium", server.uri()),
                    width: 300,
                    height: 300,
                },
            ],
        }),
        duration_ms: 210_000,
        preview_url: Some(format!("{}/mp3-preview/lights", server.uri())),
        is_explicit: false,
        popularity: None,
        lyrics: None,
    }
}

fn scraper_into(dir: &std::path::Path, quality: &str) -> SpotifyScraper {
    let config = Config {
        transport: TransportStrategy::Lightweight,
        max_retries: 0,
        pacing_delay: Duration::ZERO,
        output_dir: dir.to_path_buf(),
        quality: quality.parse::<QualityPreference>().unwrap(),
        ..Config::default()
    };
    let session = Session::anonymous();
    let pages = Arc::new(HttpTransport::new(&config, &session).unwrap());
    SpotifyScraper::with_transport(config, session, pages).unwrap()
}

#[tokio::test]
async fn test_preview_is_downloaded_and_tagged() {
    let server = MockServer::start().await;
    serve(&server, "/mp3-preview/lights", AUDIO, 1).await;
    serve(&server, "/img/medium", JPEG, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let scraper = scraper_into(dir.path(), "medium");
    let track = track_served_by(&server);

    let downloaded = scraper.download_preview(&track, true).await.unwrap();
    assert_eq!(downloaded.path, dir.path().join("Signal - Lights_Out.mp3"));

    let tag = Tag::read_from_path(&downloaded.path).unwrap();
    assert_eq!(tag.title(), Some("Lights/Out"));
    assert_eq!(tag.album(), Some("Frequencies"));
    assert_eq!(tag.year(), Some(2018));
    assert_eq!(tag.pictures().next().unwrap().data, JPEG);

    // Second run finds the file and neither downloads nor re-tags it.
    let again = scraper.download_preview(&track, true).await.unwrap();
    assert_eq!(again.action, DownloadAction::SkippedExisting);
}

#[tokio::test]
async fn test_track_without_preview() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut track = track_served_by(&server);
    track.preview_url = None;

    let err = scraper_into(dir.path(), "large")
        .download_preview(&track, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScrapeError::MediaFailure {
            kind: spotify_scraper::error::MediaFailureKind::NoSource,
            ..
        }
    ));
}

#[tokio::test]
async fn test_cover_follows_quality_preference() {
    let server = MockServer::start().await;
    serve(&server, "/img/large", JPEG, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let track = track_served_by(&server);

    let downloaded = scraper_into(dir.path(), "large,medium")
        .download_cover(&Entity::Track(track))
        .await
        .unwrap();

    assert_eq!(downloaded.path, dir.path().join("Lights_Out cover.jpg"));
    assert_eq!(std::fs::read(&downloaded.path).unwrap(), JPEG);
}
