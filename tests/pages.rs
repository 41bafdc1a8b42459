//! Extraction and normalization against saved pages.

use spotify_scraper::extract::{extract_fallback, extract_primary};
use spotify_scraper::normalize::normalize;
use spotify_scraper::{ContentKind, Entity, classify};

const ALBUM_PAGE: &str = include_str!("fixtures/album.html");
const ARTIST_PAGE: &str = include_str!("fixtures/artist.html");
const PLAYLIST_PAGE: &str = include_str!("fixtures/playlist.html");

fn entity_from(page: &str, reference: &str) -> Entity {
    let reference = classify(reference).unwrap();
    let primary = extract_primary(page, &reference);
    let fallback = extract_fallback(page, reference.kind);
    normalize(primary.as_ref(), fallback.as_ref(), reference.kind).unwrap()
}

#[test]
fn test_album_page() {
    let Entity::Album(album) = entity_from(
        ALBUM_PAGE,
        "https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy?si=abc",
    ) else {
        panic!("expected an album");
    };

    assert_eq!(album.id, "4aawyAB9vmqN3uQ7FjRGTy");
    assert_eq!(album.name, "Night Drives");
    assert_eq!(album.artists.len(), 1);
    assert_eq!(album.artists[0].id.as_deref(), Some("1lanterns0000000000000"));
    // Only in the structured data.
    assert_eq!(album.release_date.as_deref(), Some("2019-03-08"));
    assert_eq!(album.total_tracks, 12);

    let widths: Vec<u32> = album.images.iter().map(|i| i.width).collect();
    assert_eq!(widths, vec![640, 300, 64]);

    // The third entry has neither id nor name.
    assert_eq!(album.tracks.len(), 2);
    let overpass = &album.tracks[1];
    assert_eq!(overpass.id, "0tracktwo00000000000002");
    assert_eq!(overpass.artist_names(), vec!["The Lanterns", "June Ray"]);
    assert!(overpass.is_explicit);
    assert!(overpass.preview_url.is_none());
    assert_eq!(
        album.tracks[0].preview_url.as_deref(),
        Some("https://p.scdn.co/mp3-preview/headlights")
    );
}

#[test]
fn test_artist_page_from_encoded_resource() {
    let Entity::Artist(artist) = entity_from(ARTIST_PAGE, "spotify:artist:0OdUWJ0sBjDrqHygGUXeCF")
    else {
        panic!("expected an artist");
    };

    assert_eq!(artist.name, "Band of Horses");
    assert_eq!(artist.genres, vec!["indie folk", "indie rock"]);
    assert_eq!(artist.followers, Some(1_510_234));
    assert_eq!(artist.images[0].width, 640);

    let top = artist.top_tracks.expect("top tracks");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].name, "The Funeral");
    assert_eq!(top[0].duration_ms, 322_000);
    assert!(!top[0].is_explicit);
    let album = top[0].album.as_ref().unwrap();
    assert_eq!(album.id.as_deref(), Some("5zCW2oBpBLJUWQmwE9t6Zz"));
    assert_eq!(album.images.len(), 1);
}

#[test]
fn test_playlist_page_without_application_state() {
    let reference = classify("https://open.spotify.com/playlist/37i9dQZF1DXa1rZf8gLhyz").unwrap();
    assert!(extract_primary(PLAYLIST_PAGE, &reference).is_none());

    let Entity::Playlist(playlist) = entity_from(
        PLAYLIST_PAGE,
        "https://open.spotify.com/playlist/37i9dQZF1DXa1rZf8gLhyz",
    ) else {
        panic!("expected a playlist");
    };

    assert_eq!(playlist.id, "37i9dQZF1DXa1rZf8gLhyz");
    assert_eq!(playlist.name, "Morning Coffee");
    assert_eq!(playlist.owner.as_ref().unwrap().display_name, "Spotify");
    assert_eq!(playlist.description.as_deref(), Some("Slow songs for slow mornings."));
    assert_eq!(playlist.track_count, 2);
    assert_eq!(playlist.images.len(), 1);
    assert_eq!(playlist.images[0].width, 0);

    let steam = &playlist.tracks[0].track;
    assert_eq!(steam.id, "1steam000000000000000a");
    assert_eq!(steam.duration_ms, 192_000);
    assert_eq!(playlist.tracks[1].track.artist_names(), vec!["Crumbs", "Butter"]);
    assert!(playlist.tracks.iter().all(|e| e.added_at.is_none()));
}

#[test]
fn test_page_of_another_kind_has_no_primary_state() {
    let reference = classify("spotify:track:4aawyAB9vmqN3uQ7FjRGTy").unwrap();
    assert_eq!(reference.kind, ContentKind::Track);
    assert!(extract_primary(ALBUM_PAGE, &reference).is_none());
}

#[test]
fn test_unrelated_linked_data_leaves_meta_title() {
    let page = r#"<html><head>
        <meta property="og:title" content="Harbour Lights"/>
        <meta property="og:url" content="https://open.spotify.com/track/3harbour00000000000000"/>
        <script type="application/ld+json">{"@type":"Organization","name":"Spotify","url":"https://www.spotify.com"}</script>
        </head><body></body></html>"#;

    let Entity::Track(track) = entity_from(page, "spotify:track:3harbour00000000000000") else {
        panic!("expected a track");
    };

    assert_eq!(track.name, "Harbour Lights");
    assert_eq!(track.id, "3harbour00000000000000");
}
