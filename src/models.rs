use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolver::ContentKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Image {
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// The longer edge, used to place an image in a size class.
    pub fn edge(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Sort images by descending resolution. Equal resolutions keep upstream order.
pub fn sort_by_resolution(images: &mut [Image]) {
    images.sort_by(|a, b| b.pixels().cmp(&a.pixels()));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: String,
}

/// Album data as carried by a track document. Often partial: some pages only
/// give the album name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub id: Option<String>,
    pub name: String,
    pub release_date: Option<String>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub start_ms: Option<u64>,
    pub words: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    pub sync_type: Option<String>,
    pub lines: Vec<LyricLine>,
}

impl Lyrics {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.words.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumSummary>,
    pub duration_ms: u64,
    pub preview_url: Option<String>,
    pub is_explicit: bool,
    pub popularity: Option<u8>,
    pub lyrics: Option<Lyrics>,
}

impl Track {
    pub fn artist_names(&self) -> Vec<&str> {
        self.artists.iter().map(|a| a.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    pub release_date: Option<String>,
    pub total_tracks: u32,
    pub tracks: Vec<Track>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub followers: Option<u64>,
    pub top_tracks: Option<Vec<Track>>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub track: Track,
    pub added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner: Option<Owner>,
    pub description: Option<String>,
    pub tracks: Vec<PlaylistEntry>,
    pub track_count: u32,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Track(Track),
    Album(Album),
    Artist(Artist),
    Playlist(Playlist),
}

impl Entity {
    pub fn kind(&self) -> ContentKind {
        match self {
            Entity::Track(_) => ContentKind::Track,
            Entity::Album(_) => ContentKind::Album,
            Entity::Artist(_) => ContentKind::Artist,
            Entity::Playlist(_) => ContentKind::Playlist,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Track(t) => &t.id,
            Entity::Album(a) => &a.id,
            Entity::Artist(a) => &a.id,
            Entity::Playlist(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Track(t) => &t.name,
            Entity::Album(a) => &a.name,
            Entity::Artist(a) => &a.name,
            Entity::Playlist(p) => &p.name,
        }
    }
}

/// Anything that carries cover art.
pub trait HasImages {
    fn images(&self) -> &[Image];
}

impl HasImages for Track {
    fn images(&self) -> &[Image] {
        self.album.as_ref().map(|a| a.images.as_slice()).unwrap_or(&[])
    }
}

impl HasImages for Album {
    fn images(&self) -> &[Image] {
        &self.images
    }
}

impl HasImages for Artist {
    fn images(&self) -> &[Image] {
        &self.images
    }
}

impl HasImages for Playlist {
    fn images(&self) -> &[Image] {
        &self.images
    }
}

impl HasImages for Entity {
    fn images(&self) -> &[Image] {
        match self {
            Entity::Track(t) => t.images(),
            Entity::Album(a) => a.images(),
            Entity::Artist(a) => a.images(),
            Entity::Playlist(p) => p.images(),
        }
    }
}

#[cfg(test)]
impl Track {
    pub fn mock(name: &str, artist: &str) -> Self {
        Self {
            id: "mockTrack01".to_string(),
            name: name.to_string(),
            artists: vec![ArtistRef {
                id: None,
                name: artist.to_string(),
            }],
            album: Some(AlbumSummary {
                id: None,
                name: "Mock Album".to_string(),
                release_date: Some("2020-01-01".to_string()),
                images: vec![Image::mock(640), Image::mock(300), Image::mock(64)],
            }),
            duration_ms: 180000,
            preview_url: Some("https://p.scdn.co/mp3-preview/mock".to_string()),
            is_explicit: false,
            popularity: Some(50),
            lyrics: None,
        }
    }
}

#[cfg(test)]
impl Image {
    pub fn mock(edge: u32) -> Self {
        Self {
            url: format!("https://i.scdn.co/image/{}", edge),
            width: edge,
            height: edge,
        }
    }
}
