use tracing::warn;

use crate::error::Result;
use crate::extract::RawMapping;
use crate::models::{AlbumSummary, Track};
use crate::normalize::fields::{
    Candidate, Count, FieldSpec, Flag, ListCandidate, ListItem, ListSpec, Sources, Text,
    artist_refs, images,
};
use crate::resolver::ContentKind;

/// Paths for every track field. Track pages and track entries nested in
/// album, artist and playlist documents use different tables.
pub(crate) struct TrackFields {
    pub id: FieldSpec<Text>,
    pub name: FieldSpec<Text>,
    pub artists: ListSpec,
    pub album_id: FieldSpec<Text>,
    pub album_name: FieldSpec<Text>,
    pub album_release_date: FieldSpec<Text>,
    pub album_images: ListSpec,
    pub duration_ms: FieldSpec<Count>,
    pub preview_url: FieldSpec<Text>,
    pub is_explicit: FieldSpec<Flag>,
    pub popularity: FieldSpec<Count>,
}

pub(crate) static TRACK_PAGE: TrackFields = TrackFields {
    id: FieldSpec {
        name: "id",
        primary: &[
            Candidate::at("id", Text::Id),
            Candidate::at("uri", Text::IdFromUri),
        ],
        fallback: &[
            Candidate::at("ld.@id", Text::IdFromLink),
            Candidate::at("ld.url", Text::IdFromLink),
            Candidate::at("meta.og:url", Text::IdFromLink),
        ],
    },
    name: FieldSpec {
        name: "name",
        primary: &[
            Candidate::at("name", Text::Plain),
            Candidate::at("title", Text::Plain),
        ],
        fallback: &[
            Candidate::at("ld.name", Text::Plain),
            Candidate::at("meta.og:title", Text::Plain),
        ],
    },
    artists: ListSpec {
        name: "artists",
        primary: &[
            ListCandidate::at("artists.items", ""),
            ListCandidate::at("artists", ""),
            ListCandidate::at("firstArtist.items", ""),
            ListCandidate::at("subtitle", ""),
        ],
        fallback: &[ListCandidate::at("ld.byArtist", "")],
    },
    album_id: FieldSpec {
        name: "album.id",
        primary: &[
            Candidate::at("album.id", Text::Id),
            Candidate::at("album.uri", Text::IdFromUri),
            Candidate::at("albumOfTrack.uri", Text::IdFromUri),
        ],
        fallback: &[
            Candidate::at("ld.inAlbum.@id", Text::IdFromLink),
            Candidate::at("ld.inAlbum.url", Text::IdFromLink),
            Candidate::at("meta.music:album", Text::IdFromLink),
        ],
    },
    album_name: FieldSpec {
        name: "album.name",
        primary: &[
            Candidate::at("album.name", Text::Plain),
            Candidate::at("albumOfTrack.name", Text::Plain),
        ],
        fallback: &[Candidate::at("ld.inAlbum.name", Text::Plain)],
    },
    album_release_date: FieldSpec {
        name: "album.release_date",
        primary: &[
            Candidate::at("album.release_date", Text::Date),
            Candidate::at("albumOfTrack.date.isoString", Text::Date),
            Candidate::at("releaseDate.isoString", Text::Date),
        ],
        fallback: &[
            Candidate::at("ld.inAlbum.datePublished", Text::Date),
            Candidate::at("ld.datePublished", Text::Date),
            Candidate::at("meta.music:release_date", Text::Date),
        ],
    },
    album_images: ListSpec {
        name: "album.images",
        primary: &[
            ListCandidate::at("album.images", ""),
            ListCandidate::at("albumOfTrack.coverArt.sources", ""),
            ListCandidate::at("coverArt.sources", ""),
            ListCandidate::at("visualIdentity.image", ""),
        ],
        fallback: &[
            ListCandidate::at("ld.inAlbum.image", ""),
            ListCandidate::at("ld.image", ""),
            ListCandidate::at("meta.og:image", ""),
        ],
    },
    duration_ms: FieldSpec {
        name: "duration_ms",
        primary: &[
            Candidate::at("duration_ms", Count::Integer),
            Candidate::at("duration.totalMilliseconds", Count::Integer),
            Candidate::at("duration", Count::Integer),
        ],
        fallback: &[
            Candidate::at("ld.duration", Count::IsoDuration),
            Candidate::at("meta.music:duration", Count::SecondsText),
        ],
    },
    preview_url: FieldSpec {
        name: "preview_url",
        primary: &[
            Candidate::at("preview_url", Text::Url),
            Candidate::at("audioPreview.url", Text::Url),
            Candidate::at("previews.audioPreviews.items.0.url", Text::Url),
        ],
        fallback: &[Candidate::at("meta.og:audio", Text::Url)],
    },
    is_explicit: FieldSpec {
        name: "is_explicit",
        primary: &[
            Candidate::at("explicit", Flag::Bool),
            Candidate::at("isExplicit", Flag::Bool),
            Candidate::at("contentRating.label", Flag::ExplicitLabel),
        ],
        fallback: &[],
    },
    popularity: FieldSpec {
        name: "popularity",
        primary: &[Candidate::at("popularity", Count::Percent)],
        fallback: &[],
    },
};

/// Track entries inside other documents. Entries come from either the
/// application state or a JSON-LD `MusicRecording`, so both shapes are
/// listed and there is no second source.
pub(crate) static TRACK_ITEM: TrackFields = TrackFields {
    id: FieldSpec {
        name: "id",
        primary: &[
            Candidate::at("id", Text::Id),
            Candidate::at("uri", Text::IdFromUri),
            Candidate::at("@id", Text::IdFromLink),
            Candidate::at("url", Text::IdFromLink),
        ],
        fallback: &[],
    },
    name: FieldSpec {
        name: "name",
        primary: &[
            Candidate::at("name", Text::Plain),
            Candidate::at("title", Text::Plain),
        ],
        fallback: &[],
    },
    artists: ListSpec {
        name: "artists",
        primary: &[
            ListCandidate::at("artists.items", ""),
            ListCandidate::at("artists", ""),
            ListCandidate::at("byArtist", ""),
            ListCandidate::at("subtitle", ""),
        ],
        fallback: &[],
    },
    album_id: FieldSpec {
        name: "album.id",
        primary: &[
            Candidate::at("album.id", Text::Id),
            Candidate::at("album.uri", Text::IdFromUri),
            Candidate::at("albumOfTrack.uri", Text::IdFromUri),
        ],
        fallback: &[],
    },
    album_name: FieldSpec {
        name: "album.name",
        primary: &[
            Candidate::at("album.name", Text::Plain),
            Candidate::at("albumOfTrack.name", Text::Plain),
            Candidate::at("inAlbum.name", Text::Plain),
        ],
        fallback: &[],
    },
    album_release_date: FieldSpec {
        name: "album.release_date",
        primary: &[
            Candidate::at("album.release_date", Text::Date),
            Candidate::at("albumOfTrack.date.isoString", Text::Date),
        ],
        fallback: &[],
    },
    album_images: ListSpec {
        name: "album.images",
        primary: &[
            ListCandidate::at("album.images", ""),
            ListCandidate::at("albumOfTrack.coverArt.sources", ""),
        ],
        fallback: &[],
    },
    duration_ms: FieldSpec {
        name: "duration_ms",
        primary: &[
            Candidate::at("duration_ms", Count::Integer),
            Candidate::at("duration.totalMilliseconds", Count::Integer),
            Candidate::at("trackDuration.totalMilliseconds", Count::Integer),
            Candidate::at("duration", Count::Integer),
            Candidate::at("duration", Count::IsoDuration),
        ],
        fallback: &[],
    },
    preview_url: FieldSpec {
        name: "preview_url",
        primary: &[
            Candidate::at("preview_url", Text::Url),
            Candidate::at("audioPreview.url", Text::Url),
        ],
        fallback: &[],
    },
    is_explicit: FieldSpec {
        name: "is_explicit",
        primary: &[
            Candidate::at("explicit", Flag::Bool),
            Candidate::at("isExplicit", Flag::Bool),
            Candidate::at("contentRating.label", Flag::ExplicitLabel),
        ],
        fallback: &[],
    },
    popularity: FieldSpec {
        name: "popularity",
        primary: &[Candidate::at("popularity", Count::Percent)],
        fallback: &[],
    },
};

/// Normalize a track page. Fails when neither source yields an id or a name.
pub fn normalize_track(primary: Option<&RawMapping>, fallback: Option<&RawMapping>) -> Result<Track> {
    let sources = Sources::new(
        ContentKind::Track,
        primary.map(RawMapping::view),
        fallback.map(RawMapping::view),
    );
    build_track(&sources, &TRACK_PAGE)
}

pub(crate) fn build_track(sources: &Sources<'_>, fields: &TrackFields) -> Result<Track> {
    let id = sources.required(&fields.id)?;
    let name = sources.required(&fields.name)?;

    let artists = sources
        .list(&fields.artists)
        .map(|items| artist_refs(&items))
        .unwrap_or_default();

    // Some track documents only carry the album name; no name, no album.
    let album = sources.optional(&fields.album_name).map(|album_name| AlbumSummary {
        id: sources.optional(&fields.album_id),
        name: album_name,
        release_date: sources.optional(&fields.album_release_date),
        images: sources
            .list(&fields.album_images)
            .map(|items| images(&items))
            .unwrap_or_default(),
    });

    Ok(Track {
        id,
        name,
        artists,
        album,
        duration_ms: sources.optional(&fields.duration_ms).unwrap_or(0),
        preview_url: sources.optional(&fields.preview_url),
        is_explicit: sources.optional(&fields.is_explicit).unwrap_or(false),
        popularity: sources
            .optional(&fields.popularity)
            .and_then(|p| u8::try_from(p).ok()),
        lyrics: None,
    })
}

/// Nested track entries in upstream order. Entries without an id or a name
/// are dropped with a warning rather than failing the parent document.
pub(crate) fn tracks_from(items: &[ListItem<'_>], parent: ContentKind) -> Vec<Track> {
    items
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let sources = Sources::single(ContentKind::Track, entry.item);
            match build_track(&sources, &TRACK_ITEM) {
                Ok(track) => Some(track),
                Err(e) => {
                    warn!("Skipping {} entry {}: {}", parent, position, e);
                    None
                }
            }
        })
        .collect()
}
