use crate::error::Result;
use crate::extract::RawMapping;
use crate::models::Album;
use crate::normalize::fields::{
    Candidate, Count, FieldSpec, ListCandidate, ListSpec, Sources, Text, artist_refs, images,
};
use crate::normalize::track::tracks_from;
use crate::resolver::ContentKind;

const ID: FieldSpec<Text> = FieldSpec {
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
};

const NAME: FieldSpec<Text> = FieldSpec {
    name: "name",
    primary: &[
        Candidate::at("name", Text::Plain),
        Candidate::at("title", Text::Plain),
    ],
    fallback: &[
        Candidate::at("ld.name", Text::Plain),
        Candidate::at("meta.og:title", Text::Plain),
    ],
};

const ARTISTS: ListSpec = ListSpec {
    name: "artists",
    primary: &[
        ListCandidate::at("artists.items", ""),
        ListCandidate::at("artists", ""),
        ListCandidate::at("subtitle", ""),
    ],
    fallback: &[ListCandidate::at("ld.byArtist", "")],
};

const RELEASE_DATE: FieldSpec<Text> = FieldSpec {
    name: "release_date",
    primary: &[
        Candidate::at("release_date", Text::Date),
        Candidate::at("date.isoString", Text::Date),
        Candidate::at("releaseDate.isoString", Text::Date),
        Candidate::at("date", Text::Date),
    ],
    fallback: &[
        Candidate::at("ld.datePublished", Text::Date),
        Candidate::at("meta.music:release_date", Text::Date),
    ],
};

const TOTAL_TRACKS: FieldSpec<Count> = FieldSpec {
    name: "total_tracks",
    primary: &[
        Candidate::at("total_tracks", Count::Integer),
        Candidate::at("tracks.total", Count::Integer),
        Candidate::at("tracksV2.totalCount", Count::Integer),
        Candidate::at("tracks.totalCount", Count::Integer),
    ],
    fallback: &[
        Candidate::at("ld.numTracks", Count::IntegerText),
        Candidate::at("ld.track.numberOfItems", Count::IntegerText),
    ],
};

const TRACKS: ListSpec = ListSpec {
    name: "tracks",
    primary: &[
        ListCandidate::at("tracks.items", ""),
        ListCandidate::at("tracksV2.items", "track"),
        ListCandidate::at("trackList", ""),
    ],
    fallback: &[
        ListCandidate::at("ld.track.itemListElement", "item"),
        ListCandidate::at("ld.track", ""),
    ],
};

const IMAGES: ListSpec = ListSpec {
    name: "images",
    primary: &[
        ListCandidate::at("images", ""),
        ListCandidate::at("coverArt.sources", ""),
        ListCandidate::at("visualIdentity.image", ""),
    ],
    fallback: &[
        ListCandidate::at("ld.image", ""),
        ListCandidate::at("meta.og:image", ""),
    ],
};

pub fn normalize_album(primary: Option<&RawMapping>, fallback: Option<&RawMapping>) -> Result<Album> {
    let sources = Sources::new(
        ContentKind::Album,
        primary.map(RawMapping::view),
        fallback.map(RawMapping::view),
    );

    let id = sources.required(&ID)?;
    let name = sources.required(&NAME)?;

    let tracks = sources
        .list(&TRACKS)
        .map(|items| tracks_from(&items, ContentKind::Album))
        .unwrap_or_default();

    // A page may list only the first tracks; prefer the declared total.
    let total_tracks = sources
        .optional(&TOTAL_TRACKS)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(tracks.len() as u32);

    Ok(Album {
        id,
        name,
        artists: sources
            .list(&ARTISTS)
            .map(|items| artist_refs(&items))
            .unwrap_or_default(),
        release_date: sources.optional(&RELEASE_DATE),
        total_tracks,
        tracks,
        images: sources
            .list(&IMAGES)
            .map(|items| images(&items))
            .unwrap_or_default(),
    })
}
