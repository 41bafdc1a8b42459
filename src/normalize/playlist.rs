use tracing::warn;

use crate::error::Result;
use crate::extract::RawMapping;
use crate::models::{Owner, Playlist, PlaylistEntry};
use crate::normalize::fields::{
    Candidate, Count, FieldSpec, ListCandidate, ListItem, ListSpec, Sources, Text, Timestamp,
    images, pick,
};
use crate::normalize::track::{TRACK_ITEM, build_track};
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

const OWNER_NAME: FieldSpec<Text> = FieldSpec {
    name: "owner.display_name",
    primary: &[
        Candidate::at("owner.display_name", Text::Plain),
        Candidate::at("owner.name", Text::Plain),
        Candidate::at("ownerV2.data.name", Text::Plain),
        Candidate::at("subtitle", Text::Plain),
    ],
    fallback: &[Candidate::at("ld.author.name", Text::Plain)],
};

// User ids are not base62, so they are kept as plain text.
const OWNER_ID: FieldSpec<Text> = FieldSpec {
    name: "owner.id",
    primary: &[
        Candidate::at("owner.id", Text::Plain),
        Candidate::at("ownerV2.data.username", Text::Plain),
    ],
    fallback: &[],
};

const DESCRIPTION: FieldSpec<Text> = FieldSpec {
    name: "description",
    primary: &[Candidate::at("description", Text::Plain)],
    fallback: &[
        Candidate::at("ld.description", Text::Plain),
        Candidate::at("meta.og:description", Text::Plain),
    ],
};

const TRACK_COUNT: FieldSpec<Count> = FieldSpec {
    name: "track_count",
    primary: &[
        Candidate::at("tracks.total", Count::Integer),
        Candidate::at("content.totalCount", Count::Integer),
        Candidate::at("trackCount", Count::Integer),
    ],
    fallback: &[
        Candidate::at("ld.numTracks", Count::IntegerText),
        Candidate::at("ld.track.numberOfItems", Count::IntegerText),
        Candidate::at("meta.music:song_count", Count::IntegerText),
    ],
};

const ENTRIES: ListSpec = ListSpec {
    name: "tracks",
    primary: &[
        ListCandidate::at("tracks.items", "track"),
        ListCandidate::at("content.items", "itemV2.data"),
        ListCandidate::at("trackList", ""),
    ],
    fallback: &[
        ListCandidate::at("ld.track.itemListElement", "item"),
        ListCandidate::at("ld.track", ""),
    ],
};

/// Relative to each list element, not to the track inside it.
const ADDED_AT: &[Candidate<Timestamp>] = &[
    Candidate::at("added_at", Timestamp),
    Candidate::at("addedAt.isoString", Timestamp),
];

const IMAGES: ListSpec = ListSpec {
    name: "images",
    primary: &[
        ListCandidate::at("images.items.0.sources", ""),
        ListCandidate::at("images", ""),
        ListCandidate::at("coverArt.sources", ""),
        ListCandidate::at("visualIdentity.image", ""),
    ],
    fallback: &[
        ListCandidate::at("ld.image", ""),
        ListCandidate::at("meta.og:image", ""),
    ],
};

pub fn normalize_playlist(
    primary: Option<&RawMapping>,
    fallback: Option<&RawMapping>,
) -> Result<Playlist> {
    let sources = Sources::new(
        ContentKind::Playlist,
        primary.map(RawMapping::view),
        fallback.map(RawMapping::view),
    );

    let id = sources.required(&ID)?;
    let name = sources.required(&NAME)?;

    let owner = sources.optional(&OWNER_NAME).map(|display_name| Owner {
        id: sources.optional(&OWNER_ID),
        display_name,
    });

    let tracks = sources
        .list(&ENTRIES)
        .map(|items| entries(&items))
        .unwrap_or_default();

    let track_count = sources
        .optional(&TRACK_COUNT)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(tracks.len() as u32);

    Ok(Playlist {
        id,
        name,
        owner,
        description: sources.optional(&DESCRIPTION),
        tracks,
        track_count,
        images: sources
            .list(&IMAGES)
            .map(|items| images(&items))
            .unwrap_or_default(),
    })
}

fn entries(items: &[ListItem<'_>]) -> Vec<PlaylistEntry> {
    items
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let sources = Sources::single(ContentKind::Track, entry.item);
            match build_track(&sources, &TRACK_ITEM) {
                Ok(track) => Some(PlaylistEntry {
                    track,
                    added_at: pick(&entry.wrapper, ADDED_AT),
                }),
                Err(e) => {
                    // Local files and removed tracks have no id.
                    warn!("Skipping playlist entry {}: {}", position, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionReason, ScrapeError};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_web_api_shape_playlist() {
        let primary = RawMapping::new(json!({
            "type": "playlist",
            "id": "pl1",
            "name": "Road Trip",
            "description": "Songs for driving",
            "owner": {"id": "some.user", "display_name": "Some User"},
            "tracks": {"total": 3, "items": [
                {"added_at": "2023-04-01T12:00:00Z", "track": {"id": "t1", "name": "First", "duration_ms": 1000}},
                {"added_at": "2023-04-02T12:00:00Z", "track": null},
                {"added_at": "not a date", "track": {"id": "t3", "name": "Third"}}
            ]}
        }));
        let playlist = normalize_playlist(Some(&primary), None).unwrap();

        let owner = playlist.owner.unwrap();
        assert_eq!(owner.id.as_deref(), Some("some.user"));
        assert_eq!(owner.display_name, "Some User");
        assert_eq!(playlist.track_count, 3);
        assert_eq!(playlist.tracks.len(), 2);
        assert_eq!(
            playlist.tracks[0].added_at,
            Some(Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(playlist.tracks[1].track.name, "Third");
        assert_eq!(playlist.tracks[1].added_at, None);
    }

    #[test]
    fn test_graphql_playlist_preserves_order() {
        let primary = RawMapping::new(json!({
            "__typename": "Playlist",
            "uri": "spotify:playlist:gqlPl",
            "name": "Mix",
            "ownerV2": {"data": {"name": "Curator", "username": "curator"}},
            "content": {"totalCount": 3, "items": [
                {"addedAt": {"isoString": "2022-01-01T00:00:00Z"},
                 "itemV2": {"data": {"uri": "spotify:track:c", "name": "C"}}},
                {"addedAt": {"isoString": "2022-01-02T00:00:00Z"},
                 "itemV2": {"data": {"uri": "spotify:track:a", "name": "A"}}},
                {"addedAt": {"isoString": "2022-01-03T00:00:00Z"},
                 "itemV2": {"data": {"uri": "spotify:track:b", "name": "B"}}}
            ]}
        }));
        let playlist = normalize_playlist(Some(&primary), None).unwrap();

        let names: Vec<_> = playlist.tracks.iter().map(|e| e.track.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert!(playlist.tracks.iter().all(|e| e.added_at.is_some()));
        assert_eq!(playlist.owner.unwrap().id.as_deref(), Some("curator"));
    }

    #[test]
    fn test_description_from_fallback() {
        let primary = RawMapping::new(json!({"type": "playlist", "id": "pl2", "name": "Quiet"}));
        let fallback = RawMapping::new(json!({"meta": {
            "og:description": "Calm songs",
            "music:song_count": "48"
        }}));
        let playlist = normalize_playlist(Some(&primary), Some(&fallback)).unwrap();

        assert_eq!(playlist.description.as_deref(), Some("Calm songs"));
        assert_eq!(playlist.track_count, 48);
        assert!(playlist.owner.is_none());
        assert!(playlist.tracks.is_empty());
    }

    #[test]
    fn test_missing_name_fails() {
        let primary = RawMapping::new(json!({"type": "playlist", "id": "pl3"}));
        match normalize_playlist(Some(&primary), None) {
            Err(ScrapeError::ExtractionFailure { reason, .. }) => {
                assert_eq!(reason, ExtractionReason::MissingRequiredField("name"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
