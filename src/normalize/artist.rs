use crate::error::Result;
use crate::extract::RawMapping;
use crate::models::Artist;
use crate::normalize::fields::{
    Candidate, Count, FieldSpec, ListCandidate, ListSpec, Sources, Text, images, strings,
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
        Candidate::at("profile.name", Text::Plain),
        Candidate::at("title", Text::Plain),
    ],
    fallback: &[
        Candidate::at("ld.name", Text::Plain),
        Candidate::at("meta.og:title", Text::Plain),
    ],
};

const GENRES: ListSpec = ListSpec {
    name: "genres",
    primary: &[
        ListCandidate::at("genres", ""),
        ListCandidate::at("profile.genres.items", "name"),
    ],
    fallback: &[ListCandidate::at("ld.genre", "")],
};

const FOLLOWERS: FieldSpec<Count> = FieldSpec {
    name: "followers",
    primary: &[
        Candidate::at("followers.total", Count::Integer),
        Candidate::at("stats.followers", Count::Integer),
        Candidate::at("followers", Count::Integer),
    ],
    fallback: &[Candidate::at(
        "ld.interactionStatistic.userInteractionCount",
        Count::IntegerText,
    )],
};

const TOP_TRACKS: ListSpec = ListSpec {
    name: "top_tracks",
    primary: &[
        ListCandidate::at("top_tracks", ""),
        ListCandidate::at("topTracks", ""),
        ListCandidate::at("discography.topTracks.items", "track"),
        ListCandidate::at("trackList", ""),
    ],
    fallback: &[ListCandidate::at("ld.track", "")],
};

const IMAGES: ListSpec = ListSpec {
    name: "images",
    primary: &[
        ListCandidate::at("images", ""),
        ListCandidate::at("visuals.avatarImage.sources", ""),
        ListCandidate::at("visualIdentity.image", ""),
    ],
    fallback: &[
        ListCandidate::at("ld.image", ""),
        ListCandidate::at("meta.og:image", ""),
    ],
};

pub fn normalize_artist(primary: Option<&RawMapping>, fallback: Option<&RawMapping>) -> Result<Artist> {
    let sources = Sources::new(
        ContentKind::Artist,
        primary.map(RawMapping::view),
        fallback.map(RawMapping::view),
    );

    Ok(Artist {
        id: sources.required(&ID)?,
        name: sources.required(&NAME)?,
        genres: sources
            .list(&GENRES)
            .map(|items| strings(&items))
            .unwrap_or_default(),
        followers: sources.optional(&FOLLOWERS),
        top_tracks: sources
            .list(&TOP_TRACKS)
            .map(|items| tracks_from(&items, ContentKind::Artist)),
        images: sources
            .list(&IMAGES)
            .map(|items| images(&items))
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionReason, ScrapeError};
    use serde_json::json;

    #[test]
    fn test_graphql_artist() {
        let primary = RawMapping::new(json!({
            "__typename": "Artist",
            "uri": "spotify:artist:art1",
            "profile": {"name": "The Band"},
            "stats": {"followers": 123456},
            "visuals": {"avatarImage": {"sources": [
                {"url": "https://i.scdn.co/image/a", "width": 160, "height": 160},
                {"url": "https://i.scdn.co/image/b", "width": 640, "height": 640}
            ]}},
            "discography": {"topTracks": {"items": [
                {"track": {"uri": "spotify:track:hit1", "name": "Hit", "playcount": "100"}}
            ]}}
        }));
        let artist = normalize_artist(Some(&primary), None).unwrap();

        assert_eq!(artist.id, "art1");
        assert_eq!(artist.name, "The Band");
        assert_eq!(artist.followers, Some(123456));
        assert!(artist.genres.is_empty());
        assert_eq!(artist.top_tracks.as_ref().map(Vec::len), Some(1));
        assert_eq!(artist.images[0].width, 640);
    }

    #[test]
    fn test_genres_merge_from_fallback() {
        let primary = RawMapping::new(json!({"type": "artist", "id": "art2", "name": "Solo"}));
        let fallback = RawMapping::new(json!({"ld": {"@type": "MusicGroup", "genre": ["indie", "rock"]}}));
        let artist = normalize_artist(Some(&primary), Some(&fallback)).unwrap();

        assert_eq!(artist.genres, vec!["indie", "rock"]);
        assert_eq!(artist.top_tracks, None);
        assert_eq!(artist.followers, None);
    }

    #[test]
    fn test_missing_name_fails() {
        let fallback = RawMapping::new(json!({"meta": {"og:url": "https://open.spotify.com/artist/x1"}}));
        match normalize_artist(None, Some(&fallback)) {
            Err(ScrapeError::ExtractionFailure { reason, .. }) => {
                assert_eq!(reason, ExtractionReason::MissingRequiredField("name"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
