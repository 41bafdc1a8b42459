pub mod album;
pub mod artist;
pub mod fields;
pub mod playlist;
pub mod track;

pub use album::normalize_album;
pub use artist::normalize_artist;
pub use playlist::normalize_playlist;
pub use track::normalize_track;

use crate::error::{ExtractorStage, Result, ScrapeError};
use crate::extract::RawMapping;
use crate::models::Entity;
use crate::resolver::ContentKind;

/// Merge the raw mappings of one page into an entity of `kind`.
pub fn normalize(
    primary: Option<&RawMapping>,
    fallback: Option<&RawMapping>,
    kind: ContentKind,
) -> Result<Entity> {
    if primary.is_none() && fallback.is_none() {
        return Err(ScrapeError::unrecognized(
            kind,
            ExtractorStage::Merged,
            "page carries neither application state nor structured metadata",
        ));
    }

    Ok(match kind {
        ContentKind::Track => Entity::Track(normalize_track(primary, fallback)?),
        ContentKind::Album => Entity::Album(normalize_album(primary, fallback)?),
        ContentKind::Artist => Entity::Artist(normalize_artist(primary, fallback)?),
        ContentKind::Playlist => Entity::Playlist(normalize_playlist(primary, fallback)?),
    })
}
