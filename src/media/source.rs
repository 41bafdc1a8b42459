use tracing::debug;

use crate::error::{MediaFailureKind, Result, ScrapeError};
use crate::media::{QualityPreference, SizeClass};
use crate::models::{HasImages, Image, Track};

/// Preview audio URL of a track, if it has one.
pub fn resolve_audio_source(track: &Track) -> Option<&str> {
    track
        .preview_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
}

/// Pick an image URL: the first image in the first preferred class that has
/// one, otherwise the image closest in size to the most preferred class.
pub fn resolve_image_source(entity: &impl HasImages, quality: &QualityPreference) -> Result<String> {
    let images = entity.images();
    if images.is_empty() {
        return Err(ScrapeError::media(MediaFailureKind::NoSource, "entity has no images"));
    }

    for class in quality.classes() {
        if let Some(image) = images.iter().find(|i| SizeClass::of_edge(i.edge()) == Some(*class)) {
            debug!("Selected {} image {}", class, image.url);
            return Ok(image.url.clone());
        }
    }

    let target = quality
        .classes()
        .first()
        .copied()
        .unwrap_or(SizeClass::Large)
        .nominal_edge();

    let nearest = images
        .iter()
        .filter(|i| i.edge() > 0)
        .min_by_key(|i| i.edge().abs_diff(target))
        .or_else(|| images.first())
        .map(|i: &Image| i.url.clone());

    nearest.ok_or_else(|| ScrapeError::media(MediaFailureKind::NoSource, "entity has no images"))
}
