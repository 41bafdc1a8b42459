use id3::frame::{Lyrics as LyricsFrame, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MediaFailureKind, Result, ScrapeError};
use crate::models::Track;

/// Patch the ID3 tag of a downloaded file in place: title, artists, album,
/// year, unsynced lyrics and, when given, a front cover. Existing frames not
/// touched here are kept; the audio data is not re-encoded.
pub async fn embed_audio_tags(path: &Path, track: &Track, cover: Option<Vec<u8>>) -> Result<()> {
    let path: PathBuf = path.to_path_buf();
    let track = track.clone();

    tokio::task::spawn_blocking(move || write_tags(&path, &track, cover.as_deref()))
        .await
        .map_err(|e| ScrapeError::media(MediaFailureKind::WriteFailure, e.to_string()))?
}

fn write_tags(path: &Path, track: &Track, cover: Option<&[u8]>) -> Result<()> {
    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Tag::new(),
        Err(e) => return Err(tag_failure(path, e)),
    };

    tag.set_title(track.name.as_str());
    if !track.artists.is_empty() {
        tag.set_artist(track.artist_names().join(", "));
    }

    if let Some(album) = &track.album {
        tag.set_album(album.name.as_str());
        if let Some(first) = track.artists.first() {
            tag.set_album_artist(first.name.as_str());
        }
        if let Some(year) = album
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse::<i32>().ok())
        {
            tag.set_year(year);
        }
    }

    if track.duration_ms > 0 {
        tag.set_duration(u32::try_from(track.duration_ms).unwrap_or(u32::MAX));
    }

    if let Some(lyrics) = &track.lyrics {
        tag.add_frame(LyricsFrame {
            lang: "eng".to_string(),
            description: String::new(),
            text: lyrics.text(),
        });
    }

    if let Some(data) = cover {
        tag.remove_picture_by_type(PictureType::CoverFront);
        tag.add_frame(Picture {
            mime_type: sniff_image_mime(data).to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data: data.to_vec(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| tag_failure(path, e))?;
    debug!("Tagged {}", path.display());
    Ok(())
}

fn sniff_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn tag_failure(path: &Path, e: id3::Error) -> ScrapeError {
    ScrapeError::media(
        MediaFailureKind::WriteFailure,
        format!("{}: {}", path.display(), e),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LyricLine, Lyrics};

    #[tokio::test]
    async fn test_tags_written_and_audio_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.mp3");
        let audio = vec![0xFFu8, 0xFB, 0x90, 0x64, 0x00, 0x01, 0x02, 0x03];
        std::fs::write(&path, &audio).unwrap();

        let mut track = Track::mock("Song", "Band");
        track.lyrics = Some(Lyrics {
            sync_type: None,
            lines: vec![LyricLine {
                start_ms: None,
                words: "la la".into(),
            }],
        });
        let cover = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];

        embed_audio_tags(&path, &track, Some(cover.clone())).await.unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Song"));
        assert_eq!(tag.artist(), Some("Band"));
        assert_eq!(tag.album(), Some("Mock Album"));
        assert_eq!(tag.year(), Some(2020));
        let picture = tag.pictures().next().unwrap();
        assert_eq!(picture.data, cover);
        assert_eq!(picture.mime_type, "image/jpeg");
        assert_eq!(tag.lyrics().next().map(|l| l.text.as_str()), Some("la la"));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.ends_with(&audio));
    }

    #[tokio::test]
    async fn test_retagging_replaces_cover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.mp3");
        std::fs::write(&path, [0xFFu8, 0xFB, 0x90]).unwrap();
        let track = Track::mock("Song", "Band");

        embed_audio_tags(&path, &track, Some(vec![1, 2, 3])).await.unwrap();
        embed_audio_tags(&path, &track, Some(vec![4, 5, 6])).await.unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        let pictures: Vec<_> = tag.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].data, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_missing_file_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp3");
        let result = embed_audio_tags(&path, &Track::mock("Song", "Band"), None).await;
        assert!(matches!(
            result,
            Err(ScrapeError::MediaFailure {
                kind: MediaFailureKind::WriteFailure,
                ..
            })
        ));
    }
}
