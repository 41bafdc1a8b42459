use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{MediaFailureKind, Result, ScrapeError};
use crate::media::OverwritePolicy;
use crate::transport::{FetchOptions, HttpTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadAction {
    Written,
    Overwritten,
    Renamed,
    /// The destination existed and the policy was skip; nothing was fetched.
    SkippedExisting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Downloaded {
    pub path: PathBuf,
    pub action: DownloadAction,
}

/// Download `url` to `destination`.
///
/// The body is streamed into `<destination>.part` and renamed into place
/// once complete, so an interrupted download never leaves a truncated file
/// under the final name.
pub async fn download(
    http: &HttpTransport,
    url: &str,
    destination: &Path,
    policy: OverwritePolicy,
) -> Result<Downloaded> {
    if url.trim().is_empty() {
        return Err(ScrapeError::media(MediaFailureKind::NoSource, "empty media url"));
    }

    let exists = fs::try_exists(destination).await.unwrap_or(false);
    let (target, action) = match (exists, policy) {
        (false, _) => (destination.to_path_buf(), DownloadAction::Written),
        (true, OverwritePolicy::Skip) => {
            debug!("{} exists, skipping", destination.display());
            return Ok(Downloaded {
                path: destination.to_path_buf(),
                action: DownloadAction::SkippedExisting,
            });
        }
        (true, OverwritePolicy::Overwrite) => (destination.to_path_buf(), DownloadAction::Overwritten),
        (true, OverwritePolicy::Rename) => (free_name(destination).await, DownloadAction::Renamed),
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| write_failure(parent, e))?;
    }

    let response = http
        .send(url, &FetchOptions::default())
        .await
        .map_err(|e| ScrapeError::media(MediaFailureKind::TransportFailure, e.to_string()))?;

    let part = part_path(&target);
    if let Err(e) = stream_to(response, &part).await {
        let _ = fs::remove_file(&part).await;
        return Err(e);
    }

    fs::rename(&part, &target)
        .await
        .map_err(|e| write_failure(&target, e))?;

    info!("Saved {}", target.display());
    Ok(Downloaded {
        path: target,
        action,
    })
}

async fn stream_to(response: reqwest::Response, part: &Path) -> Result<()> {
    let mut file = fs::File::create(part)
        .await
        .map_err(|e| write_failure(part, e))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| ScrapeError::media(MediaFailureKind::TransportFailure, e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| write_failure(part, e))?;
    }

    file.flush().await.map_err(|e| write_failure(part, e))
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}

/// First `stem (n).ext` that does not exist yet.
async fn free_name(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let candidate = destination.with_file_name(format!("{} ({}){}", stem, n, extension));
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

fn write_failure(path: &Path, e: std::io::Error) -> ScrapeError {
    ScrapeError::media(
        MediaFailureKind::WriteFailure,
        format!("{}: {}", path.display(), e),
    )
}

/// Make an entity name usable as a file name on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.chars().take(150).collect()
    }
}
