pub mod download;
pub mod source;
pub mod tags;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub use download::{DownloadAction, Downloaded, download, sanitize_file_name};
pub use source::{resolve_audio_source, resolve_image_source};
pub use tags::embed_audio_tags;

/// Coarse image resolution buckets, by longer edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// Up to 100 px.
    Small,
    /// Up to 400 px.
    Medium,
    /// Anything larger.
    Large,
}

impl SizeClass {
    /// Class of an image edge. Zero means unknown size.
    pub fn of_edge(edge: u32) -> Option<Self> {
        match edge {
            0 => None,
            1..=100 => Some(SizeClass::Small),
            101..=400 => Some(SizeClass::Medium),
            _ => Some(SizeClass::Large),
        }
    }

    /// The edge upstream typically serves for this class.
    pub fn nominal_edge(&self) -> u32 {
        match self {
            SizeClass::Small => 64,
            SizeClass::Medium => 300,
            SizeClass::Large => 640,
        }
    }
}

impl FromStr for SizeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(SizeClass::Small),
            "medium" | "m" => Ok(SizeClass::Medium),
            "large" | "l" => Ok(SizeClass::Large),
            other => Err(format!("unknown size class '{}'", other)),
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeClass::Small => write!(f, "small"),
            SizeClass::Medium => write!(f, "medium"),
            SizeClass::Large => write!(f, "large"),
        }
    }
}

/// Ordered list of wanted size classes, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPreference(Vec<SizeClass>);

impl QualityPreference {
    pub fn new(classes: Vec<SizeClass>) -> Self {
        Self(classes)
    }

    pub fn classes(&self) -> &[SizeClass] {
        &self.0
    }
}

impl Default for QualityPreference {
    fn default() -> Self {
        Self(vec![SizeClass::Large, SizeClass::Medium, SizeClass::Small])
    }
}

impl FromStr for QualityPreference {
    type Err = String;

    /// Comma-separated, e.g. `medium,large`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let classes = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(SizeClass::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if classes.is_empty() {
            return Err("quality preference is empty".to_string());
        }
        Ok(Self(classes))
    }
}

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverwritePolicy {
    #[default]
    Skip,
    Overwrite,
    /// Write next to it as `name (1).ext`, `name (2).ext`, ...
    Rename,
}

impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverwritePolicy::Skip),
            "overwrite" => Ok(OverwritePolicy::Overwrite),
            "rename" => Ok(OverwritePolicy::Rename),
            other => Err(format!("unknown overwrite policy '{}'", other)),
        }
    }
}
