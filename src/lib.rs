pub mod auth;
pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod media;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod transport;

pub use bulk::{BulkEntry, BulkProcessor, BulkReport};
pub use client::{Extraction, SpotifyScraper};
pub use config::Config;
pub use error::{ErrorKind, Result, ScrapeError};
pub use media::{DownloadAction, Downloaded, OverwritePolicy, QualityPreference, SizeClass};
pub use models::{Album, Artist, Entity, Image, Lyrics, Playlist, Track};
pub use resolver::{ContentKind, Reference, classify};
pub use transport::TransportStrategy;
