//! Where embedded data lives on a page.
//!
//! These tables are tried in order. When upstream moves things around, add
//! an entry here rather than another branch in the extractors.

use crate::extract::raw::RawView;
use crate::resolver::{ContentKind, Reference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Json,
    Base64Json,
    UrlEncodedJson,
}

#[derive(Debug, Clone, Copy)]
pub struct PayloadLocator {
    pub name: &'static str,
    pub selector: &'static str,
    pub encoding: PayloadEncoding,
}

pub const PAYLOAD_LOCATORS: &[PayloadLocator] = &[
    PayloadLocator {
        name: "next_data",
        selector: "script#__NEXT_DATA__",
        encoding: PayloadEncoding::Json,
    },
    PayloadLocator {
        name: "initial_state",
        selector: "script#initial-state",
        encoding: PayloadEncoding::Base64Json,
    },
    PayloadLocator {
        name: "resource",
        selector: "script#resource",
        encoding: PayloadEncoding::UrlEncodedJson,
    },
];

/// Entity root candidates inside a payload. `{uri}` and `{id}` are replaced
/// with the requested reference; the empty path is the payload root.
pub const ROOT_CANDIDATES: &[&str] = &[
    "props.pageProps.state.data.entity",
    "props.pageProps.entity",
    "entities.items.{uri}",
    "data.entity",
    "data.{kind}Union",
    "",
];

/// Fields naming the entity type.
const TYPE_FIELDS: &[&str] = &["type", "__typename"];

/// Fields carrying the entity URI.
const URI_FIELDS: &[&str] = &["uri"];

pub fn expand_candidate(template: &str, reference: &Reference) -> String {
    template
        .replace("{uri}", &reference.uri())
        .replace("{id}", &reference.canonical_id)
        .replace("{kind}", reference.kind.as_str())
}

/// Whether `view` looks like an entity of `kind`.
pub fn matches_kind(view: &RawView<'_>, kind: ContentKind) -> bool {
    if !view.is_object() {
        return false;
    }

    let type_match = TYPE_FIELDS.iter().any(|field| {
        view.str_at(field)
            .is_some_and(|t| t.eq_ignore_ascii_case(kind.as_str()))
    });

    let uri_prefix = format!("spotify:{}:", kind);
    let uri_match = URI_FIELDS
        .iter()
        .any(|field| view.str_at(field).is_some_and(|u| u.starts_with(&uri_prefix)));

    type_match || uri_match
}

/// schema.org types of the structured-data block for each kind.
pub fn schema_types(kind: ContentKind) -> &'static [&'static str] {
    match kind {
        ContentKind::Track => &["MusicRecording"],
        ContentKind::Album => &["MusicAlbum"],
        ContentKind::Artist => &["MusicGroup", "Person"],
        ContentKind::Playlist => &["MusicPlaylist"],
    }
}

/// Meta tag prefixes collected into the fallback mapping.
pub const META_PREFIXES: &[&str] = &["og:", "music:"];
