//! Field-by-field merge of primary and fallback raw mappings.
//!
//! Every entity field is described by a [`FieldSpec`]: an ordered list of
//! candidate paths into the primary mapping, then into the fallback mapping,
//! each paired with a decoder. The first candidate that decodes wins. A value
//! that is present but of the wrong type counts as absent for that candidate,
//! so the next candidate (and eventually the fallback) is consulted. Nothing
//! found in primary is ever replaced by a fallback value.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{ExtractorStage, Result, ScrapeError};
use crate::extract::RawView;
use crate::models::{ArtistRef, Image, sort_by_resolution};
use crate::resolver::{ContentKind, id_from_link, id_from_uri, is_valid_id};

/// Outcome of decoding one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Found(T),
    Absent,
    /// Present with the wrong shape; names what was expected.
    Mismatched(&'static str),
}

pub trait Decoder {
    type Output;

    fn decode(&self, value: &Value) -> Decoded<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    /// Any non-empty string.
    Plain,
    /// A bare base62 id.
    Id,
    /// Id taken from a `spotify:<kind>:<id>` URI.
    IdFromUri,
    /// Id taken from an `open.spotify.com` link.
    IdFromLink,
    /// An absolute http(s) URL.
    Url,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`; longer timestamps are truncated.
    Date,
}

impl Decoder for Text {
    type Output = String;

    fn decode(&self, value: &Value) -> Decoded<String> {
        let Some(raw) = value.as_str() else {
            return Decoded::Mismatched("string");
        };
        let s = raw.trim();
        if s.is_empty() {
            return Decoded::Absent;
        }

        let decoded = match self {
            Text::Plain => Some(s.to_string()),
            Text::Id => is_valid_id(s).then(|| s.to_string()),
            Text::IdFromUri => id_from_uri(s).map(str::to_string),
            Text::IdFromLink => id_from_link(s),
            Text::Url => (s.starts_with("https://") || s.starts_with("http://")).then(|| s.to_string()),
            Text::Date => parse_date(s),
        };

        match decoded {
            Some(v) => Decoded::Found(v),
            None => Decoded::Mismatched(self.expected()),
        }
    }
}

impl Text {
    fn expected(&self) -> &'static str {
        match self {
            Text::Plain => "string",
            Text::Id => "base62 id",
            Text::IdFromUri => "spotify uri",
            Text::IdFromLink => "spotify link",
            Text::Url => "http url",
            Text::Date => "iso date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// A JSON number that is a non-negative integer.
    Integer,
    /// A number, or a string of digits with optional thousands separators.
    IntegerText,
    /// ISO-8601 duration such as `PT3M20S`, in milliseconds.
    IsoDuration,
    /// Seconds as a number or string, in milliseconds.
    SecondsText,
    /// Integer in `0..=100`.
    Percent,
}

impl Decoder for Count {
    type Output = u64;

    fn decode(&self, value: &Value) -> Decoded<u64> {
        let decoded = match self {
            Count::Integer => integer(value),
            Count::IntegerText => integer(value).or_else(|| value.as_str().and_then(integer_text)),
            Count::IsoDuration => value.as_str().and_then(parse_iso_duration),
            Count::SecondsText => integer(value)
                .or_else(|| value.as_str().and_then(integer_text))
                .and_then(|secs| secs.checked_mul(1000)),
            Count::Percent => integer(value).filter(|p| *p <= 100),
        };
        match decoded {
            Some(v) => Decoded::Found(v),
            None => Decoded::Mismatched(self.expected()),
        }
    }
}

impl Count {
    fn expected(&self) -> &'static str {
        match self {
            Count::Integer => "non-negative integer",
            Count::IntegerText => "integer text",
            Count::IsoDuration => "iso duration",
            Count::SecondsText => "seconds",
            Count::Percent => "integer in 0..=100",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Bool,
    /// Content rating label: `EXPLICIT` is true, `NONE`/`CLEAN` false.
    ExplicitLabel,
}

impl Decoder for Flag {
    type Output = bool;

    fn decode(&self, value: &Value) -> Decoded<bool> {
        match self {
            Flag::Bool => value.as_bool().map_or(Decoded::Mismatched("boolean"), Decoded::Found),
            Flag::ExplicitLabel => match value.as_str().map(str::trim) {
                Some(label) if label.eq_ignore_ascii_case("explicit") => Decoded::Found(true),
                Some(label)
                    if label.eq_ignore_ascii_case("none") || label.eq_ignore_ascii_case("clean") =>
                {
                    Decoded::Found(false)
                }
                _ => Decoded::Mismatched("rating label"),
            },
        }
    }
}

/// RFC 3339 timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp;

impl Decoder for Timestamp {
    type Output = DateTime<Utc>;

    fn decode(&self, value: &Value) -> Decoded<DateTime<Utc>> {
        match value.as_str().map(|s| DateTime::parse_from_rfc3339(s.trim())) {
            Some(Ok(ts)) => Decoded::Found(ts.with_timezone(&Utc)),
            _ => Decoded::Mismatched("rfc3339 timestamp"),
        }
    }
}

fn integer(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    // Some payloads serialize counts as floats (`214000.0`).
    value
        .as_f64()
        .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

fn integer_text(s: &str) -> Option<u64> {
    let digits: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    digits.parse().ok()
}

static DATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?(?:[T ].*)?$").ok());

static ISO_DURATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$").ok()
});

fn parse_date(s: &str) -> Option<String> {
    let caps = DATE.as_ref()?.captures(s)?;
    let year = caps.get(1)?.as_str();

    match (caps.get(2), caps.get(3)) {
        (Some(month), Some(day)) => {
            let date = format!("{}-{}-{}", year, month.as_str(), day.as_str());
            NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
            Some(date)
        }
        (Some(month), None) => {
            let m: u32 = month.as_str().parse().ok()?;
            (1..=12).contains(&m).then(|| format!("{}-{}", year, month.as_str()))
        }
        _ => Some(year.to_string()),
    }
}

/// `None` on malformed input and on values that do not fit in u64 ms.
fn parse_iso_duration(s: &str) -> Option<u64> {
    let caps = ISO_DURATION.as_ref()?.captures(s.trim())?;
    if caps.iter().skip(1).all(|c| c.is_none()) {
        return None;
    }

    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<u64>().ok(),
            None => Some(0),
        }
    };
    let seconds: f64 = caps
        .get(4)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let seconds_ms = seconds * 1000.0;
    if !seconds_ms.is_finite() || seconds_ms >= u64::MAX as f64 {
        return None;
    }

    let hours = part(1)?.checked_mul(24)?.checked_add(part(2)?)?;
    let minutes = hours.checked_mul(60)?.checked_add(part(3)?)?;
    let whole_ms = minutes.checked_mul(60)?.checked_mul(1000)?;
    whole_ms.checked_add(seconds_ms.round() as u64)
}

/// One place a field may live, and how to read it.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<D> {
    pub path: &'static str,
    pub decoder: D,
}

impl<D> Candidate<D> {
    pub const fn at(path: &'static str, decoder: D) -> Self {
        Self { path, decoder }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<D: 'static> {
    pub name: &'static str,
    pub primary: &'static [Candidate<D>],
    pub fallback: &'static [Candidate<D>],
}

/// A list-valued field: `path` locates the list, `item` is the sub-path of
/// each element that holds the actual entry (`""` for the element itself).
#[derive(Debug, Clone, Copy)]
pub struct ListCandidate {
    pub path: &'static str,
    pub item: &'static str,
}

impl ListCandidate {
    pub const fn at(path: &'static str, item: &'static str) -> Self {
        Self { path, item }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListSpec {
    pub name: &'static str,
    pub primary: &'static [ListCandidate],
    pub fallback: &'static [ListCandidate],
}

/// A list element: `wrapper` is the raw element, `item` the entry inside it.
#[derive(Debug, Clone, Copy)]
pub struct ListItem<'a> {
    pub wrapper: RawView<'a>,
    pub item: RawView<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: Source,
}

/// Decode the first matching candidate within a single view.
pub fn first_match<D: Decoder>(view: &RawView<'_>, candidates: &[Candidate<D>]) -> Decoded<D::Output> {
    let mut outcome = Decoded::Absent;
    for candidate in candidates {
        let Some(value) = view.lookup(candidate.path).found() else {
            continue;
        };
        match candidate.decoder.decode(value) {
            Decoded::Found(v) => return Decoded::Found(v),
            Decoded::Mismatched(expected) => {
                debug!("Path '{}' is not a {}", candidate.path, expected);
                outcome = Decoded::Mismatched(expected);
            }
            Decoded::Absent => {}
        }
    }
    outcome
}

pub fn pick<D: Decoder>(view: &RawView<'_>, candidates: &[Candidate<D>]) -> Option<D::Output> {
    match first_match(view, candidates) {
        Decoded::Found(v) => Some(v),
        _ => None,
    }
}

/// The two raw mappings of one page, either of which may be missing.
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
    pub kind: ContentKind,
    pub primary: Option<RawView<'a>>,
    pub fallback: Option<RawView<'a>>,
}

impl<'a> Sources<'a> {
    pub fn new(kind: ContentKind, primary: Option<RawView<'a>>, fallback: Option<RawView<'a>>) -> Self {
        Self {
            kind,
            primary,
            fallback,
        }
    }

    /// Sources for a nested entry, which only has one mapping.
    pub fn single(kind: ContentKind, view: RawView<'a>) -> Self {
        Self::new(kind, Some(view), None)
    }

    pub fn resolve<D: Decoder>(&self, spec: &FieldSpec<D>) -> Option<Resolved<D::Output>> {
        let passes = [
            (self.primary, spec.primary, Source::Primary),
            (self.fallback, spec.fallback, Source::Fallback),
        ];
        for (view, candidates, source) in passes {
            let Some(view) = view else { continue };
            if let Decoded::Found(value) = first_match(&view, candidates) {
                return Some(Resolved { value, source });
            }
        }
        debug!("Field '{}' absent for {}", spec.name, self.kind);
        None
    }

    pub fn optional<D: Decoder>(&self, spec: &FieldSpec<D>) -> Option<D::Output> {
        self.resolve(spec).map(|r| r.value)
    }

    pub fn required<D: Decoder>(&self, spec: &FieldSpec<D>) -> Result<D::Output> {
        self.optional(spec)
            .ok_or_else(|| ScrapeError::missing_field(self.kind, self.stage(), spec.name))
    }

    pub fn resolve_list(&self, spec: &ListSpec) -> Option<Resolved<Vec<ListItem<'a>>>> {
        let passes = [
            (self.primary, spec.primary, Source::Primary),
            (self.fallback, spec.fallback, Source::Fallback),
        ];
        for (view, candidates, source) in passes {
            let Some(view) = view else { continue };
            for candidate in candidates {
                if let Some(items) = list_at(&view, candidate) {
                    return Some(Resolved {
                        value: items,
                        source,
                    });
                }
            }
        }
        None
    }

    pub fn list(&self, spec: &ListSpec) -> Option<Vec<ListItem<'a>>> {
        self.resolve_list(spec).map(|r| r.value)
    }

    /// Which extractor(s) a failure should be attributed to.
    pub fn stage(&self) -> ExtractorStage {
        match (self.primary.is_some(), self.fallback.is_some()) {
            (true, false) => ExtractorStage::Primary,
            (false, true) => ExtractorStage::Fallback,
            _ => ExtractorStage::Merged,
        }
    }
}

/// An array is a list (empty counts as present); a lone object or string is
/// a one-element list.
fn list_at<'a>(view: &RawView<'a>, candidate: &ListCandidate) -> Option<Vec<ListItem<'a>>> {
    let found = view.at(candidate.path)?;
    let elements: Vec<RawView<'a>> = match found.value() {
        Value::Array(items) => items.iter().map(RawView::new).collect(),
        Value::Object(_) | Value::String(_) => vec![found],
        _ => {
            debug!("Path '{}' is not a list", candidate.path);
            return None;
        }
    };

    Some(
        elements
            .into_iter()
            .filter_map(|wrapper| {
                let item = wrapper.at(candidate.item)?;
                Some(ListItem { wrapper, item })
            })
            .collect(),
    )
}

const IMAGE_URL: &[Candidate<Text>] = &[
    Candidate::at("url", Text::Url),
    Candidate::at("contentUrl", Text::Url),
];
const IMAGE_WIDTH: &[Candidate<Count>] = &[
    Candidate::at("width", Count::Integer),
    Candidate::at("maxWidth", Count::Integer),
];
const IMAGE_HEIGHT: &[Candidate<Count>] = &[
    Candidate::at("height", Count::Integer),
    Candidate::at("maxHeight", Count::Integer),
];

/// Images from a list field, sorted by descending resolution. Bare URL
/// strings become images of unknown (0x0) size.
pub fn images(items: &[ListItem<'_>]) -> Vec<Image> {
    let mut images: Vec<Image> = items
        .iter()
        .filter_map(|entry| {
            let view = entry.item;
            if let Some(url) = view.value().as_str() {
                return Text::Url.decode(view.value()).found().map(|_| Image {
                    url: url.trim().to_string(),
                    width: 0,
                    height: 0,
                });
            }
            let url = pick(&view, IMAGE_URL)?;
            let dimension = |candidates: &[Candidate<Count>]| {
                pick(&view, candidates)
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(0)
            };
            Some(Image {
                url,
                width: dimension(IMAGE_WIDTH),
                height: dimension(IMAGE_HEIGHT),
            })
        })
        .collect();
    sort_by_resolution(&mut images);
    images
}

const ARTIST_NAME: &[Candidate<Text>] = &[
    Candidate::at("name", Text::Plain),
    Candidate::at("profile.name", Text::Plain),
];
const ARTIST_ID: &[Candidate<Text>] = &[
    Candidate::at("id", Text::Id),
    Candidate::at("uri", Text::IdFromUri),
    Candidate::at("@id", Text::IdFromLink),
    Candidate::at("url", Text::IdFromLink),
    Candidate::at("external_urls.spotify", Text::IdFromLink),
];

/// Artist references in upstream order. A string element is a display list
/// such as `"Artist A, Artist B"` and yields one name-only reference each.
pub fn artist_refs(items: &[ListItem<'_>]) -> Vec<ArtistRef> {
    let mut refs = Vec::new();
    for entry in items {
        let view = entry.item;
        if let Some(text) = view.value().as_str() {
            refs.extend(
                text.split(", ")
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| ArtistRef {
                        id: None,
                        name: name.to_string(),
                    }),
            );
            continue;
        }
        match pick(&view, ARTIST_NAME) {
            Some(name) => refs.push(ArtistRef {
                id: pick(&view, ARTIST_ID),
                name,
            }),
            None => debug!("Skipping artist entry without a name"),
        }
    }
    refs
}

/// Plain strings of a list field, e.g. genres.
pub fn strings(items: &[ListItem<'_>]) -> Vec<String> {
    items
        .iter()
        .filter_map(|entry| Text::Plain.decode(entry.item.value()).found())
        .collect()
}

impl<T> Decoded<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Decoded::Found(v) => Some(v),
            _ => None,
        }
    }
}
