use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::extract::paths::{
    PAYLOAD_LOCATORS, PayloadEncoding, PayloadLocator, ROOT_CANDIDATES, expand_candidate,
    matches_kind,
};
use crate::extract::raw::{RawMapping, RawView};
use crate::resolver::Reference;

/// Find the embedded application state on a page and return the entity root
/// for `reference`. `None` means the page has no usable state and the caller
/// should fall back.
pub fn extract_primary(content: &str, reference: &Reference) -> Option<RawMapping> {
    for (locator, payload) in locate_payloads(content) {
        for template in ROOT_CANDIDATES {
            let path = expand_candidate(template, reference);
            let view = RawView::new(&payload);
            let Some(root) = view.at(&path) else {
                continue;
            };
            if matches_kind(&root, reference.kind) {
                debug!(
                    "Primary state for {} found at {}:{}",
                    reference,
                    locator.name,
                    if path.is_empty() { "<root>" } else { path.as_str() }
                );
                return Some(RawMapping::with_origin(
                    root.value().clone(),
                    format!("{}:{}", locator.name, path),
                ));
            }
        }
        debug!("Payload {} has no {} root", locator.name, reference.kind);
    }
    None
}

/// Every decodable payload on the page, in locator order.
pub fn locate_payloads(content: &str) -> Vec<(PayloadLocator, Value)> {
    let document = Html::parse_document(content);
    let mut payloads = Vec::new();

    for locator in PAYLOAD_LOCATORS {
        let Ok(selector) = Selector::parse(locator.selector) else {
            continue;
        };
        for element in document.select(&selector) {
            let text: String = element.text().collect();
            match decode_payload(&text, locator.encoding) {
                Some(value) => payloads.push((*locator, value)),
                None => debug!("Payload {} present but not decodable", locator.name),
            }
        }
    }

    payloads
}

fn decode_payload(text: &str, encoding: PayloadEncoding) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match encoding {
        PayloadEncoding::Json => serde_json::from_str(text).ok(),
        PayloadEncoding::Base64Json => {
            let bytes = STANDARD.decode(text).ok()?;
            serde_json::from_slice(&bytes).ok()
        }
        PayloadEncoding::UrlEncodedJson => {
            let decoded = urlencoding::decode(text).ok()?;
            serde_json::from_str(&decoded).ok()
        }
    }
}
