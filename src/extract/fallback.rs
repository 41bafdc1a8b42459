use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

use crate::extract::paths::{META_PREFIXES, schema_types};
use crate::extract::raw::RawMapping;
use crate::resolver::ContentKind;

/// Read the page's structured metadata: the schema.org JSON-LD block and the
/// OpenGraph / `music:` meta tags.
///
/// The result is shaped `{"ld": {...}, "meta": {"og:title": ..., ...}}` so
/// normalizers address it with `ld.*` and `meta.*` paths. `None` when the
/// page carries neither.
pub fn extract_fallback(content: &str, kind: ContentKind) -> Option<RawMapping> {
    let document = Html::parse_document(content);

    let ld = find_linked_data(&document, kind);
    let meta = collect_meta(&document);

    if ld.is_none() && meta.is_empty() {
        debug!("No structured metadata for {}", kind);
        return None;
    }

    let mut root = Map::new();
    if let Some(ld) = ld {
        root.insert("ld".to_string(), ld);
    }
    if !meta.is_empty() {
        root.insert("meta".to_string(), Value::Object(meta));
    }
    Some(RawMapping::with_origin(Value::Object(root), "structured_data"))
}

fn find_linked_data(document: &Html, kind: ContentKind) -> Option<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    let wanted = schema_types(kind);

    let mut objects = Vec::new();
    for element in document.select(&selector) {
        let text: String = element.text().collect();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => flatten_graph(value, &mut objects),
            Err(e) => debug!("Skipping undecodable JSON-LD block: {}", e),
        }
    }

    let position = objects.iter().position(|obj| has_schema_type(obj, wanted));
    if position.is_none() && !objects.is_empty() {
        debug!("No JSON-LD object of type {:?} among {} blocks", wanted, objects.len());
    }
    Some(objects.swap_remove(position?))
}

/// JSON-LD may be an object, an array of objects, or an `@graph` wrapper.
fn flatten_graph(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_graph(v, out)),
        Value::Object(mut map) => match map.remove("@graph") {
            Some(graph) => flatten_graph(graph, out),
            None => out.push(Value::Object(map)),
        },
        _ => {}
    }
}

fn has_schema_type(obj: &Value, wanted: &[&str]) -> bool {
    match obj.get("@type") {
        Some(Value::String(t)) => wanted.iter().any(|w| w == t),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| wanted.contains(&t)),
        _ => false,
    }
}

/// First occurrence of each `og:*` / `music:*` tag wins.
fn collect_meta(document: &Html) -> Map<String, Value> {
    let mut meta = Map::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return meta;
    };

    for element in document.select(&selector) {
        let attrs = element.value();
        let Some(key) = attrs.attr("property").or_else(|| attrs.attr("name")) else {
            continue;
        };
        if !META_PREFIXES.iter().any(|p| key.starts_with(p)) {
            continue;
        }
        let Some(content) = attrs.attr("content") else {
            continue;
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }
        meta.entry(key.to_string())
            .or_insert_with(|| Value::String(content.to_string()));
    }

    meta
}
