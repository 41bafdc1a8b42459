use serde_json::Value;

/// A deserialized payload before normalization, plus where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMapping {
    root: Value,
    origin: String,
}

impl RawMapping {
    pub fn new(root: Value) -> Self {
        Self::with_origin(root, "inline")
    }

    pub fn with_origin(root: Value, origin: impl Into<String>) -> Self {
        Self {
            root,
            origin: origin.into(),
        }
    }

    /// Locator and candidate path that produced this mapping.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn view(&self) -> RawView<'_> {
        RawView::new(&self.root)
    }

    pub fn value(&self) -> &Value {
        &self.root
    }
}

/// Result of a path lookup. JSON `null` counts as absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    /// The path stopped resolving at segment `depth`.
    Absent { depth: usize },
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Value> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Absent { .. } => None,
        }
    }
}

/// Borrowed view into a raw mapping supporting dotted-path lookups such as
/// `props.pageProps.state.data.entity` or `artists.0.name`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawView<'a> {
    value: &'a Value,
}

impl<'a> RawView<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn lookup(&self, path: &str) -> Lookup<'a> {
        let mut current = self.value;
        if path.is_empty() {
            return if current.is_null() {
                Lookup::Absent { depth: 0 }
            } else {
                Lookup::Found(current)
            };
        }

        for (depth, segment) in path.split('.').enumerate() {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(v) if !v.is_null() => current = v,
                _ => return Lookup::Absent { depth },
            }
        }
        Lookup::Found(current)
    }

    pub fn at(&self, path: &str) -> Option<RawView<'a>> {
        self.lookup(path).found().map(RawView::new)
    }

    pub fn str_at(&self, path: &str) -> Option<&'a str> {
        self.lookup(path).found().and_then(Value::as_str)
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_lookup() {
        let raw = RawMapping::new(json!({
            "props": {"pageProps": {"state": {"data": {"entity": {"name": "Song"}}}}},
            "artists": [{"name": "A"}, {"name": "B"}]
        }));
        let view = raw.view();

        assert_eq!(
            view.str_at("props.pageProps.state.data.entity.name"),
            Some("Song")
        );
        assert_eq!(view.str_at("artists.1.name"), Some("B"));
        assert_eq!(view.lookup("artists.5.name"), Lookup::Absent { depth: 1 });
        assert_eq!(view.lookup("props.missing.x"), Lookup::Absent { depth: 1 });
    }

    #[test]
    fn test_null_is_absent() {
        let raw = RawMapping::new(json!({"preview": null, "inner": {"x": null}}));
        assert_eq!(raw.view().lookup("preview"), Lookup::Absent { depth: 0 });
        assert_eq!(raw.view().lookup("inner.x"), Lookup::Absent { depth: 1 });
        assert!(raw.view().at("inner").is_some());
    }

    #[test]
    fn test_keys_with_colons() {
        let raw = RawMapping::new(json!({
            "entities": {"items": {"spotify:track:abc": {"name": "Song"}}},
            "meta": {"og:title": "Song"}
        }));
        assert_eq!(
            raw.view().str_at("entities.items.spotify:track:abc.name"),
            Some("Song")
        );
        assert_eq!(raw.view().str_at("meta.og:title"), Some("Song"));
    }

    #[test]
    fn test_empty_path_is_root() {
        let raw = RawMapping::new(json!("just a string"));
        assert_eq!(raw.view().str_at(""), Some("just a string"));
    }
}
