use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, ScrapeError};
use crate::resolver::{ContentKind, classify};

/// Outcome for one input reference. Serializes directly to the
/// `{url, kind, success, data, error_kind, error_message}` record.
#[derive(Debug, Clone, Serialize)]
pub struct BulkEntry {
    pub url: String,
    pub kind: Option<ContentKind>,
    pub success: bool,
    pub data: Option<Value>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
}

impl BulkEntry {
    pub fn succeeded(url: String, data: Value) -> Self {
        Self {
            kind: kind_of(&url),
            url,
            success: true,
            data: Some(data),
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failed(url: String, error: &ScrapeError) -> Self {
        Self {
            kind: kind_of(&url),
            url,
            success: false,
            data: None,
            error_kind: Some(error.kind()),
            error_message: Some(error.to_string()),
        }
    }
}

fn kind_of(url: &str) -> Option<ContentKind> {
    classify(url).ok().map(|r| r.kind)
}

/// All entries of a batch, in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub results: Vec<BulkEntry>,
    /// Whether the batch stopped early.
    pub cancelled: bool,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            (self.succeeded() as f64 / self.total() as f64) * 100.0
        }
    }

    pub fn entry(&self, url: &str) -> Option<&BulkEntry> {
        self.results.iter().find(|r| r.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractorStage, TransportFailureKind};
    use serde_json::json;

    #[test]
    fn test_entry_serialization() {
        let ok = BulkEntry::succeeded(
            "https://open.spotify.com/track/abc".into(),
            json!({"name": "Song"}),
        );
        let err = BulkEntry::failed(
            "https://open.spotify.com/album/def".into(),
            &ScrapeError::missing_field(ContentKind::Album, ExtractorStage::Merged, "name"),
        );

        let ok_json = serde_json::to_value(&ok).unwrap();
        assert_eq!(ok_json["kind"], "track");
        assert_eq!(ok_json["success"], true);
        assert!(ok_json["error_kind"].is_null());

        let err_json = serde_json::to_value(&err).unwrap();
        assert_eq!(err_json["kind"], "album");
        assert_eq!(err_json["error_kind"], "extraction_failure");
        assert!(err_json["error_message"].as_str().unwrap().contains("name"));
    }

    #[test]
    fn test_counts() {
        let report = BulkReport {
            results: vec![
                BulkEntry::succeeded("a".into(), json!(1)),
                BulkEntry::failed(
                    "b".into(),
                    &ScrapeError::transport("b", TransportFailureKind::Timeout, "slow"),
                ),
            ],
            cancelled: false,
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.success_rate(), 50.0);
        assert!(report.entry("b").unwrap().kind.is_none());
    }
}
