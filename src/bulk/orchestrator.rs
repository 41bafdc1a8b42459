use futures::StreamExt;
use futures::stream;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bulk::report::{BulkEntry, BulkReport};
use crate::config::Config;
use crate::error::{Result, ScrapeError, TransportFailureKind};

/// Runs one operation over many references with bounded parallelism and
/// per-item isolation. A failing item is recorded and never stops its
/// siblings, except that a fatal error (see [`ScrapeError::is_fatal`])
/// cancels the rest of that batch. Request pacing is the session's job.
pub struct BulkProcessor {
    concurrency: usize,
    item_timeout: Duration,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl BulkProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            item_timeout: config.item_timeout,
            cancel: CancellationToken::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Draw a progress bar on stderr while processing.
    pub fn with_progress(mut self) -> Self {
        self.progress = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            self.progress.set_style(style.progress_chars("#>-"));
        }
        self
    }

    /// Token that stops the running batch and every later one when
    /// cancelled, e.g. on Ctrl-C. A fatal error only stops its own batch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn process<F, Fut>(&self, urls: Vec<String>, operation: F) -> BulkReport
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        info!(
            "Processing {} references (concurrency={})",
            urls.len(),
            self.concurrency
        );
        self.progress.set_length(urls.len() as u64);
        self.progress.set_position(0);

        let batch = self.cancel.child_token();
        let batch = &batch;
        let operation = &operation;
        let results: Vec<BulkEntry> = stream::iter(urls)
            .map(|url| async move {
                let entry = self.run_item(url, batch, operation).await;
                self.progress.inc(1);
                entry
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = BulkReport {
            results,
            cancelled: batch.is_cancelled(),
        };
        self.progress.finish_with_message("done");

        info!(
            "Batch finished: {}/{} succeeded{}",
            report.succeeded(),
            report.total(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    async fn run_item<F, Fut>(&self, url: String, batch: &CancellationToken, operation: &F) -> BulkEntry
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if batch.is_cancelled() {
            return BulkEntry::failed(url, &ScrapeError::Cancelled);
        }
        self.progress.set_message(url.clone());

        let outcome = tokio::select! {
            biased;
            _ = batch.cancelled() => Err(ScrapeError::Cancelled),
            result = tokio::time::timeout(self.item_timeout, operation(url.clone())) => {
                result.unwrap_or_else(|_| {
                    Err(ScrapeError::transport(
                        &url,
                        TransportFailureKind::Timeout,
                        format!("item exceeded {:?}", self.item_timeout),
                    ))
                })
            }
        };

        match outcome {
            Ok(data) => BulkEntry::succeeded(url, data),
            Err(e) => {
                if e.is_fatal() && !batch.is_cancelled() {
                    warn!("Stopping batch after fatal error on {}: {}", url, e);
                    batch.cancel();
                } else {
                    warn!("{} failed: {}", url, e);
                }
                BulkEntry::failed(url, &e)
            }
        }
    }
}
