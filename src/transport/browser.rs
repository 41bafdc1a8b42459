//! Full-session strategy: renders pages in a headless Chromium so that
//! client-side scripts populate the embedded state.
//!
//! A session owns a throw-away browser profile and at most one running
//! browser process. It is not shared between concurrent callers; `fetch`
//! calls on one session are serialized. Use [`BrowserSession::scoped`] so the
//! profile and any process are released on every exit path.

use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, ScrapeError, TransportFailureKind};
use crate::transport::{FetchOptions, RetryPolicy, Session, Transport};

/// How long scripts may run before the DOM is dumped.
const VIRTUAL_TIME_BUDGET_MS: u64 = 8000;

pub struct BrowserSession {
    binary: PathBuf,
    user_agent: String,
    proxy: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    session: Session,
    state: Mutex<BrowserState>,
}

struct BrowserState {
    profile: Option<TempDir>,
}

impl BrowserSession {
    /// Prepare a session. The browser itself starts per page load, paced
    /// by `session` like any other request.
    pub fn launch(config: &Config, session: &Session) -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("spotify-scraper-profile-")
            .tempdir()
            .map_err(|e| {
                ScrapeError::transport(
                    "browser",
                    TransportFailureKind::Refused,
                    format!("cannot create browser profile: {}", e),
                )
            })?;

        info!(
            "Browser session ready ({}, profile {})",
            config.browser_path.display(),
            profile.path().display()
        );

        Ok(Self {
            binary: config.browser_path.clone(),
            user_agent: config.user_agent.clone(),
            proxy: config.proxy.clone(),
            // Rendering is slower than a plain GET.
            timeout: config.timeout + Duration::from_millis(VIRTUAL_TIME_BUDGET_MS),
            retry: RetryPolicy::from_config(config),
            session: session.clone(),
            state: Mutex::new(BrowserState {
                profile: Some(profile),
            }),
        })
    }

    /// Run `f` with a fresh session and close it afterwards, whether `f`
    /// succeeded or not.
    pub async fn scoped<F, Fut, T>(config: &Config, session: &Session, f: F) -> Result<T>
    where
        F: FnOnce(Arc<BrowserSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let browser = Arc::new(Self::launch(config, session)?);
        let outcome = f(Arc::clone(&browser)).await;
        browser.close().await;
        outcome
    }

    /// Release the profile directory. Further fetches fail.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(profile) = state.profile.take() {
            let path = profile.path().to_path_buf();
            match profile.close() {
                Ok(()) => debug!("Browser profile {} removed", path.display()),
                Err(e) => warn!("Failed to remove browser profile {}: {}", path.display(), e),
            }
        }
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.profile.is_some()
    }

    pub async fn profile_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .await
            .profile
            .as_ref()
            .map(|p| p.path().to_path_buf())
    }

    fn command(&self, profile: &Path, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-first-run")
            .arg("--mute-audio")
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--virtual-time-budget={}", VIRTUAL_TIME_BUDGET_MS));
        if let Some(proxy) = &self.proxy {
            cmd.arg(format!("--proxy-server={}", proxy));
        }
        cmd.arg("--dump-dom")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let state = self.state.lock().await;
        let profile = state.profile.as_ref().ok_or_else(|| {
            ScrapeError::transport(url, TransportFailureKind::Refused, "browser session is closed")
        })?;

        let child = self.command(profile.path(), url).spawn().map_err(|e| {
            ScrapeError::transport(
                url,
                TransportFailureKind::Refused,
                format!("cannot start {}: {}", self.binary.display(), e),
            )
        })?;

        // Dropping the child on timeout kills it (kill_on_drop).
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ScrapeError::transport(url, TransportFailureKind::Timeout, "page render timed out")
            })?
            .map_err(|e| {
                ScrapeError::transport(url, TransportFailureKind::Refused, e.to_string())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            return Err(ScrapeError::transport(
                url,
                TransportFailureKind::Refused,
                format!("browser exited with {}: {}", output.status, tail),
            ));
        }

        let dom = String::from_utf8_lossy(&output.stdout).into_owned();
        if dom.trim().is_empty() {
            return Err(ScrapeError::transport(
                url,
                TransportFailureKind::Blocked,
                "browser returned an empty document",
            ));
        }
        Ok(dom)
    }
}

#[async_trait]
impl Transport for BrowserSession {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String> {
        if options.bearer.is_some() || !options.headers.is_empty() {
            debug!("Browser transport ignores request headers for {}", url);
        }
        let timeout = options.timeout.unwrap_or(self.timeout);
        info!("Rendering {} in headless browser", url);
        self.retry
            .run(url, move || async move {
                self.session.pace().await;
                self.render(url, timeout).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `echo` stands in for the browser: it prints its arguments, URL last.
    fn echo_config() -> Config {
        Config {
            browser_path: PathBuf::from("echo"),
            max_retries: 0,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_process_output() {
        let session = BrowserSession::launch(&echo_config(), &Session::anonymous()).unwrap();
        let body = session
            .fetch("https://open.spotify.com/track/abc", &FetchOptions::default())
            .await
            .unwrap();
        assert!(body.contains("--dump-dom https://open.spotify.com/track/abc"));
        session.close().await;
    }

    #[tokio::test]
    async fn test_scoped_session_is_torn_down_on_error() {
        let mut seen_profile = None;
        let result: Result<()> = BrowserSession::scoped(&echo_config(), &Session::anonymous(), |session| {
            let seen = &mut seen_profile;
            async move {
                *seen = session.profile_path().await;
                Err(ScrapeError::unrecognized(
                    crate::resolver::ContentKind::Track,
                    crate::error::ExtractorStage::Primary,
                    "no state",
                ))
            }
        })
        .await;

        assert!(result.is_err());
        let profile = seen_profile.expect("profile existed during scope");
        assert!(!profile.exists(), "profile should be removed after scope");
    }

    #[tokio::test]
    async fn test_closed_session_refuses_fetch() {
        let session = BrowserSession::launch(&echo_config(), &Session::anonymous()).unwrap();
        session.close().await;
        assert!(!session.is_open().await);
        let err = session
            .fetch("https://open.spotify.com/", &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::TransportFailure {
                kind: TransportFailureKind::Refused,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_refused() {
        let config = Config {
            browser_path: PathBuf::from("/nonexistent/chromium"),
            max_retries: 0,
            ..Config::default()
        };
        let session = BrowserSession::launch(&config, &Session::anonymous()).unwrap();
        let err = session
            .fetch("https://open.spotify.com/", &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::TransportFailure {
                kind: TransportFailureKind::Refused,
                ..
            }
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn test_renders_share_the_session_pacing() {
        let config = Config {
            pacing_delay: Duration::from_millis(80),
            ..echo_config()
        };
        let shared = Session::from_config(&config).unwrap();
        let browser = BrowserSession::launch(&config, &shared).unwrap();

        let begin = tokio::time::Instant::now();
        shared.pace().await;
        browser
            .fetch("https://open.spotify.com/album/abc", &FetchOptions::default())
            .await
            .unwrap();
        assert!(begin.elapsed() >= Duration::from_millis(80));
        browser.close().await;
    }
}
