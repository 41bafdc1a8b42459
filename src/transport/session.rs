use reqwest::cookie::Jar;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{self, AccessToken, Credentials, SESSION_COOKIE};
use crate::config::Config;
use crate::error::Result;

const SPOTIFY_ORIGIN: &str = "https://open.spotify.com/";

pub const DEFAULT_PAGE_CACHE_CAPACITY: usize = 64;

/// Per-scraper state shared by every request and every bulk worker: the
/// cookie jar, credentials, a bounded page cache, the current access token
/// and the gate that spaces outgoing requests.
///
/// Cheap to clone; clones share the same state. The jar serializes its own
/// writes, so redirects that set cookies from concurrent workers are safe.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    jar: Arc<Jar>,
    credentials: Credentials,
    pages: RwLock<PageCache>,
    token: RwLock<Option<AccessToken>>,
    pacing: Duration,
    next_request: Mutex<Instant>,
}

/// Page bodies keyed by url. Oldest entries are evicted first once
/// `capacity` is reached; a capacity of 0 disables caching.
struct PageCache {
    bodies: HashMap<String, String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl PageCache {
    fn new(capacity: usize) -> Self {
        Self {
            bodies: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, url: &str) -> Option<&String> {
        self.bodies.get(url)
    }

    fn insert(&mut self, url: &str, body: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.bodies.insert(url.to_string(), body.to_string()).is_some() {
            return;
        }
        self.order.push_back(url.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                trace!("Evicting cached page {}", oldest);
                self.bodies.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.bodies.len()
    }
}

impl Session {
    pub fn from_config(config: &Config) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let mut credentials = Credentials {
            sp_dc: config.sp_dc.clone(),
            access_token: config.access_token.clone(),
        };

        if let Some(path) = &config.cookie_file {
            for cookie in auth::load_cookie_file(path)? {
                match Url::parse(&cookie.origin()) {
                    Ok(origin) => jar.add_cookie_str(&cookie.to_set_cookie(), &origin),
                    Err(e) => {
                        warn!("Skipping cookie {} for bad domain: {}", cookie.name, e);
                        continue;
                    }
                }
                if cookie.name == SESSION_COOKIE && credentials.sp_dc.is_none() {
                    credentials.sp_dc = Some(cookie.value);
                }
            }
        }

        if let Some(sp_dc) = &config.sp_dc {
            if let Ok(origin) = Url::parse(SPOTIFY_ORIGIN) {
                let cookie = format!("{}={}; Domain=.spotify.com; Path=/; Secure", SESSION_COOKIE, sp_dc);
                jar.add_cookie_str(&cookie, &origin);
            }
        }

        let capacity = if config.cache_pages {
            config.page_cache_capacity
        } else {
            0
        };
        debug!(
            "Session created (authenticated={}, page cache={}, pacing={:?})",
            !credentials.is_empty(),
            capacity,
            config.pacing_delay
        );

        Ok(Self::with_parts(jar, credentials, capacity, config.pacing_delay))
    }

    /// A session with no credentials, the default cache and no pacing.
    pub fn anonymous() -> Self {
        Self::with_credentials(Credentials::default())
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self::with_parts(
            Arc::new(Jar::default()),
            credentials,
            DEFAULT_PAGE_CACHE_CAPACITY,
            Duration::ZERO,
        )
    }

    fn with_parts(jar: Arc<Jar>, credentials: Credentials, capacity: usize, pacing: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                jar,
                credentials,
                pages: RwLock::new(PageCache::new(capacity)),
                token: RwLock::new(None),
                pacing,
                next_request: Mutex::new(Instant::now()),
            }),
        }
    }

    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.inner.jar)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn is_authenticated(&self) -> bool {
        !self.inner.credentials.is_empty()
    }

    pub async fn cached_page(&self, url: &str) -> Option<String> {
        self.inner.pages.read().await.get(url).cloned()
    }

    pub async fn store_page(&self, url: &str, body: &str) {
        self.inner.pages.write().await.insert(url, body);
    }

    pub async fn cached_page_count(&self) -> usize {
        self.inner.pages.read().await.len()
    }

    /// Wait for this request's turn. Successive callers are released at
    /// least `pacing` apart, across clones and concurrent tasks.
    pub async fn pace(&self) {
        if self.inner.pacing.is_zero() {
            return;
        }
        let release_at = {
            let mut next = self.inner.next_request.lock().await;
            let now = Instant::now();
            let release_at = (*next).max(now);
            *next = release_at + self.inner.pacing;
            release_at
        };
        let wait = release_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            trace!("Pacing request for {:?}", wait);
        }
        tokio::time::sleep_until(release_at).await;
    }

    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.inner
            .token
            .read()
            .await
            .as_ref()
            .filter(|t| !t.is_expired())
            .cloned()
    }

    pub async fn store_token(&self, token: AccessToken) {
        *self.inner.token.write().await = Some(token);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("pacing", &self.inner.pacing)
            .finish()
    }
}
