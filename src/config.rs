use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ScrapeError};
use crate::media::{OverwritePolicy, QualityPreference};
use crate::transport::{DEFAULT_PAGE_CACHE_CAPACITY, TransportStrategy};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportStrategy,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub proxy: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub sp_dc: Option<String>,
    pub access_token: Option<String>,
    pub pacing_delay: Duration,
    pub concurrency: usize,
    pub item_timeout: Duration,
    pub output_dir: PathBuf,
    pub quality: QualityPreference,
    pub overwrite: OverwritePolicy,
    pub browser_path: PathBuf,
    pub user_agent: String,
    pub cache_pages: bool,
    pub page_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportStrategy::Auto,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(8),
            proxy: None,
            cookie_file: None,
            sp_dc: None,
            access_token: None,
            pacing_delay: Duration::from_millis(500),
            concurrency: 4,
            item_timeout: Duration::from_secs(60),
            output_dir: PathBuf::from("downloads"),
            quality: QualityPreference::default(),
            overwrite: OverwritePolicy::Skip,
            browser_path: PathBuf::from("chromium"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_pages: true,
            page_cache_capacity: DEFAULT_PAGE_CACHE_CAPACITY,
        }
    }
}

impl Config {
    /// Load `.env` (if any) and apply `SPOTIFY_SCRAPER_*` overrides on top of
    /// the defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(v) = env_parse("SPOTIFY_SCRAPER_TRANSPORT")? {
            config.transport = v;
        }
        if let Some(secs) = env_parse::<u64>("SPOTIFY_SCRAPER_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = env_parse("SPOTIFY_SCRAPER_MAX_RETRIES")? {
            config.max_retries = v;
        }
        if let Some(ms) = env_parse::<u64>("SPOTIFY_SCRAPER_PACING_MS")? {
            config.pacing_delay = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse("SPOTIFY_SCRAPER_CONCURRENCY")? {
            config.concurrency = v;
        }
        if let Some(secs) = env_parse::<u64>("SPOTIFY_SCRAPER_ITEM_TIMEOUT_SECS")? {
            config.item_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = env_parse("SPOTIFY_SCRAPER_QUALITY")? {
            config.quality = v;
        }
        if let Some(v) = env_parse("SPOTIFY_SCRAPER_OVERWRITE")? {
            config.overwrite = v;
        }
        if let Some(v) = env_parse("SPOTIFY_SCRAPER_CACHE_PAGES")? {
            config.cache_pages = v;
        }
        if let Some(v) = env_parse("SPOTIFY_SCRAPER_PAGE_CACHE_CAPACITY")? {
            config.page_cache_capacity = v;
        }

        config.proxy = env_string("SPOTIFY_SCRAPER_PROXY");
        config.sp_dc = env_string("SPOTIFY_SCRAPER_SP_DC");
        config.access_token = env_string("SPOTIFY_SCRAPER_TOKEN");
        config.cookie_file = env_string("SPOTIFY_SCRAPER_COOKIE_FILE").map(PathBuf::from);

        if let Some(dir) = env_string("SPOTIFY_SCRAPER_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_string("SPOTIFY_SCRAPER_BROWSER") {
            config.browser_path = PathBuf::from(path);
        }
        if let Some(ua) = env_string("SPOTIFY_SCRAPER_USER_AGENT") {
            config.user_agent = ua;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ScrapeError::Config("concurrency must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(ScrapeError::Config("timeout must be non-zero".into()));
        }
        if self.quality.classes().is_empty() {
            return Err(ScrapeError::Config("quality preference is empty".into()));
        }
        Ok(())
    }

    /// Whether any authentication material is configured.
    pub fn has_credentials(&self) -> bool {
        self.sp_dc.is_some() || self.access_token.is_some() || self.cookie_file.is_some()
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ScrapeError::Config(format!("{} has invalid value '{}': {}", name, raw, e))),
        None => Ok(None),
    }
}
