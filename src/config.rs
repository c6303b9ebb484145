use std::path::PathBuf;
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::{Result, PAGE_SIZE, PORTAL_URL, TARGET_URL};

const CONFIG_FILE: &str = "estado_diario";
const ENV_PREFIX: &str = "ESTADO";

/// Runtime knobs for one crawl. Every field has a default, so an empty
/// environment yields a working configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Base URL that relative document links are joined onto.
    pub portal_url: String,
    /// Login landing page. Being on it means the session is gone.
    pub target_url: String,
    pub webdriver_url: String,
    pub headless: bool,

    /// Fixed pause between UI steps, in milliseconds.
    pub delay_ms: u64,
    /// Pause after typing credentials before the login counts as done.
    pub login_settle_ms: u64,
    /// Default timeout for every selector wait, in milliseconds.
    pub timeout_ms: u64,
    /// How long to wait for a loader to show up before assuming it won't.
    pub loader_timeout_ms: u64,
    /// Timeout of a single banner probe.
    pub banner_timeout_ms: u64,
    /// Timeout for the recipients table or its empty notice.
    pub recipients_timeout_ms: u64,

    pub max_attempts: u32,
    /// Upper bound on "link expired" reload cycles per report date.
    pub max_reloads: u32,
    pub page_size: usize,

    pub screenshot_path: PathBuf,
    pub output_path: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            portal_url: PORTAL_URL.into(),
            target_url: TARGET_URL.into(),
            webdriver_url: "http://localhost:4444".into(),
            headless: true,
            delay_ms: 1000,
            login_settle_ms: 1000,
            timeout_ms: 30_000,
            loader_timeout_ms: 5_000,
            banner_timeout_ms: 1_000,
            recipients_timeout_ms: 5_000,
            max_attempts: 3,
            max_reloads: 10,
            page_size: PAGE_SIZE,
            screenshot_path: "error.png".into(),
            output_path: "estado_diario.json".into(),
        }
    }
}

impl CrawlConfig {
    /// Loads `estado_diario.{toml,yaml,json}` if present, then `ESTADO__*`
    /// environment variables on top.
    pub fn load() -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn loader_timeout(&self) -> Duration {
        Duration::from_millis(self.loader_timeout_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }

    pub fn recipients_timeout(&self) -> Duration {
        Duration::from_millis(self.recipients_timeout_ms)
    }

    /// Profile with no pauses, used against in-process portals.
    pub fn immediate() -> Self {
        Self {
            delay_ms: 0,
            login_settle_ms: 0,
            timeout_ms: 50,
            loader_timeout_ms: 10,
            banner_timeout_ms: 10,
            recipients_timeout_ms: 10,
            ..Self::default()
        }
    }
}
