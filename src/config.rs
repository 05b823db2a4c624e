use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://alleburgen.de/";

/// Highest detail page id seen on the site when the crawl was set up.
pub const DEFAULT_TOTAL_ID_COUNT: u32 = 35653;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub total_id_count: u32,
    pub concurrency_limit: usize,
    pub image_concurrency: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            total_id_count: DEFAULT_TOTAL_ID_COUNT,
            concurrency_limit: 10,
            image_concurrency: 1,
            retry_attempts: 5,
            retry_delay_ms: 2000,
            request_timeout_secs: 30,
            db_path: PathBuf::from("data/castles.sqlite"),
        }
    }
}

/// File source first, environment on top.
fn layered<F>(file: F, env: Environment) -> ConfigBuilder<DefaultState>
where
    F: config::Source + Send + Sync + 'static,
{
    Config::builder()
        .add_source(file)
        .add_source(env.try_parsing(true))
}

impl Settings {
    /// Defaults, then `castle_crawler.{toml,json,yaml}` if present, then `CASTLE_*` env vars.
    pub fn load() -> Result<Self> {
        Self::from_builder(layered(
            File::with_name("castle_crawler").required(false),
            Environment::with_prefix("CASTLE"),
        ))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.normalized()
    }

    /// Trailing slash on the base URL, then validation.
    pub fn normalized(mut self) -> Result<Self> {
        self.base_url = self.base_url.trim().to_string();
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            bail!("base_url must start with http:// or https://, got {:?}", self.base_url);
        }
        if self.concurrency_limit == 0 {
            bail!("concurrency_limit must be at least 1");
        }
        if self.image_concurrency == 0 {
            bail!("image_concurrency must be at least 1");
        }
        if self.retry_attempts == 0 {
            bail!("retry_attempts must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
