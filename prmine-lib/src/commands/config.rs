use crate::Result;
use crate::hosting::{AdmissionPolicy, CrawlerConfig, RetryPolicy};
use camino::{Utf8Path, Utf8PathBuf};
use core::num::NonZeroUsize;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the data directory
pub const CONFIG_FILE_NAME: &str = "prmine.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URL of the GitHub REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Pull requests requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Hard ceiling on pages fetched per repository
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub retry_base_delay: Duration,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Longest wait for a rate-limit reset before a repository is given up
    #[serde(default = "default_max_rate_limit_wait", with = "humantime_serde")]
    pub max_rate_limit_wait: Duration,

    #[serde(default = "default_max_concurrent_repos")]
    pub max_concurrent_repos: usize,

    /// Number of equal-width periods a project's lifetime is divided into
    #[serde(default = "default_periods")]
    pub periods: NonZeroUsize,

    #[serde(default = "default_admission_min")]
    pub admission_min: u64,

    #[serde(default = "default_true")]
    pub admission_min_inclusive: bool,

    /// Absent means no upper bound
    #[serde(default)]
    pub admission_max: Option<u64>,

    #[serde(default = "default_true")]
    pub admission_max_inclusive: bool,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

const fn default_page_size() -> u8 {
    100
}

const fn default_max_pages() -> u32 {
    500
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

const fn default_max_retry_attempts() -> u32 {
    3
}

const fn default_max_rate_limit_wait() -> Duration {
    Duration::from_hours(1)
}

const fn default_max_concurrent_repos() -> usize {
    4
}

const fn default_periods() -> NonZeroUsize {
    NonZeroUsize::new(10).expect("10 is not zero")
}

const fn default_admission_min() -> u64 {
    100
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from an explicit file, or from `prmine.toml` in the data directory,
    /// falling back to defaults when neither exists.
    pub fn load(data_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading prmine configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = data_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading prmine configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{parent}'"))?;
        }

        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url).into_app_err_with(|| format!("api_base_url '{}' is not a valid URL", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(app_err!("api_base_url must use http or https, got '{}'", url.scheme()));
        }

        if !(1..=100).contains(&self.page_size) {
            return Err(app_err!("page_size must be between 1 and 100, got {}", self.page_size));
        }

        if self.max_pages == 0 {
            return Err(app_err!("max_pages must be at least 1"));
        }

        if self.max_concurrent_repos == 0 {
            return Err(app_err!("max_concurrent_repos must be at least 1"));
        }

        let policy = self.admission_policy();
        if !policy.is_satisfiable() {
            return Err(app_err!("admission bounds {policy} do not admit any pull request count"));
        }

        Ok(())
    }

    /// Crawler settings derived from this configuration
    #[must_use]
    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig {
            api_base_url: self.api_base_url.clone(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            retry: RetryPolicy {
                max_retry_attempts: self.max_retry_attempts,
                base_delay: self.retry_base_delay,
                request_timeout: self.request_timeout,
            },
            max_rate_limit_wait: self.max_rate_limit_wait,
            max_concurrent_requests: self.max_concurrent_repos,
        }
    }

    /// Admission bounds derived from this configuration
    #[must_use]
    pub const fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            min: self.admission_min,
            min_inclusive: self.admission_min_inclusive,
            max: self.admission_max,
            max_inclusive: self.admission_max_inclusive,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
