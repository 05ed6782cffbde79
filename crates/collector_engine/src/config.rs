use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::{ExportOptions, FetchSettings, RequestParams, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "http://apis.data.go.kr/1471000/HtfsInfoService03/getHtfsItem01";

pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_BASE_URL: &str = "COLLECTOR_BASE_URL";
pub const ENV_NUM_OF_ROWS: &str = "COLLECTOR_NUM_OF_ROWS";
pub const ENV_MAX_RETRIES: &str = "COLLECTOR_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "COLLECTOR_RETRY_DELAY_MS";
pub const ENV_OUTPUT_DIR: &str = "COLLECTOR_OUTPUT_DIR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "COLLECTOR_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API_KEY is not set (add it to the environment or a .env file)")]
    MissingApiKey,
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Everything a run needs. The service key is supplied here and nowhere else.
#[derive(Clone)]
pub struct CollectorConfig {
    pub base_url: String,
    pub service_key: String,
    pub num_of_rows: u32,
    pub response_type: String,
    pub retry: RetryPolicy,
    pub fetch: FetchSettings,
    pub export: ExportOptions,
}

impl CollectorConfig {
    pub fn new(service_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            service_key: service_key.into(),
            num_of_rows: 100,
            response_type: "json".to_string(),
            retry: RetryPolicy::default(),
            fetch: FetchSettings::default(),
            export: ExportOptions::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from `lookup`, which returns the raw value of an
    /// environment variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_key = lookup(ENV_API_KEY)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(service_key);

        if let Some(base_url) = non_empty(&lookup, ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(rows) = parse_positive(&lookup, ENV_NUM_OF_ROWS)? {
            config.num_of_rows = rows;
        }
        if let Some(retries) = parse_positive(&lookup, ENV_MAX_RETRIES)? {
            config.retry.max_retries = retries;
        }
        if let Some(raw) = non_empty(&lookup, ENV_RETRY_DELAY_MS) {
            let millis = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: ENV_RETRY_DELAY_MS,
                value: raw.clone(),
                reason: "expected milliseconds",
            })?;
            config.retry.delay = Duration::from_millis(millis);
        }
        if let Some(secs) = parse_positive(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            config.fetch.request_timeout = Duration::from_secs(u64::from(secs));
        }
        if let Some(dir) = non_empty(&lookup, ENV_OUTPUT_DIR) {
            config.export.output_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Request parameters for the first page.
    pub fn request_params(&self) -> RequestParams {
        RequestParams::new(&self.service_key, self.num_of_rows, &self.response_type)
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .field("num_of_rows", &self.num_of_rows)
            .field("response_type", &self.response_type)
            .field("retry", &self.retry)
            .field("fetch", &self.fetch)
            .field("export", &self.export)
            .finish()
    }
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive<F>(lookup: &F, var: &'static str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup, var) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected a positive integer",
        }),
    }
}
