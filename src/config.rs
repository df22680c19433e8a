use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::multipart::{BoundaryStrategy, ParseMode};
use crate::{BatchError, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// A HEAD response without `X-CSRF-Token` aborts the batch.
    #[default]
    Required,
    /// A missing token sends the batch without the header. Transport
    /// failures on the HEAD request still abort.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Service root; `$batch` is appended verbatim, so it normally ends in `/`.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub http_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub http_query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub token_policy: TokenPolicy,
    #[serde(default)]
    pub boundary: BoundaryStrategy,
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl BatchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            http_headers: BTreeMap::new(),
            http_query_params: BTreeMap::new(),
            token_policy: TokenPolicy::default(),
            boundary: BoundaryStrategy::default(),
            parse_mode: ParseMode::default(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(contents)
            .map_err(|err| BatchError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|err| BatchError::Config(format!("{}: {err}", path.display())))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_url(&self) -> String {
        format!("{}$batch", self.base_url)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(BatchError::Config("base_url must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(BatchError::Config("timeout_secs must be positive".to_string()));
        }
        if self.max_response_bytes == 0 {
            return Err(BatchError::Config(
                "max_response_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
