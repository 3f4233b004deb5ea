//! User options
//!
//! Options come from a `key=value` file in the player's script-opts
//! directory. Lines starting with `#` are comments. Unknown keys and invalid
//! values are ignored with a warning.

use crate::Result;
use danmaku_client::ClientConfig;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Smallest accepted `font_size`, the lower bound of mpv's `osd-font-size`
const MIN_FONT_SIZE: f64 = 1.0;

/// Options read from the user's configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DanmakuOptions {
    /// Font size replacing the host's `osd-font-size`
    pub font_size: Option<f64>,
    /// Base URL of the comment service
    pub api_url: Option<String>,
    /// Request timeout
    pub timeout: Option<Duration>,
}

impl DanmakuOptions {
    /// Parses options from the contents of a configuration file
    pub fn parse(text: &str) -> Self {
        let mut options = Self::default();
        for line in text.lines() {
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "font_size" => options.font_size = parse_at_least(key, value, MIN_FONT_SIZE),
                "api_url" => options.api_url = (!value.is_empty()).then(|| value.to_string()),
                "timeout" => options.timeout = parse_timeout(key, value),
                _ => warn!(key, "ignoring unknown option"),
            }
        }
        options
    }

    /// Loads options from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Builds the comment service client configuration
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.api_url {
            config.base_url = url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        config
    }
}

fn parse_at_least(key: &str, value: &str, min: f64) -> Option<f64> {
    let parsed = value.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= min);
    if parsed.is_none() {
        warn!(key, value, "ignoring invalid option value");
    }
    parsed
}

fn parse_timeout(key: &str, value: &str) -> Option<Duration> {
    let parsed = value
        .parse::<f64>()
        .ok()
        .filter(|v| *v > 0.0)
        .and_then(|v| Duration::try_from_secs_f64(v).ok());
    if parsed.is_none() {
        warn!(key, value, "ignoring invalid option value");
    }
    parsed
}
