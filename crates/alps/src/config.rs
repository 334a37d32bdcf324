use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::AlpsResult;

/// Runtime configuration, usually loaded from a `alps.toml` file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlpsConfig {
    pub session: SessionConfig,
    pub interceptor: InterceptorConfig,
    pub target: TargetConfig,
    pub http: HttpConfig,
}

impl AlpsConfig {
    pub fn load(path: impl AsRef<Path>) -> AlpsResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> AlpsResult<Self> {
        Ok(toml::from_str(data)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Keep the user's presentation choice when playback moves to another period.
    pub persistence_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persistence_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Segments declaring more bytes than this are passed through untouched.
    pub max_segment_bytes: u64,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: i32::MAX as u64,
        }
    }
}

/// Describes the elementary stream the engine understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub container_mime: String,
    pub sample_mime: String,
    /// Suffixes of resource paths that may carry fragmented container data.
    pub segment_extensions: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            container_mime: "audio/mp4".to_string(),
            sample_mime: "audio/ac4".to_string(),
            segment_extensions: vec!["mp4".to_string(), "m4s".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Extra headers in `Name: value` form.
    pub headers: Vec<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: None,
            headers: Vec::new(),
        }
    }
}
