//! Configuration for exchange regions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default payload capacity (64 KiB)
pub const DEFAULT_PAYLOAD_CAPACITY: u32 = 64 * 1024;

/// Default region permissions: read/write for owner, group and others
pub const DEFAULT_MODE: u32 = 0o666;

/// Default region lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Default prefix for derived region names
pub const DEFAULT_NAME_PREFIX: &str = "ocdm";

/// What happens to the sub-sample area when a length is declared without data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubSampleFill {
    /// Zero the declared range so no bytes from a previous exchange remain
    #[default]
    Zero,
    /// Leave the area as it is; the producer filled it some other way
    Preserve,
}

/// Configuration for creating exchange regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Prefix used when deriving per-session region names
    pub name_prefix: String,

    /// Payload capacity in bytes
    pub payload_capacity: u32,

    /// Permission bits applied to newly created regions
    pub mode: u32,

    /// Sub-sample declare policy
    pub sub_sample_fill: SubSampleFill,

    /// Region lock timeout (in milliseconds)
    pub lock_timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            payload_capacity: DEFAULT_PAYLOAD_CAPACITY,
            mode: DEFAULT_MODE,
            sub_sample_fill: SubSampleFill::Zero,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl ExchangeConfig {
    /// Create a new configuration with the specified payload capacity
    pub fn new(payload_capacity: u32) -> Self {
        Self {
            payload_capacity,
            ..Default::default()
        }
    }

    /// Set the payload capacity
    #[must_use]
    pub const fn with_payload_capacity(mut self, capacity: u32) -> Self {
        self.payload_capacity = capacity;
        self
    }

    /// Set the permission bits for created regions
    #[must_use]
    pub const fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Set the sub-sample declare policy
    #[must_use]
    pub const fn with_sub_sample_fill(mut self, fill: SubSampleFill) -> Self {
        self.sub_sample_fill = fill;
        self
    }

    /// Set the region lock timeout
    #[must_use]
    pub const fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Set the region name prefix
    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Region lock timeout as a `Duration`
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Derive a region name from the prefix and a list of components
    pub fn region_name(&self, parts: &[&str]) -> String {
        let mut name = self.name_prefix.clone();
        for part in parts {
            name.push('-');
            name.push_str(part);
        }
        name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExchangeConfig::default();
        assert_eq!(config.payload_capacity, DEFAULT_PAYLOAD_CAPACITY);
        assert_eq!(config.mode, 0o666);
        assert_eq!(config.sub_sample_fill, SubSampleFill::Zero);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let config = ExchangeConfig::new(4096)
            .with_mode(0o600)
            .with_sub_sample_fill(SubSampleFill::Preserve)
            .with_lock_timeout_ms(100)
            .with_name_prefix("cdm");
        assert_eq!(config.payload_capacity, 4096);
        assert_eq!(config.mode, 0o600);
        assert_eq!(config.sub_sample_fill, SubSampleFill::Preserve);
        assert_eq!(config.lock_timeout(), Duration::from_millis(100));
        assert_eq!(config.region_name(&["host", "7"]), "cdm-host-7");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExchangeConfig =
            serde_json::from_str(r#"{"payload_capacity": 1024, "sub_sample_fill": "preserve"}"#)
                .unwrap();
        assert_eq!(config.payload_capacity, 1024);
        assert_eq!(config.sub_sample_fill, SubSampleFill::Preserve);
        assert_eq!(config.name_prefix, DEFAULT_NAME_PREFIX);
        assert_eq!(config.mode, DEFAULT_MODE);
    }

    #[test]
    fn test_json_round_trip() {
        let config = ExchangeConfig::new(512).with_name_prefix("x");
        let json = serde_json::to_string(&config).unwrap();
        let loaded: ExchangeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }
}
