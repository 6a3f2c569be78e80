//! Service configuration, read from the host's JSON configuration line.
//!
//! ```json
//! {
//!   "systems": [
//!     { "name": "com.widevine.alpha", "designators": ["video/webm", "video/mp4"] }
//!   ],
//!   "exchange": { "payload_capacity": 65536, "sub_sample_fill": "zero" }
//! }
//! ```

use ocdm_exchange::ExchangeConfig;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One supported key system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySystemConfig {
    /// Key system identifier, e.g. `com.widevine.alpha`
    pub name: String,

    /// Designators (license or content type configurations) it accepts
    #[serde(default)]
    pub designators: Vec<String>,
}

impl KeySystemConfig {
    /// Create a key system entry.
    pub fn new<I, S>(name: impl Into<String>, designators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            designators: designators.into_iter().map(Into::into).collect(),
        }
    }
}

/// Configuration of a decryption service instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Key systems, in registration order
    pub systems: Vec<KeySystemConfig>,

    /// Settings for per-session exchange regions
    pub exchange: ExchangeConfig,
}

impl ServiceConfig {
    /// Parse a configuration line. An empty line yields the default.
    pub fn from_json(line: &str) -> Result<Self> {
        if line.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(line)?)
    }

    /// Add a key system
    #[must_use]
    pub fn with_system(mut self, system: KeySystemConfig) -> Self {
        self.systems.push(system);
        self
    }

    /// Replace the exchange settings
    #[must_use]
    pub fn with_exchange(mut self, exchange: ExchangeConfig) -> Self {
        self.exchange = exchange;
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use ocdm_exchange::SubSampleFill;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_line_is_default() {
        assert_eq!(ServiceConfig::from_json("").expect("parse"), ServiceConfig::default());
        assert_eq!(ServiceConfig::from_json("  ").expect("parse"), ServiceConfig::default());
    }

    #[test]
    fn test_parse_full_line() {
        let line = r#"{
            "systems": [
                { "name": "com.widevine.alpha", "designators": ["video/mp4"] },
                { "name": "org.w3.clearkey" }
            ],
            "exchange": { "payload_capacity": 1024, "sub_sample_fill": "preserve" }
        }"#;
        let config = ServiceConfig::from_json(line).expect("parse");

        assert_eq!(
            config.systems,
            vec![
                KeySystemConfig::new("com.widevine.alpha", ["video/mp4"]),
                KeySystemConfig::new("org.w3.clearkey", Vec::<String>::new()),
            ]
        );
        assert_eq!(config.exchange.payload_capacity, 1024);
        assert_eq!(config.exchange.sub_sample_fill, SubSampleFill::Preserve);
        // Unset exchange fields keep their defaults
        assert_eq!(config.exchange.mode, 0o666);
    }

    #[test]
    fn test_malformed_line() {
        assert!(matches!(
            ServiceConfig::from_json("{ systems: "),
            Err(ServiceError::Config(_))
        ));
    }
}
