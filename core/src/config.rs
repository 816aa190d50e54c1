//! Builder configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

/// Bodies with a declared length below this are sent as an in-memory field.
pub const STRING_BODY_THRESHOLD: u64 = 1_000_000;

pub const DEFAULT_CONNECT_TIMEOUT_MS: i64 = 150;

/// Features of the engine that change which options the builder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCapabilities {
    /// The engine can restrict the allowed protocols.
    pub protocols: bool,
    /// The engine accepts millisecond timeouts.
    pub ms_timeouts: bool,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self {
            protocols: true,
            ms_timeouts: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub string_body_threshold: u64,
    pub connect_timeout_ms: i64,
    pub capabilities: EngineCapabilities,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            string_body_threshold: STRING_BODY_THRESHOLD,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            capabilities: EngineCapabilities::default(),
        }
    }
}

impl BuilderConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = BuilderConfig::from_json("{}").unwrap();
        assert_eq!(config, BuilderConfig::default());
        assert_eq!(config.string_body_threshold, 1_000_000);
        assert_eq!(config.connect_timeout_ms, 150);
        assert!(config.capabilities.protocols);
    }

    #[test]
    fn partial_capabilities_keep_other_defaults() {
        let config = BuilderConfig::from_json(r#"{"capabilities":{"ms_timeouts":false}}"#).unwrap();
        assert!(!config.capabilities.ms_timeouts);
        assert!(config.capabilities.protocols);
    }

    #[test]
    fn unknown_shape_is_rejected() {
        assert!(BuilderConfig::from_json(r#"{"connect_timeout_ms":"soon"}"#).is_err());
    }
}
