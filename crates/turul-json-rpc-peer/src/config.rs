//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::PeerError;

/// Settings shared by every connection an engine creates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix of generated call ids
    pub call_id_prefix: String,

    /// Upper bound on outstanding calls per connection (`None` = unbounded)
    pub max_pending_calls: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_id_prefix: "req".to_string(),
            max_pending_calls: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), PeerError> {
        if self.call_id_prefix.is_empty() {
            return Err(PeerError::Config("call_id_prefix must not be empty".to_string()));
        }
        if self.max_pending_calls == Some(0) {
            return Err(PeerError::Config(
                "max_pending_calls must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.call_id_prefix, "req");
        assert!(config.max_pending_calls.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = EngineConfig {
            max_pending_calls: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PeerError::Config(_))));
    }
}
