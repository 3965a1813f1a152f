// ============================================================================
// Configuration
// ============================================================================
//
// Declarative description of the actors a process hosts. `kind` names a
// factory registered in the FactoryRegistry; `params` is handed to that
// factory verbatim.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One actor to host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Human-readable name, also used as the worker thread name.
    pub name: String,
    /// Registered actor-type name the factory is looked up under.
    pub kind: String,
    /// Opaque parameters for the factory.
    #[serde(default)]
    pub params: Value,
}

impl ActorConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// A whole system of actors, spawnable in one call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_default_to_null() {
        let config: ActorConfig =
            serde_json::from_value(json!({"name": "reader", "kind": "echo"})).unwrap();
        assert_eq!(config.params, Value::Null);
    }

    #[test]
    fn test_system_config_round_trips() {
        let config = SystemConfig {
            actors: vec![ActorConfig::new("reader", "echo").with_params(json!({"delay_ms": 5}))],
        };
        let text = serde_json::to_string(&config).unwrap();
        let parsed: SystemConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.actors.len(), 1);
        assert_eq!(parsed.actors[0].params, json!({"delay_ms": 5}));
    }
}
