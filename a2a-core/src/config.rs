use serde::{Deserialize, Serialize};

/// Local node identity and binding settings.
///
/// Layered from, in increasing precedence: built-in defaults, an optional `config.toml` (or
/// `.yaml`/`.json`, anything the `config` crate's format auto-detection recognizes) next to the
/// binary, then `A2A_*` environment variables. Subsystem-specific settings (consensus timeouts,
/// optimizer thresholds, …) live in each subsystem crate's own config type and are assembled
/// alongside this one by the binary crate, not nested inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Stable identifier for this node, distinct from any single agent's [`crate::AgentId`] —
    /// a node may host several agents over its lifetime.
    pub node_id: String,

    pub display_name: String,

    /// Address services on this node bind to.
    pub bind_address: String,

    pub port: u16,

    /// Externally reachable address, when it differs from `bind_address` (NAT, reverse proxy).
    pub external_address: Option<String>,
}

impl NodeConfig {
    /// Load from `config.{toml,yaml,json}` if present, falling back to defaults, with `A2A_`
    /// prefixed environment variables (`A2A_PORT`, `A2A_BIND_ADDRESS`, …) taking precedence over
    /// either.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&defaults)?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("A2A").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: uuid::Uuid::new_v4().to_string(),
            display_name: "a2a-node".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 7420,
            external_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_to_loopback() {
        let config = NodeConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 7420);
    }
}
