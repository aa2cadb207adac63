use serde::{Deserialize, Serialize};

/// Assembles every subsystem's own config type into the one settings surface the binary loads
/// and passes down, per `a2a_core::NodeConfig`'s documented convention that the node identity
/// type stays unaware of the subsystems built on top of it.
///
/// Only the knobs a deployer would reasonably want to override from `config.toml`/env end up
/// here — [`a2a_smr::SmrConfig`] and the optimizer's circuit-breaker/cache constants are left as
/// in-process construction defaults rather than threaded through this struct, since neither type
/// implements `Serialize` today and neither has needed external tuning in practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    pub node: a2a_core::NodeConfig,
    pub consensus: a2a_consensus::ConsensusConfig,
    /// Number of recorded evidence reports against an agent before the Byzantine tracker
    /// suspends it from the active set.
    pub byzantine_evidence_threshold: u32,
}

impl FabricConfig {
    /// Load from `config.{toml,yaml,json}` if present, falling back to defaults, with `A2A_`
    /// prefixed environment variables (`A2A_NODE__PORT`, `A2A_CONSENSUS__BATCH_SIZE`, …; the
    /// double underscore descends into a nested field) taking precedence over either.
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

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            node: a2a_core::NodeConfig::default(),
            consensus: a2a_consensus::ConsensusConfig::default(),
            byzantine_evidence_threshold: 3,
        }
    }
}
