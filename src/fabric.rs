use std::sync::Arc;

use a2a_consensus::{election_algorithm, ByzantineEvidence, ByzantineTracker, PbftEngine, ViewChangeCoordinator};
use a2a_core::{Agent, AgentId, AgentRegistry, TrustLevel};
use a2a_crypto::{CryptoProvider, Ed25519Blake3Provider, KeyPair};
use a2a_optimizer::{CircuitBreakerRegistry, IntelligentCache, LoadBalancer};
use a2a_registry::CapabilityRegistry;
use a2a_security::{AnomalyEvidence, AnomalySink, SecurityIntegrator};
use a2a_smr::StateMachine;
use a2a_transport::{InMemoryTransport, Transport};
use a2a_voting::VotingEngine;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::FabricConfig;

/// Forwards identity/authorization anomalies into the same suspicion ledger the consensus
/// protocol's own fault detector reports to, so a node that's spamming denied actions or
/// presenting a mismatched key gets suspended the same way a double-voting leader would.
struct ByzantineAnomalyBridge {
    tracker: Arc<ByzantineTracker>,
}

impl AnomalySink for ByzantineAnomalyBridge {
    fn record(&self, agent_id: AgentId, evidence: AnomalyEvidence) {
        let detail = match evidence {
            AnomalyEvidence::RepeatedAuthorizationDenial { action, attempts } => {
                format!("{attempts} denied attempts at {action}")
            }
            AnomalyEvidence::KeyMismatch => "authenticated key mismatch".to_string(),
            AnomalyEvidence::RateLimitExceeded { observed, limit } => {
                format!("rate limit exceeded: {observed}/{limit}")
            }
        };
        self.tracker.report(ByzantineEvidence::SecurityAnomaly { agent: agent_id, detail });
    }
}

/// Top-level handle on every subsystem a node runs, wired together in dependency order:
/// identity and security first, then the state machine consensus replicates onto, then consensus
/// itself, with voting/capability-registry/optimizer layered alongside as independent
/// collaborators rather than nested inside the consensus kernel.
pub struct Fabric {
    pub node_id: AgentId,
    pub registry: AgentRegistry,
    pub security: Arc<SecurityIntegrator>,
    pub byzantine: Arc<ByzantineTracker>,
    pub state_machine: Arc<StateMachine>,
    pub consensus: Arc<PbftEngine>,
    pub voting: Arc<VotingEngine>,
    pub capabilities: Arc<CapabilityRegistry>,
    pub circuit_breakers: Arc<CircuitBreakerRegistry>,
    pub cache: Arc<IntelligentCache>,
    pub load_balancer: Arc<LoadBalancer>,
    shutdown: CancellationToken,
}

impl Fabric {
    pub async fn new(config: FabricConfig) -> Result<Self> {
        info!(node_id = %config.node.node_id, display_name = %config.node.display_name, "initializing fabric components");

        let keys = KeyPair::generate();
        let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Blake3Provider);

        let registry = AgentRegistry::new();
        let agent = Agent::new(keys.public_key());
        let node_id = agent.id;
        registry.register(agent)?;
        registry.activate(&node_id)?;
        registry.update_trust(&node_id, TrustLevel::Trusted)?;

        let byzantine = Arc::new(ByzantineTracker::new(registry.clone(), config.byzantine_evidence_threshold));

        let sink: Arc<dyn AnomalySink> = Arc::new(ByzantineAnomalyBridge { tracker: byzantine.clone() });
        let security = Arc::new(SecurityIntegrator::new(sink));
        security.bind_identity(node_id, keys.public_key(), TrustLevel::Trusted)?;

        let state_machine = Arc::new(StateMachine::with_config(
            a2a_smr::SmrConfig::default(),
            a2a_smr::ConflictStrategy::LastWriterWins,
            registry.clone(),
        ));

        let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
        let view_change = Arc::new(ViewChangeCoordinator::new(election_algorithm(&config.consensus)));

        let consensus = Arc::new(
            PbftEngine::new(
                node_id,
                keys,
                config.consensus,
                crypto,
                transport,
                registry.clone(),
                state_machine.clone(),
                view_change,
                byzantine.clone(),
            )
            .with_security(security.clone()),
        );

        let voting = Arc::new(VotingEngine::new());
        let capabilities = Arc::new(CapabilityRegistry::new());
        let circuit_breakers = Arc::new(CircuitBreakerRegistry::new());
        let cache = Arc::new(IntelligentCache::new());
        let load_balancer = Arc::new(LoadBalancer::new(vec![node_id.to_string()]));

        info!(%node_id, "fabric components initialized");

        Ok(Self {
            node_id,
            registry,
            security,
            byzantine,
            state_machine,
            consensus,
            voting,
            capabilities,
            circuit_breakers,
            cache,
            load_balancer,
            shutdown: CancellationToken::new(),
        })
    }

    /// Starts the background maintenance loop and returns once it's spawned — the fabric is
    /// usable for consensus/voting/registry calls immediately, this just begins its housekeeping
    /// (a periodic heartbeat over the response cache and circuit breakers; cache entries expire
    /// lazily on read, so there's nothing to sweep proactively yet).
    pub async fn start(&self) -> Result<()> {
        info!("starting fabric background maintenance");

        let cache = self.cache.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tracing::debug!(cached_responses = cache.len(), "fabric heartbeat");
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });

        info!("fabric started");
        Ok(())
    }

    /// Signals the maintenance loop to stop. In-flight consensus or registry calls are not
    /// cancelled — this only tears down the background task, mirroring how the rest of the
    /// fabric has no long-lived I/O loop of its own to drain.
    pub async fn stop(&self) -> Result<()> {
        info!("stopping fabric");
        self.shutdown.cancel();
        info!("fabric stopped");
        Ok(())
    }
}
