#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("no instances configured for load balancing")]
    NoInstances,

    #[error("circuit for tool {0} is open")]
    CircuitOpen(String),

    #[error("no applicable strategy matched the current metrics")]
    NoApplicableStrategy,
}
