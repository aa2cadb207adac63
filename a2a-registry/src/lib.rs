//! Capability discovery, composition, and execution, plus path-based parameter transformation
//! between mismatched capability schemas.

mod error;
mod graph;
mod registry;
mod transform;
mod types;

pub use error::{RegistryError, TransformError};
pub use registry::CapabilityRegistry;
pub use transform::{ParameterMapping, TransformationEngine, Validation};
pub use types::{
    CapabilityDescriptor, CapabilityFilter, CapabilityWrapper, Composition, CompositionStrategy, ErrorPolicy, ExecutionContext,
    PerformanceBounds, PerformanceBoundsSerde, SharedWrapper,
};
