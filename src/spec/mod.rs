//! Spec pipeline: turns a natural-language task description into a reviewed,
//! written spec artifact by running a fixed discovery/complexity prefix
//! followed by a complexity-tier-driven phase sequence.

pub mod agent_phase;
pub mod complexity;
pub mod discovery;
pub mod error;
pub mod impact;
pub mod impact_phase;
pub mod pipeline;

pub use agent_phase::AgentPhase;
pub use complexity::{ComplexityAssessment, ComplexityTier};
pub use discovery::{DiscoveryPhase, ProjectIndex, ServiceInfo};
pub use error::PipelineError;
pub use impact::{BreakingChange, DependencyGraph, ImpactReport, ImpactSeverity};
pub use impact_phase::ImpactPhase;
pub use pipeline::{Phase, Pipeline, PipelineContext, WorkflowType};
