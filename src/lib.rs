#![forbid(unsafe_code)]

//! # arlo
//!
//! Turns a list of natural-language requirements into architectural pattern
//! decisions.
//!
//! A language model flags the architecturally-significant requirements and
//! the quality attributes and condition each one names. Requirements whose
//! conditions mean the same thing are grouped (embedding clustering, then
//! pairwise equivalence checks), the groups are partitioned into sets that
//! can hold at the same time, and for each set one pattern per category is
//! chosen from a quality/pattern scoring matrix, either exactly (0/1
//! integer program) or greedily.
//!
//! The model sits behind the [`TextOracle`] and [`EmbeddingOracle`] traits;
//! [`ProviderGateway`] implements both against a local Ollama server.

pub mod architect;
pub mod clustering;
pub mod concern;
pub mod gateway;
pub mod grouping;
pub mod matrix;
pub mod optimizer;
pub mod oracle;
pub mod partition;
pub mod prompts;
pub mod quality;
pub mod report;
pub mod requirements;
pub mod weights;

pub use architect::{AnalysisConfig, AnalysisError, AnalysisOutcome, Architect};
pub use concern::Concern;
pub use gateway::{GatewayConfig, ProviderError, ProviderGateway, TracingUsageSink, UsageSink};
pub use grouping::{ConditionGroup, ConditionGrouper};
pub use matrix::{MatrixError, PatternRow, ScoringMatrix};
pub use optimizer::{
    optimize, Decision, OptimizeError, OptimizerMode, QualityScore, Selection, SolveStatus,
    Weights,
};
pub use oracle::{EmbeddingOracle, TextOracle};
pub use partition::{Partitioner, SatisfiableGroup};
pub use quality::QualityAttribute;
pub use report::render_report;
pub use requirements::{Requirement, RequirementParser, RequirementSet};
pub use weights::{compute_weights, normalize, WeightsMode};
