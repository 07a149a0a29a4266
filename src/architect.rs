//! End-to-end analysis: requirements in, concerns out.
//!
//! ```text
//! text ─► RequirementSet ─► RequirementParser ─► ASRs
//!      ─► ConditionGrouper ─► Partitioner ─► per satisfiable group:
//!         weights ─► normalize ─► optimize ─► Concern
//! ```
//!
//! Oracle failures never abort a run; they fall back locally. Only scoring
//! table problems surface as [`AnalysisError`].

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clustering::ClusterConfig;
use crate::concern::Concern;
use crate::grouping::{ConditionGroup, ConditionGrouper};
use crate::matrix::{MatrixError, ScoringMatrix};
use crate::optimizer::{optimize, OptimizeError, OptimizerMode};
use crate::oracle::{EmbeddingOracle, TextOracle};
use crate::partition::{Partitioner, SatisfiableGroup};
use crate::requirements::{Requirement, RequirementParser, RequirementSet, RequirementStats};
use crate::weights::{compute_weights, normalize, WeightsMode};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("scoring matrix error: {0}")]
    Matrix(#[from] MatrixError),
    #[error("optimization error: {0}")]
    Optimize(#[from] OptimizeError),
    #[error("invalid analysis config: {0}")]
    Config(String),
}

// =============================================================================
// Config
// =============================================================================

/// Analysis knobs. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub optimizer: OptimizerMode,
    pub weights: WeightsMode,
    /// Only flag requirements that state a high-level architecture decision.
    pub strict_asr_selection: bool,
    pub max_clusters: usize,
    /// Passed through to clustering; not enforced.
    pub max_cluster_size: usize,
    pub seed: u64,
    pub kmeans_restarts: usize,
    pub partition_attempts: usize,
    pub batch_size: usize,
    /// Branch-node budget for the exact solver. `None` searches to the end.
    pub solver_node_limit: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerMode::Ilp,
            weights: WeightsMode::Inferred,
            strict_asr_selection: false,
            max_clusters: 20,
            max_cluster_size: 30,
            seed: 42,
            kmeans_restarts: 10,
            partition_attempts: 3,
            batch_size: 10,
            solver_node_limit: Some(1_000_000),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| AnalysisError::Config(format!("{}: {e}", path.display())))
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            max_clusters: self.max_clusters,
            max_cluster_size: self.max_cluster_size,
            seed: self.seed,
            restarts: self.kmeans_restarts,
            ..ClusterConfig::default()
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub stats: RequirementStats,
    pub requirements: Vec<Requirement>,
    pub asrs: Vec<Requirement>,
    pub condition_groups: Vec<ConditionGroup>,
    pub satisfiable_groups: Vec<SatisfiableGroup>,
    pub concerns: Vec<Concern>,
}

// =============================================================================
// Architect
// =============================================================================

pub struct Architect {
    matrix: Arc<ScoringMatrix>,
    text: Arc<dyn TextOracle>,
    embedder: Arc<dyn EmbeddingOracle>,
    config: AnalysisConfig,
}

impl Architect {
    pub fn new(
        matrix: Arc<ScoringMatrix>,
        text: Arc<dyn TextOracle>,
        embedder: Arc<dyn EmbeddingOracle>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            matrix,
            text,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn matrix(&self) -> &ScoringMatrix {
        &self.matrix
    }

    /// Full pipeline from newline-separated requirement text.
    pub async fn analyze(&self, text: &str) -> Result<AnalysisOutcome, AnalysisError> {
        let mut set = RequirementSet::from_text(text);
        info!(requirements = set.len(), "requirements loaded");

        RequirementParser::new(self.config.batch_size)
            .strict(self.config.strict_asr_selection)
            .parse(self.text.as_ref(), &mut set)
            .await;

        self.analyze_requirements(set.into_requirements()).await
    }

    /// Pipeline from already-extracted requirements.
    pub async fn analyze_requirements(
        &self,
        requirements: Vec<Requirement>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let stats = RequirementStats::of(&requirements);
        let asrs: Vec<Requirement> = requirements.iter().filter(|r| r.is_asr()).cloned().collect();
        info!(%run_id, total = stats.total, asrs = asrs.len(), "analysis started");

        let mut outcome = AnalysisOutcome {
            run_id,
            started_at,
            config: self.config.clone(),
            stats,
            requirements,
            asrs: asrs.clone(),
            condition_groups: Vec::new(),
            satisfiable_groups: Vec::new(),
            concerns: Vec::new(),
        };
        if asrs.is_empty() {
            warn!(%run_id, "no architecturally-significant requirements; nothing to decide");
            return Ok(outcome);
        }

        let grouper = ConditionGrouper::new(
            self.text.as_ref(),
            self.embedder.as_ref(),
            self.config.cluster_config(),
        );
        let groups = grouper.group(asrs).await;

        let satisfiable = Partitioner::new(self.config.partition_attempts)
            .partition(self.text.as_ref(), &groups)
            .await;
        info!(
            %run_id,
            condition_groups = groups.len(),
            satisfiable_groups = satisfiable.len(),
            "conditions partitioned"
        );

        for (idx, sg) in satisfiable.iter().enumerate() {
            let concern = self.decide(&groups, sg)?;
            info!(
                %run_id,
                group = idx,
                status = ?concern.status,
                decisions = concern.decisions.len(),
                average = concern.average_score,
                "concern decided"
            );
            outcome.concerns.push(concern);
        }

        outcome.condition_groups = groups;
        outcome.satisfiable_groups = satisfiable;
        Ok(outcome)
    }

    /// Weights, normalization and pattern selection for one satisfiable group.
    pub fn decide(
        &self,
        groups: &[ConditionGroup],
        satisfiable: &SatisfiableGroup,
    ) -> Result<Concern, AnalysisError> {
        let conditions: Vec<String> = satisfiable
            .resolve(groups)
            .map(|g| g.nominal_condition.clone())
            .collect();
        let weights = compute_weights(satisfiable.resolve(groups), &self.matrix, &self.config.weights);
        let normalized = normalize(&weights);
        let desired: Vec<String> = weights.keys().cloned().collect();

        let selection = optimize(
            self.config.optimizer,
            &self.matrix,
            &desired,
            &normalized,
            self.config.solver_node_limit,
        )?;
        Ok(Concern::new(conditions, weights, normalized, selection))
    }
}
