//! Pattern selection: one pattern per decision category.
//!
//! Two selectors share the same contract and the same scoring helpers:
//! [`GreedySelector`] scans each category for the best row score and
//! [`ExactSelector`] solves the equivalent 0/1 program to proven optimality.
//! For the same matrix and weights both return structurally identical
//! [`Selection`]s.

pub mod exact;
pub mod greedy;
pub mod ilp;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::{PatternRow, ScoringMatrix};

pub use exact::ExactSelector;
pub use greedy::GreedySelector;
pub use ilp::{BinaryProgram, ProgramError, Solution, SolveStatus, VarId};

/// Quality name → integer weight.
pub type Weights = BTreeMap<String, i64>;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerMode {
    /// Exact integer-linear optimization.
    #[default]
    Ilp,
    Greedy,
}

impl OptimizerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerMode::Ilp => "ilp",
            OptimizerMode::Greedy => "greedy",
        }
    }
}

impl fmt::Display for OptimizerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ilp" | "exact" => Ok(OptimizerMode::Ilp),
            "greedy" => Ok(OptimizerMode::Greedy),
            other => Err(format!("unknown optimizer mode: {other} (expected ilp or greedy)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    pub quality: String,
    pub score: i64,
}

/// The pattern chosen for one decision category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub category: String,
    pub selected_pattern: String,
    pub score: i64,
    /// Desired qualities the pattern scores positively on.
    pub satisfied: Vec<QualityScore>,
    /// Desired qualities the pattern scores negatively on.
    pub unsatisfied: Vec<QualityScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub status: SolveStatus,
    /// One decision per category in matrix order; empty unless `Optimal`.
    pub decisions: Vec<Decision>,
    /// Weighted matrix value per quality summed over the selected patterns.
    pub satisfaction_scores: BTreeMap<String, i64>,
}

impl Selection {
    pub fn unsolved(status: SolveStatus) -> Self {
        Self {
            status,
            decisions: Vec::new(),
            satisfaction_scores: BTreeMap::new(),
        }
    }

    pub fn total_score(&self) -> i64 {
        self.decisions.iter().map(|d| d.score).sum()
    }
}

/// Scoring-table problems that make selection meaningless.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("decision category {0:?} has no patterns")]
    EmptyCategory(String),
    #[error("selected pattern {0:?} is not in the scoring matrix")]
    UnknownPattern(String),
    #[error("weighted scores overflow at decision category {category:?}")]
    ScoreOverflow { category: String },
    #[error("failed to build program: {0}")]
    Program(#[from] ProgramError),
}

// =============================================================================
// Selector contract
// =============================================================================

pub trait PatternSelector {
    fn select(
        &self,
        matrix: &ScoringMatrix,
        desired: &[String],
        weights: &Weights,
    ) -> Result<Selection, OptimizeError>;
}

/// Run the selector for `mode`.
pub fn optimize(
    mode: OptimizerMode,
    matrix: &ScoringMatrix,
    desired: &[String],
    weights: &Weights,
    node_limit: Option<u64>,
) -> Result<Selection, OptimizeError> {
    let selection = match mode {
        OptimizerMode::Greedy => GreedySelector.select(matrix, desired, weights)?,
        OptimizerMode::Ilp => ExactSelector::new(node_limit).select(matrix, desired, weights)?,
    };
    tracing::debug!(
        mode = mode.as_str(),
        status = ?selection.status,
        decisions = selection.decisions.len(),
        total = selection.total_score(),
        "pattern selection finished"
    );
    Ok(selection)
}

// =============================================================================
// Shared scoring
// =============================================================================

/// `Σ_{q ∈ desired} matrix[p][q] * weight[q]`, missing entries as 0.
///
/// Accumulates in i128 and saturates at the i64 bounds. Selectors reject
/// inputs that would saturate before scoring, see [`ensure_scores_fit`].
pub fn row_score(row: &PatternRow, desired: &[String], weights: &Weights) -> i64 {
    let total: i128 = desired
        .iter()
        .map(|q| i128::from(row.score(q)) * i128::from(weights.get(q).copied().unwrap_or(0)))
        .fold(0i128, i128::saturating_add);
    saturate(total)
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// Check that every sum the selectors form stays inside i64.
///
/// Bounds each category by its largest `Σ |matrix[p][q] * weight[q]|` over
/// all weighted columns; row scores, objective sums, totals and
/// satisfaction scores are all at most the sum of those bounds.
pub fn ensure_scores_fit(matrix: &ScoringMatrix, weights: &Weights) -> Result<(), OptimizeError> {
    let limit = i128::from(i64::MAX);
    let overflow = |category: &str| OptimizeError::ScoreOverflow {
        category: category.to_string(),
    };

    let mut budget: i128 = 0;
    for category in matrix.categories() {
        let mut widest: i128 = 0;
        for row in matrix.patterns_in(category) {
            let mut magnitude: i128 = 0;
            for (quality, weight) in weights {
                magnitude += (i128::from(row.score(quality)) * i128::from(*weight)).abs();
                if magnitude > limit {
                    return Err(overflow(category));
                }
            }
            widest = widest.max(magnitude);
        }
        budget += widest;
        if budget > limit {
            return Err(overflow(category));
        }
    }
    Ok(())
}

/// Build the decision for a chosen row. Satisfied and unsatisfied lists
/// follow the row's column order, restricted to desired qualities.
pub(crate) fn decision_for(row: &PatternRow, desired: &[String], weights: &Weights) -> Decision {
    let mut satisfied = Vec::new();
    let mut unsatisfied = Vec::new();
    for (quality, value) in &row.scores {
        if !desired.contains(quality) {
            continue;
        }
        let entry = QualityScore {
            quality: quality.clone(),
            score: *value,
        };
        if *value > 0 {
            satisfied.push(entry);
        } else if *value < 0 {
            unsatisfied.push(entry);
        }
    }

    Decision {
        category: row.category.clone(),
        selected_pattern: row.name.clone(),
        score: row_score(row, desired, weights),
        satisfied,
        unsatisfied,
    }
}

/// Per-quality satisfaction across every column of the selected patterns,
/// not only the desired ones.
pub(crate) fn satisfaction_scores(
    matrix: &ScoringMatrix,
    decisions: &[Decision],
    weights: &Weights,
) -> Result<BTreeMap<String, i64>, OptimizeError> {
    let mut scores = BTreeMap::new();
    for decision in decisions {
        let row = matrix
            .pattern(&decision.selected_pattern)
            .ok_or_else(|| OptimizeError::UnknownPattern(decision.selected_pattern.clone()))?;
        for (quality, value) in &row.scores {
            let weight = weights.get(quality).copied().unwrap_or(0);
            *scores.entry(quality.clone()).or_insert(0) += value * weight;
        }
    }
    Ok(scores)
}

pub(crate) fn ensure_categories_populated(matrix: &ScoringMatrix) -> Result<(), OptimizeError> {
    match matrix
        .categories()
        .iter()
        .find(|c| matrix.patterns_in(c).next().is_none())
    {
        Some(empty) => Err(OptimizeError::EmptyCategory(empty.clone())),
        None => Ok(()),
    }
}
