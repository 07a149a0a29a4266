//! Per-category greedy selection.

use super::{
    decision_for, ensure_categories_populated, ensure_scores_fit, row_score, satisfaction_scores,
    OptimizeError,
    PatternSelector, Selection, SolveStatus, Weights,
};
use crate::matrix::{PatternRow, ScoringMatrix};

/// Keeps the strictly best-scoring pattern of each category; on ties the
/// first pattern in table order wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySelector;

impl PatternSelector for GreedySelector {
    fn select(
        &self,
        matrix: &ScoringMatrix,
        desired: &[String],
        weights: &Weights,
    ) -> Result<Selection, OptimizeError> {
        ensure_categories_populated(matrix)?;
        ensure_scores_fit(matrix, weights)?;

        let mut decisions = Vec::with_capacity(matrix.categories().len());
        for category in matrix.categories() {
            let mut best: Option<(&PatternRow, i64)> = None;
            for row in matrix.patterns_in(category) {
                let score = row_score(row, desired, weights);
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((row, score));
                }
            }
            let (row, _) = best.ok_or_else(|| OptimizeError::EmptyCategory(category.clone()))?;
            decisions.push(decision_for(row, desired, weights));
        }

        let satisfaction_scores = satisfaction_scores(matrix, &decisions, weights)?;
        Ok(Selection {
            status: SolveStatus::Optimal,
            decisions,
            satisfaction_scores,
        })
    }
}
