//! Exact selection through the 0/1 program solver.

use super::ilp::{BinaryProgram, SolveStatus, VarId};
use super::{
    decision_for, ensure_categories_populated, ensure_scores_fit, row_score, satisfaction_scores,
    OptimizeError,
    PatternSelector, Selection, Weights,
};
use crate::matrix::ScoringMatrix;

/// One binary variable per pattern, one exactly-one row per category,
/// maximizing the summed row scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSelector {
    node_limit: Option<u64>,
}

impl ExactSelector {
    pub fn new(node_limit: Option<u64>) -> Self {
        Self { node_limit }
    }

    /// Build the program; variables are returned in matrix pattern order.
    pub fn build_program(
        matrix: &ScoringMatrix,
        desired: &[String],
        weights: &Weights,
    ) -> Result<(BinaryProgram, Vec<VarId>), OptimizeError> {
        let mut program = BinaryProgram::new();
        let vars: Vec<VarId> = matrix
            .patterns()
            .iter()
            .map(|row| program.add_variable(row_score(row, desired, weights)))
            .collect();

        for category in matrix.categories() {
            let members: Vec<VarId> = matrix
                .patterns()
                .iter()
                .zip(&vars)
                .filter(|(row, _)| &row.category == category)
                .map(|(_, var)| *var)
                .collect();
            program.add_exactly_one(&members)?;
        }
        Ok((program, vars))
    }
}

impl PatternSelector for ExactSelector {
    fn select(
        &self,
        matrix: &ScoringMatrix,
        desired: &[String],
        weights: &Weights,
    ) -> Result<Selection, OptimizeError> {
        ensure_categories_populated(matrix)?;
        ensure_scores_fit(matrix, weights)?;

        let (program, vars) = Self::build_program(matrix, desired, weights)?;
        let solution = program.solve_with_limit(self.node_limit);
        if solution.status != SolveStatus::Optimal {
            tracing::warn!(
                status = ?solution.status,
                nodes = solution.nodes,
                "no optimal pattern selection found"
            );
            return Ok(Selection::unsolved(solution.status));
        }

        let mut decisions = Vec::with_capacity(matrix.categories().len());
        for category in matrix.categories() {
            let chosen = matrix
                .patterns()
                .iter()
                .zip(&vars)
                .find(|(row, var)| &row.category == category && solution.value(**var));
            if let Some((row, _)) = chosen {
                decisions.push(decision_for(row, desired, weights));
            }
        }

        let satisfaction_scores = satisfaction_scores(matrix, &decisions, weights)?;
        Ok(Selection {
            status: SolveStatus::Optimal,
            decisions,
            satisfaction_scores,
        })
    }
}
