//! Concerns: the decision set produced for one satisfiable group.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::optimizer::{Decision, Selection, SolveStatus, Weights};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concern {
    /// Nominal conditions of the satisfiable group.
    pub conditions: Vec<String>,
    /// Unnormalized quality weights.
    pub desired_qualities: Weights,
    /// Weights actually fed to the optimizer.
    pub normalized_weights: Weights,
    pub decisions: Vec<Decision>,
    pub satisfaction_scores: BTreeMap<String, i64>,
    pub status: SolveStatus,
    pub average_score: f64,
    pub total_score: i64,
}

impl Concern {
    pub fn new(
        conditions: Vec<String>,
        desired_qualities: Weights,
        normalized_weights: Weights,
        selection: Selection,
    ) -> Self {
        let total_score: i64 = selection.decisions.iter().map(|d| d.score).sum();
        let average_score = if selection.decisions.is_empty() {
            0.0
        } else {
            total_score as f64 / selection.decisions.len() as f64
        };

        Self {
            conditions,
            desired_qualities,
            normalized_weights,
            decisions: selection.decisions,
            satisfaction_scores: selection.satisfaction_scores,
            status: selection.status,
            average_score,
            total_score,
        }
    }

    /// Desired qualities, heaviest first; equal weights in name order.
    pub fn qualities_by_weight(&self) -> Vec<(&str, i64)> {
        let mut qualities: Vec<(&str, i64)> = self
            .desired_qualities
            .iter()
            .map(|(q, w)| (q.as_str(), *w))
            .collect();
        qualities.sort_by(|a, b| b.1.cmp(&a.1));
        qualities
    }
}
