//! Exact solver for 0/1 programs with disjoint exactly-one constraints.
//!
//! The programs built by the optimizer have one binary variable per pattern
//! and one `Σ x = 1` row per decision category, with every variable in at
//! most one row. That structure admits a small depth-first branch and bound
//! that proves global optimality without an LP relaxation:
//!
//! - Variables outside every row are set to 1 iff their coefficient is
//!   positive.
//! - Rows are branched in insertion order. Within a row, candidates are
//!   visited by coefficient, highest first, ties in insertion order.
//! - The bound for a partial assignment is its objective plus the best
//!   coefficient of every remaining row. A branch is pruned unless the
//!   bound strictly beats the incumbent, so among equal optima the first
//!   one found is kept.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("variable {0} does not exist")]
    UnknownVariable(usize),
    #[error("variable {var} already belongs to constraint row {row}")]
    SharedVariable { var: usize, row: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    /// Some exactly-one row has no variables.
    Infeasible,
    /// Search stopped at the node limit before proving optimality.
    NodeLimit,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    /// Value per variable. Meaningful only when `status` is `Optimal`.
    pub values: Vec<bool>,
    pub objective: i64,
    /// Branch nodes visited.
    pub nodes: u64,
}

impl Solution {
    pub fn value(&self, var: VarId) -> bool {
        self.values.get(var.0).copied().unwrap_or(false)
    }
}

/// Maximization program over binary variables. Objective sums saturate at
/// the i64 bounds.
#[derive(Debug, Clone, Default)]
pub struct BinaryProgram {
    objective: Vec<i64>,
    rows: Vec<Vec<usize>>,
    row_of: Vec<Option<usize>>,
}

impl BinaryProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, coefficient: i64) -> VarId {
        self.objective.push(coefficient);
        self.row_of.push(None);
        VarId(self.objective.len() - 1)
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Add `Σ vars = 1`. Listing a variable twice in the same row is a no-op.
    pub fn add_exactly_one(&mut self, vars: &[VarId]) -> Result<usize, ProgramError> {
        let row = self.rows.len();
        let mut members = Vec::with_capacity(vars.len());
        for var in vars {
            let slot = self
                .row_of
                .get(var.0)
                .ok_or(ProgramError::UnknownVariable(var.0))?;
            if let Some(existing) = slot {
                return Err(ProgramError::SharedVariable {
                    var: var.0,
                    row: *existing,
                });
            }
            if !members.contains(&var.0) {
                members.push(var.0);
            }
        }
        for &m in &members {
            self.row_of[m] = Some(row);
        }
        self.rows.push(members);
        Ok(row)
    }

    pub fn solve(&self) -> Solution {
        self.solve_with_limit(None)
    }

    pub fn solve_with_limit(&self, node_limit: Option<u64>) -> Solution {
        let n = self.objective.len();
        let mut values = vec![false; n];

        if self.rows.iter().any(Vec::is_empty) {
            return Solution {
                status: SolveStatus::Infeasible,
                values,
                objective: 0,
                nodes: 0,
            };
        }

        let mut free_objective = 0i64;
        for (i, &c) in self.objective.iter().enumerate() {
            if self.row_of[i].is_none() && c > 0 {
                values[i] = true;
                free_objective = free_objective.saturating_add(c);
            }
        }

        let candidates: Vec<Vec<usize>> = self
            .rows
            .iter()
            .map(|row| {
                let mut order = row.clone();
                order.sort_by(|a, b| self.objective[*b].cmp(&self.objective[*a]));
                order
            })
            .collect();

        // remaining[r] = best achievable from rows r.. on their own.
        let mut remaining = vec![0i64; candidates.len() + 1];
        for r in (0..candidates.len()).rev() {
            remaining[r] = remaining[r + 1].saturating_add(self.objective[candidates[r][0]]);
        }

        let mut search = Search {
            objective: &self.objective,
            candidates: &candidates,
            remaining: &remaining,
            current: vec![0; candidates.len()],
            best: None,
            nodes: 0,
            node_limit,
            hit_limit: false,
        };
        search.descend(0, 0);

        let nodes = search.nodes;
        match (search.hit_limit, search.best) {
            (false, Some((objective, choice))) => {
                for var in choice {
                    values[var] = true;
                }
                Solution {
                    status: SolveStatus::Optimal,
                    values,
                    objective: free_objective.saturating_add(objective),
                    nodes,
                }
            }
            _ => Solution {
                status: SolveStatus::NodeLimit,
                values: vec![false; n],
                objective: 0,
                nodes,
            },
        }
    }
}

struct Search<'a> {
    objective: &'a [i64],
    candidates: &'a [Vec<usize>],
    remaining: &'a [i64],
    current: Vec<usize>,
    best: Option<(i64, Vec<usize>)>,
    nodes: u64,
    node_limit: Option<u64>,
    hit_limit: bool,
}

impl Search<'_> {
    fn descend(&mut self, row: usize, acc: i64) {
        if row == self.candidates.len() {
            if self.best.as_ref().map_or(true, |(b, _)| acc > *b) {
                self.best = Some((acc, self.current.clone()));
            }
            return;
        }

        let candidates = self.candidates;
        for &var in &candidates[row] {
            if self.hit_limit {
                return;
            }
            self.nodes += 1;
            if self.node_limit.is_some_and(|limit| self.nodes > limit) {
                self.hit_limit = true;
                return;
            }

            let value = acc.saturating_add(self.objective[var]);
            if let Some((incumbent, _)) = &self.best {
                // Candidates are sorted, so no later sibling can do better.
                if value.saturating_add(self.remaining[row + 1]) <= *incumbent {
                    break;
                }
            }
            self.current[row] = var;
            self.descend(row + 1, value);
        }
    }
}
