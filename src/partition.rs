//! Satisfiability partitioning.
//!
//! Condition groups are split into sets whose conditions can hold at the
//! same time. The text oracle proposes a partition as nested parenthesized
//! index lists, e.g. `((1,2),(3,4))`; the proposal is parsed with a
//! forgiving, deterministic parser. After a bounded number of failed
//! attempts every condition group is placed in one satisfiable group.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::gateway::ProviderError;
use crate::grouping::ConditionGroup;
use crate::oracle::TextOracle;
use crate::prompts::PARTITION;

static GROUP_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)\s*,\s*\(").expect("valid separator regex"));

/// Condition groups that can all hold simultaneously, as 0-based indices
/// into the condition-group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatisfiableGroup {
    pub condition_groups: Vec<usize>,
}

impl SatisfiableGroup {
    pub fn new(condition_groups: Vec<usize>) -> Self {
        Self { condition_groups }
    }

    pub fn all(count: usize) -> Self {
        Self::new((0..count).collect())
    }

    /// Resolve indices against the condition-group list.
    pub fn resolve<'a>(
        &'a self,
        groups: &'a [ConditionGroup],
    ) -> impl Iterator<Item = &'a ConditionGroup> + 'a {
        self.condition_groups.iter().filter_map(|&i| groups.get(i))
    }
}

/// Why an attempt produced nothing.
#[derive(Debug)]
pub enum AttemptFailure {
    Oracle(ProviderError),
    Unparsable(String),
}

/// Parse a partition proposal over `count` condition groups.
///
/// Tokens that are not integers in `1..=count` are dropped; segments left
/// without a valid token are dropped. Returned indices are 0-based and
/// deduplicated within a segment.
pub fn parse_partition(response: &str, count: usize) -> Vec<SatisfiableGroup> {
    let cleaned = response
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');

    GROUP_SEPARATOR
        .split(cleaned)
        .filter_map(|segment| {
            let mut indices: Vec<usize> = Vec::new();
            for token in segment.split(',') {
                let token = token.trim().trim_matches(|c| c == '(' || c == ')').trim();
                let Ok(idx) = token.parse::<usize>() else { continue };
                if (1..=count).contains(&idx) && !indices.contains(&(idx - 1)) {
                    indices.push(idx - 1);
                }
            }
            (!indices.is_empty()).then(|| SatisfiableGroup::new(indices))
        })
        .collect()
}

/// Oracle-driven partitioner with retry and a one-group fallback.
#[derive(Debug, Clone)]
pub struct Partitioner {
    attempts: usize,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self { attempts: 3 }
    }
}

impl Partitioner {
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    pub async fn partition<O: TextOracle + ?Sized>(
        &self,
        oracle: &O,
        groups: &[ConditionGroup],
    ) -> Vec<SatisfiableGroup> {
        match groups.len() {
            0 => return Vec::new(),
            1 => return vec![SatisfiableGroup::all(1)],
            _ => {}
        }

        let unconditional = groups.iter().position(ConditionGroup::is_unconditional);
        let listing = groups
            .iter()
            .enumerate()
            .map(|(i, g)| format!("{}: {}", i + 1, g.nominal_condition))
            .collect::<Vec<_>>()
            .join("\n");
        let rule = match unconditional {
            Some(i) => format!(
                "Condition {} holds under any circumstances, so include {} in every group. ",
                i + 1,
                i + 1
            ),
            None => String::new(),
        };
        let prompt = PARTITION.render(&[
            ("unconditional_rule", rule.as_str()),
            ("conditions", listing.as_str()),
        ]);

        for attempt in 1..=self.attempts {
            match self.attempt(oracle, &prompt.system, &prompt.user, groups.len()).await {
                Ok(proposal) => {
                    let completed = complete(proposal, groups.len(), unconditional);
                    info!(attempt, satisfiable_groups = completed.len(), "partition accepted");
                    return completed;
                }
                Err(AttemptFailure::Oracle(e)) => {
                    warn!(attempt, error = %e, "partition oracle call failed");
                }
                Err(AttemptFailure::Unparsable(raw)) => {
                    let preview: String = raw.chars().take(200).collect();
                    warn!(attempt, response = %preview, "partition response had no valid groups");
                }
            }
        }

        warn!(
            attempts = self.attempts,
            "partitioning failed; treating all condition groups as one satisfiable group"
        );
        vec![SatisfiableGroup::all(groups.len())]
    }

    async fn attempt<O: TextOracle + ?Sized>(
        &self,
        oracle: &O,
        system: &str,
        user: &str,
        count: usize,
    ) -> Result<Vec<SatisfiableGroup>, AttemptFailure> {
        let response = oracle
            .generate(system, user)
            .await
            .map_err(AttemptFailure::Oracle)?;
        let parsed = parse_partition(&response, count);
        if parsed.is_empty() {
            return Err(AttemptFailure::Unparsable(response));
        }
        debug!(proposal = ?parsed, "partition parsed");
        Ok(parsed)
    }
}

/// Enforce coverage on an accepted proposal: the unconditional group joins
/// every satisfiable group, and any condition group the oracle left out
/// gets a satisfiable group of its own.
fn complete(
    mut proposal: Vec<SatisfiableGroup>,
    count: usize,
    unconditional: Option<usize>,
) -> Vec<SatisfiableGroup> {
    let covered = |proposal: &[SatisfiableGroup], idx: usize| {
        proposal.iter().any(|sg| sg.condition_groups.contains(&idx))
    };

    let missing: Vec<usize> = (0..count)
        .filter(|&i| Some(i) != unconditional && !covered(&proposal, i))
        .collect();
    for idx in missing {
        proposal.push(SatisfiableGroup::new(vec![idx]));
    }

    if let Some(u) = unconditional {
        for sg in proposal.iter_mut() {
            if !sg.condition_groups.contains(&u) {
                sg.condition_groups.insert(0, u);
            }
        }
    }
    proposal
}
