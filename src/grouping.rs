//! Condition grouping.
//!
//! ASRs that share an applicability condition are gathered under one
//! [`ConditionGroup`]. Unconditional requirements form a single group up
//! front. The rest are embedded, clustered, and within each cluster merged
//! greedily: a requirement joins the first existing group whose nominal
//! condition the text oracle judges equivalent, otherwise it starts a new
//! group. The oracle's judgments need not be transitive, so the outcome
//! depends on visitation order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clustering::{cluster, group_by_cluster, ClusterConfig};
use crate::oracle::{EmbeddingOracle, TextOracle};
use crate::prompts::EQUIVALENCE;
use crate::requirements::{Requirement, UNCONDITIONAL};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub nominal_condition: String,
    pub requirements: Vec<Requirement>,
}

impl ConditionGroup {
    pub fn seeded_by(req: Requirement) -> Self {
        Self {
            nominal_condition: req.condition_text.clone(),
            requirements: vec![req],
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.nominal_condition == UNCONDITIONAL
    }
}

/// Ask the oracle whether two conditions are equivalent. Any failure counts
/// as "not equivalent".
pub async fn conditions_equivalent<O: TextOracle + ?Sized>(
    oracle: &O,
    condition: &str,
    nominal: &str,
) -> bool {
    let prompt = EQUIVALENCE.render(&[("first", condition), ("second", nominal)]);
    match oracle.generate(&prompt.system, &prompt.user).await {
        Ok(answer) => answer.to_lowercase().contains("true"),
        Err(e) => {
            warn!(error = %e, "equivalence check failed; treating as not equivalent");
            false
        }
    }
}

pub struct ConditionGrouper<'a, T: ?Sized, E: ?Sized> {
    text: &'a T,
    embedder: &'a E,
    clustering: ClusterConfig,
}

impl<'a, T, E> ConditionGrouper<'a, T, E>
where
    T: TextOracle + ?Sized,
    E: EmbeddingOracle + ?Sized,
{
    pub fn new(text: &'a T, embedder: &'a E, clustering: ClusterConfig) -> Self {
        Self {
            text,
            embedder,
            clustering,
        }
    }

    /// Partition `asrs` into condition groups. The unconditional group, if
    /// any, comes first.
    pub async fn group(&self, asrs: Vec<Requirement>) -> Vec<ConditionGroup> {
        let (unconditional, mut conditional): (Vec<_>, Vec<_>) =
            asrs.into_iter().partition(Requirement::is_unconditional);

        let mut groups = Vec::new();
        if !unconditional.is_empty() {
            groups.push(ConditionGroup {
                nominal_condition: UNCONDITIONAL.to_string(),
                requirements: unconditional,
            });
        }
        if conditional.is_empty() {
            return groups;
        }

        let texts: Vec<String> = conditional.iter().map(|r| r.condition_text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await;
        for (req, embedding) in conditional.iter_mut().zip(embeddings) {
            if !embedding.is_empty() {
                req.condition_embedding = Some(embedding);
            }
        }

        // Only vectors of the dominant (first seen) dimension can be clustered.
        let dim = conditional
            .iter()
            .find_map(|r| r.condition_embedding.as_ref().map(Vec::len));
        let (embedded, orphans): (Vec<_>, Vec<_>) = conditional
            .into_iter()
            .partition(|r| dim.is_some() && r.condition_embedding.as_ref().map(Vec::len) == dim);

        if embedded.len() < 2 {
            debug!(
                requirements = embedded.len() + orphans.len(),
                "too few embeddings; one group per conditional requirement"
            );
            let mut rest: Vec<Requirement> = embedded.into_iter().chain(orphans).collect();
            rest.sort_by_key(|r| r.id);
            groups.extend(rest.into_iter().map(ConditionGroup::seeded_by));
            return groups;
        }

        if !orphans.is_empty() {
            warn!(count = orphans.len(), "requirements without usable embeddings get their own groups");
        }

        let vectors: Vec<Vec<f32>> = embedded
            .iter()
            .map(|r| r.condition_embedding.clone().unwrap_or_default())
            .collect();
        let labels = cluster(&vectors, &self.clustering);
        let clusters = group_by_cluster(embedded, &labels);
        debug!(clusters = clusters.len(), "conditions clustered");

        for members in clusters {
            groups.extend(self.merge_cluster(members).await);
        }
        groups.extend(orphans.into_iter().map(ConditionGroup::seeded_by));

        info!(groups = groups.len(), "condition groups formed");
        groups
    }

    async fn merge_cluster(&self, members: Vec<Requirement>) -> Vec<ConditionGroup> {
        let mut groups: Vec<ConditionGroup> = Vec::new();
        'members: for req in members {
            for group in groups.iter_mut() {
                if conditions_equivalent(self.text, &req.condition_text, &group.nominal_condition)
                    .await
                {
                    group.requirements.push(req);
                    continue 'members;
                }
            }
            groups.push(ConditionGroup::seeded_by(req));
        }
        groups
    }
}
