//! Quality-attribute weights for a satisfiable group.

use serde::{Deserialize, Serialize};

use crate::grouping::ConditionGroup;
use crate::matrix::ScoringMatrix;
use crate::optimizer::Weights;
use crate::quality::QualityAttribute;

/// Sum that [`normalize`] scales weights to.
pub const NORMALIZED_TOTAL: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "weights", rename_all = "snake_case")]
pub enum WeightsMode {
    /// Count of requirements asking for each quality.
    #[default]
    Inferred,
    /// Every matrix column weighs 1.
    EquallyImportant,
    /// Caller-supplied weights, used verbatim.
    Provided(Weights),
}

impl WeightsMode {
    pub fn label(&self) -> &'static str {
        match self {
            WeightsMode::Inferred => "inferred",
            WeightsMode::EquallyImportant => "equally_important",
            WeightsMode::Provided(_) => "provided",
        }
    }
}

/// Unnormalized weights for the condition groups of one satisfiable group.
///
/// Inferred weights only have entries for qualities that occur; nothing is
/// zero-filled.
pub fn compute_weights<'a>(
    groups: impl IntoIterator<Item = &'a ConditionGroup>,
    matrix: &ScoringMatrix,
    mode: &WeightsMode,
) -> Weights {
    match mode {
        WeightsMode::Provided(weights) => weights.clone(),
        WeightsMode::EquallyImportant => matrix.columns().iter().map(|c| (c.clone(), 1)).collect(),
        WeightsMode::Inferred => {
            let mut weights = Weights::new();
            for group in groups {
                for req in &group.requirements {
                    for quality in &req.quality_attributes {
                        *weights.entry(quality.name().to_string()).or_insert(0) += 1;
                    }
                }
            }
            weights
        }
    }
}

/// Scale to a total of 100 with floor division. A zero total returns the
/// input unchanged.
///
/// Works in i128 so any i64 weights are accepted; a result outside i64
/// (possible only with mixed signs) saturates.
pub fn normalize(weights: &Weights) -> Weights {
    let total: i128 = weights.values().map(|w| i128::from(*w)).sum();
    if total == 0 {
        return weights.clone();
    }
    weights
        .iter()
        .map(|(q, w)| {
            let scaled = floor_div(i128::from(*w) * i128::from(NORMALIZED_TOTAL), total);
            let clamped = i64::try_from(scaled)
                .unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX });
            (q.clone(), clamped)
        })
        .collect()
}

fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Parse `"Security:3, PE:2"`. Known names or codes become canonical quality
/// names; anything else is kept as written.
pub fn parse_weight_list(text: &str) -> Result<Weights, String> {
    let mut weights = Weights::new();
    for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = item
            .rsplit_once(':')
            .ok_or_else(|| format!("expected Quality:weight, got {item:?}"))?;
        let value: i64 = value
            .trim()
            .parse()
            .map_err(|_| format!("weight for {:?} is not an integer", name.trim()))?;
        let name = match name.parse::<QualityAttribute>() {
            Ok(q) => q.name().to_string(),
            Err(_) => name.trim().to_string(),
        };
        weights.insert(name, value);
    }
    if weights.is_empty() {
        return Err("no weights given".to_string());
    }
    Ok(weights)
}
