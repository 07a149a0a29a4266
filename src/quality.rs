//! Closed vocabulary of quality attributes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the eight quality attributes a requirement can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityAttribute {
    #[serde(rename = "Performance Efficiency")]
    PerformanceEfficiency,
    Compatibility,
    Usability,
    Reliability,
    Security,
    Maintainability,
    Portability,
    #[serde(rename = "Cost Efficiency")]
    CostEfficiency,
}

impl QualityAttribute {
    pub const ALL: [QualityAttribute; 8] = [
        QualityAttribute::PerformanceEfficiency,
        QualityAttribute::Compatibility,
        QualityAttribute::Usability,
        QualityAttribute::Reliability,
        QualityAttribute::Security,
        QualityAttribute::Maintainability,
        QualityAttribute::Portability,
        QualityAttribute::CostEfficiency,
    ];

    /// Canonical display name, also used as the weight-map key.
    pub fn name(&self) -> &'static str {
        match self {
            QualityAttribute::PerformanceEfficiency => "Performance Efficiency",
            QualityAttribute::Compatibility => "Compatibility",
            QualityAttribute::Usability => "Usability",
            QualityAttribute::Reliability => "Reliability",
            QualityAttribute::Security => "Security",
            QualityAttribute::Maintainability => "Maintainability",
            QualityAttribute::Portability => "Portability",
            QualityAttribute::CostEfficiency => "Cost Efficiency",
        }
    }

    /// Two-letter code used in scoring-table headers.
    pub fn code(&self) -> &'static str {
        match self {
            QualityAttribute::PerformanceEfficiency => "PE",
            QualityAttribute::Compatibility => "CO",
            QualityAttribute::Usability => "US",
            QualityAttribute::Reliability => "RE",
            QualityAttribute::Security => "SE",
            QualityAttribute::Maintainability => "MA",
            QualityAttribute::Portability => "PO",
            QualityAttribute::CostEfficiency => "CE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|q| q.code().eq_ignore_ascii_case(code))
    }

    /// Case-insensitive lookup by display name. Surrounding whitespace and
    /// internal separators ("performance_efficiency") are tolerated.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        Self::ALL.into_iter().find(|q| normalize(q.name()) == wanted)
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for QualityAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality attribute: {0}")]
pub struct UnknownQuality(pub String);

impl FromStr for QualityAttribute {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
            .or_else(|| Self::from_code(s))
            .ok_or_else(|| UnknownQuality(s.to_string()))
    }
}

/// Map a header cell to a column name: known codes become canonical names,
/// anything else is kept as written.
pub fn column_name(header: &str) -> String {
    match QualityAttribute::from_code(header) {
        Some(q) => q.name().to_string(),
        None => header.trim().to_string(),
    }
}
