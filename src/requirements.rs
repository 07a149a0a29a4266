//! Requirements and LLM-assisted ASR extraction.
//!
//! A [`RequirementSet`] is built from raw text, one requirement per line,
//! with ids drawn from an [`IdSequence`] owned by the set. The
//! [`RequirementParser`] then asks a [`TextOracle`] to flag
//! architecturally-significant requirements, tag their quality attributes
//! and pull out any applicability condition.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::oracle::TextOracle;
use crate::prompts::{EXTRACTION_LENIENT, EXTRACTION_STRICT};
use crate::quality::QualityAttribute;

/// Condition recorded for requirements that always apply.
pub const UNCONDITIONAL: &str = "under any circumstances";

/// Longest description prefix sent to the oracle.
const MAX_DESCRIPTION_CHARS: usize = 500;

// =============================================================================
// Model
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: u32,
    pub description: String,
    pub condition_text: String,
    #[serde(default)]
    pub quality_attributes: Vec<QualityAttribute>,
    #[serde(default)]
    pub is_architecturally_significant: bool,
    /// Whether the extraction step produced a result for this requirement.
    #[serde(default)]
    pub parsed: bool,
    #[serde(default, skip_serializing)]
    pub condition_embedding: Option<Vec<f32>>,
}

impl Requirement {
    pub fn new(id: u32, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            condition_text: UNCONDITIONAL.to_string(),
            quality_attributes: Vec::new(),
            is_architecturally_significant: false,
            parsed: false,
            condition_embedding: None,
        }
    }

    /// Mark as a parsed ASR with the given qualities and condition.
    pub fn significant(
        mut self,
        qualities: impl IntoIterator<Item = QualityAttribute>,
        condition: impl Into<String>,
    ) -> Self {
        self.quality_attributes = qualities.into_iter().collect();
        self.condition_text = normalize_condition(&condition.into());
        self.is_architecturally_significant = true;
        self.parsed = true;
        self
    }

    pub fn is_unconditional(&self) -> bool {
        self.condition_text == UNCONDITIONAL
    }

    pub fn is_asr(&self) -> bool {
        self.parsed && self.is_architecturally_significant
    }
}

/// Empty and "N/A" conditions collapse to [`UNCONDITIONAL`].
pub fn normalize_condition(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        UNCONDITIONAL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Monotonic id source scoped to one load.
#[derive(Debug, Clone)]
pub struct IdSequence {
    next: u32,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdSequence {
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequirementStats {
    pub total: usize,
    pub parsed: usize,
    pub with_condition: usize,
    pub asrs: usize,
}

impl RequirementStats {
    pub fn of(requirements: &[Requirement]) -> Self {
        Self {
            total: requirements.len(),
            parsed: requirements.iter().filter(|r| r.parsed).count(),
            with_condition: requirements
                .iter()
                .filter(|r| r.parsed && !r.is_unconditional())
                .count(),
            asrs: requirements.iter().filter(|r| r.is_asr()).count(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequirementSet {
    requirements: Vec<Requirement>,
    ids: IdSequence,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// One requirement per non-blank line.
    pub fn from_text(text: &str) -> Self {
        let mut set = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                set.push(line);
            }
        }
        set
    }

    pub fn push(&mut self, description: impl Into<String>) -> u32 {
        let id = self.ids.next_id();
        self.requirements.push(Requirement::new(id, description));
        id
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Requirement> {
        self.requirements.iter_mut().find(|r| r.id == id)
    }

    /// Parsed, architecturally-significant requirements in id order.
    pub fn asrs(&self) -> Vec<Requirement> {
        self.requirements.iter().filter(|r| r.is_asr()).cloned().collect()
    }

    pub fn stats(&self) -> RequirementStats {
        RequirementStats::of(&self.requirements)
    }

    pub fn into_requirements(self) -> Vec<Requirement> {
        self.requirements
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// One entry of the oracle's JSON array.
#[derive(Debug, Clone, Deserialize)]
struct ExtractedRequirement {
    #[serde(rename = "Id")]
    id: LenientId,
    #[serde(rename = "IsArchitecturallySignificant", default)]
    is_architecturally_significant: bool,
    #[serde(rename = "QualityAttributes", default)]
    quality_attributes: Vec<String>,
    #[serde(rename = "ConditionText", default)]
    condition_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LenientId {
    Number(u32),
    Text(String),
}

impl LenientId {
    fn value(&self) -> Option<u32> {
        match self {
            LenientId::Number(n) => Some(*n),
            LenientId::Text(s) => s.trim().trim_end_matches('.').parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub parsed: usize,
}

/// Batched ASR extraction through a text oracle.
#[derive(Debug, Clone)]
pub struct RequirementParser {
    batch_size: usize,
    strict: bool,
}

impl Default for RequirementParser {
    fn default() -> Self {
        Self {
            batch_size: 10,
            strict: false,
        }
    }
}

impl RequirementParser {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            strict: false,
        }
    }

    /// Only flag requirements that state a high-level architecture decision.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Annotate every requirement in `set`. A batch whose call fails or
    /// whose answer does not parse is skipped and its requirements stay
    /// unparsed.
    pub async fn parse<O: TextOracle + ?Sized>(
        &self,
        oracle: &O,
        set: &mut RequirementSet,
    ) -> ParseSummary {
        let mut summary = ParseSummary::default();
        let ids: Vec<(u32, String)> = set
            .requirements()
            .iter()
            .map(|r| (r.id, r.description.clone()))
            .collect();

        for (batch_no, batch) in ids.chunks(self.batch_size).enumerate() {
            summary.batches += 1;
            let listing = batch
                .iter()
                .map(|(id, desc)| format!("{id}. {}", truncate_chars(desc, MAX_DESCRIPTION_CHARS)))
                .collect::<Vec<_>>()
                .join("\n");
            let template = if self.strict {
                EXTRACTION_STRICT
            } else {
                EXTRACTION_LENIENT
            };
            let prompt = template.render(&[("requirements", listing.as_str())]);

            let response = match oracle.generate(&prompt.system, &prompt.user).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, batch = batch_no, "requirement extraction call failed");
                    summary.failed_batches += 1;
                    continue;
                }
            };

            let entries = match parse_extraction(&response) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, batch = batch_no, "unparsable extraction response");
                    summary.failed_batches += 1;
                    continue;
                }
            };

            for entry in entries {
                let Some(id) = entry.id.value() else { continue };
                // Only ids from this batch may be updated.
                if !batch.iter().any(|(bid, _)| *bid == id) {
                    debug!(id, "ignoring extraction entry outside the batch");
                    continue;
                }
                if let Some(req) = set.get_mut(id) {
                    apply_entry(req, entry);
                    summary.parsed += 1;
                }
            }

            let asrs = set.requirements().iter().filter(|r| r.is_asr()).count();
            debug!(batch = batch_no, asrs, "extraction batch done");
        }

        info!(
            requirements = set.len(),
            parsed = summary.parsed,
            failed_batches = summary.failed_batches,
            "requirement extraction finished"
        );
        summary
    }
}

fn apply_entry(req: &mut Requirement, entry: ExtractedRequirement) {
    let mut qualities = Vec::new();
    for name in &entry.quality_attributes {
        match name.parse::<QualityAttribute>() {
            Ok(q) if !qualities.contains(&q) => qualities.push(q),
            Ok(_) => {}
            Err(_) => warn!(id = req.id, quality = %name, "dropping unknown quality attribute"),
        }
    }
    req.quality_attributes = qualities;
    req.is_architecturally_significant = entry.is_architecturally_significant;
    req.condition_text = normalize_condition(entry.condition_text.as_deref().unwrap_or(""));
    req.parsed = true;
}

fn parse_extraction(raw: &str) -> Result<Vec<ExtractedRequirement>, serde_json::Error> {
    let json = extract_json_array(raw).unwrap_or("[]");
    serde_json::from_str(json)
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Locate the first complete JSON array in noisy model output (markdown
/// fences, leading prose).
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let rest = &raw[start..];
    find_matching_bracket(rest).map(|end| &rest[..end])
}

/// Byte offset just past the bracket closing the one at offset 0. Brackets
/// inside JSON strings are ignored.
fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' && in_string {
            escape = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_per_set() {
        let set = RequirementSet::from_text("first\n\n  second  \n");
        let ids: Vec<u32> = set.requirements().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(set.requirements()[1].description, "second");

        // A new set starts over.
        let other = RequirementSet::from_text("again");
        assert_eq!(other.requirements()[0].id, 1);
    }

    #[test]
    fn condition_normalization() {
        assert_eq!(normalize_condition(""), UNCONDITIONAL);
        assert_eq!(normalize_condition(" n/a "), UNCONDITIONAL);
        assert_eq!(normalize_condition("when traffic is high"), "when traffic is high");
    }

    #[test]
    fn array_extraction_tolerates_fences() {
        let raw = "Sure!\n```json\n[{\"Id\": 1, \"ConditionText\": \"if [a] fails\"}]\n```";
        assert_eq!(
            extract_json_array(raw),
            Some("[{\"Id\": 1, \"ConditionText\": \"if [a] fails\"}]")
        );
        assert_eq!(extract_json_array("no json here"), None);
    }

    #[test]
    fn entries_map_onto_requirements() {
        let raw = r#"[{"Id": "2", "IsArchitecturallySignificant": true,
                       "QualityAttributes": ["Security", "Scalability", "security"],
                       "ConditionText": "N/A"}]"#;
        let entries = parse_extraction(raw).unwrap();
        let mut req = Requirement::new(2, "Encrypt all data");
        apply_entry(&mut req, entries.into_iter().next().unwrap());
        assert!(req.is_asr());
        assert!(req.is_unconditional());
        assert_eq!(req.quality_attributes, vec![QualityAttribute::Security]);
    }

    #[test]
    fn stats_count_conditions_and_asrs() {
        let mut set = RequirementSet::from_text("a\nb\nc");
        *set.get_mut(1).unwrap() = Requirement::new(1, "a")
            .significant([QualityAttribute::Reliability], "when offline");
        *set.get_mut(2).unwrap() = Requirement::new(2, "b").significant([QualityAttribute::Security], "");
        let stats = set.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.with_condition, 1);
        assert_eq!(stats.asrs, 2);
        assert_eq!(set.asrs().len(), 2);
    }

    #[test]
    fn long_descriptions_are_truncated_on_char_boundaries() {
        let s = "é".repeat(600);
        assert_eq!(truncate_chars(&s, 500).chars().count(), 500);
        assert_eq!(truncate_chars("short", 500), "short");
    }
}
