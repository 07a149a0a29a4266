//! Prompt templates for the three text-oracle uses.
//!
//! Extraction of ASRs, condition equivalence and partition proposals.
//! Placeholders are written `{name}` and filled by [`PromptTemplate::render`].

// =============================================================================
// Prompt templates
// =============================================================================

/// Rendered prompt: the oracle instruction and its input.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub system: String,
    pub user: String,
}

/// A prompt template with placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub system: &'static str,
    pub user: &'static str,
}

impl PromptTemplate {
    /// Substitute every `{key}` in both the system and user text.
    pub fn render(&self, vars: &[(&str, &str)]) -> PromptInstance {
        let fill = |text: &str| {
            vars.iter()
                .fold(text.to_string(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
                .trim()
                .to_string()
        };

        PromptInstance {
            system: fill(self.system),
            user: fill(self.user),
        }
    }
}

// =============================================================================
// Standard prompts
// =============================================================================

pub const EXTRACTION_LENIENT: PromptTemplate = PromptTemplate {
    system: concat!(
        "I have provided a set of software requirements. For each one, return a JSON array entry with the fields below.\n",
        "1. Whether it is architecturally-significant. Architecturally-significant means specifying one or more of the following quality attributes regarding the overall software architecture:\n",
        "-Performance Efficiency: Achieving high performance under economic resource utilization.\n",
        "-Compatibility: Interoperability and co-existence.\n",
        "-Usability: A user-friendly app with straightforward and elegant UX and UI.\n",
        "-Reliability: Stability under different conditions.\n",
        "-Security: Protecting data, preventing breaches.\n",
        "-Maintainability: Easy to modify and improve.\n",
        "-Portability: Adaptable to different environments.\n",
        "-Cost Efficiency: Keep the overall cost as low as possible.\n\n",
        "2. The quality attributes mentioned, using only names from the list above.\n",
        "3. ConditionText: the conditional statement in the requirement (e.g. 'if bandwidth is low', 'when traffic is high'). If none, return N/A.\n\n",
        "Return ONLY a valid JSON array (no markdown, no explanation):\n",
        r#"[{"Id": 1, "IsArchitecturallySignificant": true, "QualityAttributes": ["Security"], "ConditionText": "N/A"}]"#
    ),
    user: "{requirements}",
};

pub const EXTRACTION_STRICT: PromptTemplate = PromptTemplate {
    system: concat!(
        "I have provided a set of software requirements. For each one, return a JSON array entry with the fields below.\n",
        "1. Whether it is architecturally-significant. A requirement is architecturally-significant only if it satisfies both:\n",
        "   a. It explicitly states a key decision regarding high-level software architecture.\n",
        "   b. It specifies one or more of the following quality attributes:\n",
        "-Performance Efficiency: Achieving high performance under economic resource utilization.\n",
        "-Compatibility: Interoperability and co-existence.\n",
        "-Usability: A user-friendly app with straightforward and elegant UX and UI.\n",
        "-Reliability: Stability under different conditions.\n",
        "-Security: Protecting data, preventing breaches.\n",
        "-Maintainability: Easy to modify and improve.\n",
        "-Portability: Adaptable to different environments.\n",
        "-Cost Efficiency: Keep the overall cost as low as possible.\n\n",
        "2. The quality attributes mentioned, using only names from the list above.\n",
        "3. ConditionText: the conditional statement in the requirement (e.g. 'if bandwidth is low', 'when traffic is high'). If none, return N/A.\n\n",
        "Return ONLY a valid JSON array (no markdown, no explanation):\n",
        r#"[{"Id": 1, "IsArchitecturallySignificant": true, "QualityAttributes": ["Security"], "ConditionText": "N/A"}]"#
    ),
    user: "{requirements}",
};

pub const EQUIVALENCE: PromptTemplate = PromptTemplate {
    system: "If the following conditions could mean the same thing, or one can be inferred from the other, or one can be considered a subset of the other, return 'True', otherwise return 'False'. Just return True or False.",
    user: "Condition 1: '{first}'\nCondition 2: '{second}'",
};

pub const PARTITION: PromptTemplate = PromptTemplate {
    system: "Organize the provided set of conditions into groups where conditions in the same group can be true at the same time. Return the IDs of the conditions in each group enclosed in parentheses, for example: ((1,2),(3,4)). {unconditional_rule}Return ONLY the ID format, no other text.",
    user: "Conditions:\n{conditions}",
};

// =============================================================================
// TESTS
// =============================================================================
