//! Plain-text decision report.

use crate::architect::AnalysisOutcome;
use crate::concern::Concern;
use crate::optimizer::{QualityScore, SolveStatus};

const RULE: usize = 60;
const SUBRULE: usize = 40;
const DESCRIPTION_PREVIEW_CHARS: usize = 100;

pub fn render_report(outcome: &AnalysisOutcome) -> String {
    let mut out = String::new();
    let heavy = "=".repeat(RULE);
    let light = "-".repeat(SUBRULE);

    out.push_str(&format!("{heavy}\nARLO - Architectural Decision Report\n{heavy}\n"));
    out.push_str(&format!(
        "Generated: {}\n",
        outcome.started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Run: {}\n\n", outcome.run_id));

    let config = &outcome.config;
    out.push_str(&format!("Settings:\n{light}\n"));
    out.push_str(&format!("  optimizer: {}\n", config.optimizer));
    out.push_str(&format!("  weights: {}\n", config.weights.label()));
    out.push_str(&format!("  strict_asr_selection: {}\n", config.strict_asr_selection));
    out.push_str(&format!("  max_clusters: {}\n\n", config.max_clusters));

    let with_conditions = outcome.asrs.iter().filter(|r| !r.is_unconditional()).count();
    out.push_str(&format!("Requirements Summary\n{light}\n"));
    out.push_str(&format!("  Total Requirements: {}\n", outcome.requirements.len()));
    out.push_str(&format!("  Architecturally-Significant: {}\n", outcome.asrs.len()));
    out.push_str(&format!("  With Conditions: {with_conditions}\n\n"));

    out.push_str(&format!("Architecturally-Significant Requirements (ASRs)\n{light}\n"));
    for req in &outcome.asrs {
        out.push_str(&format!("\nR{}: {}\n", req.id, preview(&req.description)));
        let qualities: Vec<&str> = req.quality_attributes.iter().map(|q| q.name()).collect();
        out.push_str(&format!("  Quality Attributes: {}\n", qualities.join(", ")));
        out.push_str(&format!("  Condition: {}\n", req.condition_text));
    }
    out.push('\n');

    out.push_str(&format!("{heavy}\nArchitectural Decisions\n{heavy}\n"));
    if outcome.concerns.is_empty() {
        out.push_str("\nNo concerns: no architecturally-significant requirements were found.\n");
    }
    for (i, concern) in outcome.concerns.iter().enumerate() {
        render_concern(&mut out, i + 1, concern, &light);
    }

    out.push_str(&format!("\n{heavy}\nEnd of Report\n{heavy}\n"));
    out
}

fn render_concern(out: &mut String, number: usize, concern: &Concern, light: &str) {
    out.push_str(&format!("\nConcern {number}\n{light}\n"));

    out.push_str("Conditions:\n");
    for condition in &concern.conditions {
        out.push_str(&format!("  - {condition}\n"));
    }
    out.push('\n');

    out.push_str("Desired Qualities (weight):\n");
    for (quality, weight) in concern.qualities_by_weight() {
        out.push_str(&format!("  - {quality}: {weight}\n"));
    }
    out.push('\n');

    if concern.status != SolveStatus::Optimal {
        out.push_str(&format!(
            "No optimal selection found ({:?}); no decisions for this concern.\n",
            concern.status
        ));
    }
    out.push_str(&format!("Average Decision Score: {:.2}\n\n", concern.average_score));

    out.push_str("Decisions:\n");
    for decision in &concern.decisions {
        out.push_str(&format!("\n  {}:\n", decision.category));
        out.push_str(&format!("    Selected: {}\n", decision.selected_pattern));
        out.push_str(&format!("    Score: {}\n", decision.score));
        if !decision.satisfied.is_empty() {
            out.push_str(&format!("    Satisfies: {}\n", list(&decision.satisfied)));
        }
        if !decision.unsatisfied.is_empty() {
            out.push_str(&format!("    Tradeoffs: {}\n", list(&decision.unsatisfied)));
        }
    }

    if !concern.satisfaction_scores.is_empty() {
        out.push_str("\nQuality Satisfaction:\n");
        for (quality, score) in &concern.satisfaction_scores {
            out.push_str(&format!("  - {quality}: {score}\n"));
        }
    }
}

fn list(scores: &[QualityScore]) -> String {
    scores
        .iter()
        .map(|s| format!("{}({})", s.quality, s.score))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let cut: String = description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        description.to_string()
    }
}
