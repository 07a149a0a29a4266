use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arlo::gateway::ProviderError;
use arlo::optimizer::{OptimizerMode, SolveStatus, Weights};
use arlo::requirements::UNCONDITIONAL;
use arlo::{
    render_report, AnalysisConfig, Architect, EmbeddingOracle, Requirement, ScoringMatrix,
    TextOracle,
};
use async_trait::async_trait;
use serde_json::json;

const TRAFFIC: [&str; 8] = [
    "when traffic is high",
    "during traffic spikes",
    "under heavy traffic",
    "when traffic peaks",
    "if traffic doubles",
    "while traffic surges",
    "at peak traffic",
    "when traffic exceeds 10k users",
];

const OFFLINE: [&str; 8] = [
    "when the device is offline",
    "if the network goes offline",
    "while offline",
    "during offline use",
    "when working offline",
    "if offline for a day",
    "when the backend is offline",
    "in offline mode",
];

/// How the scripted oracle annotates one requirement.
#[derive(Clone)]
struct Annotation {
    significant: bool,
    qualities: Vec<&'static str>,
    condition: &'static str,
}

fn corpus() -> (String, HashMap<String, Annotation>) {
    let mut lines = Vec::new();
    let mut table = HashMap::new();
    let mut add = |desc: String, significant: bool, qualities: Vec<&'static str>, condition: &'static str| {
        lines.push(desc.clone());
        table.insert(
            desc,
            Annotation {
                significant,
                qualities,
                condition,
            },
        );
    };

    for (i, condition) in TRAFFIC.into_iter().enumerate() {
        add(
            format!("Catalog search {i} must stay fast {condition}."),
            true,
            vec!["Performance Efficiency"],
            condition,
        );
    }
    add("All personal data must be encrypted.".into(), true, vec!["Security"], "N/A");
    for (i, condition) in OFFLINE.into_iter().enumerate() {
        add(
            format!("Order capture {i} must keep working {condition}."),
            true,
            vec!["Reliability", "Telepathy"],
            condition,
        );
    }
    add("Logins must be audited.".into(), true, vec!["Security"], "");
    add("The logo should be blue.".into(), false, vec![], "N/A");
    add("The footer shows the year.".into(), false, vec![], "N/A");

    (lines.join("\n"), table)
}

fn topic(condition: &str) -> Option<&'static str> {
    if condition.contains("traffic") {
        Some("traffic")
    } else if condition.contains("offline") {
        Some("offline")
    } else {
        None
    }
}

struct ScriptedText {
    annotations: HashMap<String, Annotation>,
    partition_answer: &'static str,
    fail_extraction: bool,
    partition_calls: AtomicUsize,
    equivalence_calls: AtomicUsize,
}

impl ScriptedText {
    fn new(annotations: HashMap<String, Annotation>, partition_answer: &'static str) -> Self {
        Self {
            annotations,
            partition_answer,
            fail_extraction: false,
            partition_calls: AtomicUsize::new(0),
            equivalence_calls: AtomicUsize::new(0),
        }
    }

    fn extraction(&self, user: &str) -> String {
        let entries: Vec<serde_json::Value> = user
            .lines()
            .filter_map(|line| line.split_once(". "))
            .filter_map(|(id, desc)| {
                let id: u32 = id.trim().parse().ok()?;
                let a = self.annotations.get(desc)?;
                Some(json!({
                    "Id": id,
                    "IsArchitecturallySignificant": a.significant,
                    "QualityAttributes": a.qualities,
                    "ConditionText": a.condition,
                }))
            })
            .collect();
        format!(
            "Here you go:\n```json\n{}\n```",
            serde_json::to_string_pretty(&entries).unwrap()
        )
    }

    fn equivalence(&self, user: &str) -> String {
        self.equivalence_calls.fetch_add(1, Ordering::SeqCst);
        let conditions: Vec<&str> = user
            .lines()
            .filter_map(|l| l.split_once(": '"))
            .map(|(_, rest)| rest.trim_end_matches('\''))
            .collect();
        match conditions.as_slice() {
            [a, b] if topic(a).is_some() && topic(a) == topic(b) => "True".into(),
            _ => "False".into(),
        }
    }
}

#[async_trait]
impl TextOracle for ScriptedText {
    async fn generate(&self, instruction: &str, prompt: &str) -> Result<String, ProviderError> {
        if instruction.starts_with("I have provided") {
            if self.fail_extraction {
                return Err(ProviderError::provider("scripted", "extraction down", true));
            }
            Ok(self.extraction(prompt))
        } else if instruction.starts_with("If the following conditions") {
            Ok(self.equivalence(prompt))
        } else if instruction.starts_with("Organize") {
            self.partition_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.partition_answer.to_string())
        } else {
            Err(ProviderError::invalid_request("unexpected prompt"))
        }
    }
}

/// Two well-separated blobs, keyed by condition topic.
struct TopicEmbedder;

#[async_trait]
impl EmbeddingOracle for TopicEmbedder {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|t| {
                let jitter = (t.len() % 7) as f32 * 0.01;
                match topic(t) {
                    Some("traffic") => vec![10.0 + jitter, 0.0, 0.5],
                    Some(_) => vec![0.0, 10.0 + jitter, 0.5],
                    None => Vec::new(),
                }
            })
            .collect()
    }
}

struct NoEmbeddings;

#[async_trait]
impl EmbeddingOracle for NoEmbeddings {
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        vec![Vec::new(); texts.len()]
    }
}

fn architect(text: Arc<ScriptedText>, config: AnalysisConfig) -> Architect {
    Architect::new(
        Arc::new(ScoringMatrix::bundled().unwrap()),
        text,
        Arc::new(TopicEmbedder),
        config,
    )
}

fn w(pairs: &[(&str, i64)]) -> Weights {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[tokio::test]
async fn full_pipeline_groups_partitions_and_decides() {
    let (text, annotations) = corpus();
    let oracle = Arc::new(ScriptedText::new(annotations, "((1,2),(1,3))"));
    let architect = architect(oracle.clone(), AnalysisConfig::default());

    let outcome = architect.analyze(&text).await.unwrap();

    assert_eq!(outcome.stats.total, 20);
    assert_eq!(outcome.stats.asrs, 18);
    assert_eq!(outcome.asrs.len(), 18);
    // "Telepathy" is not a quality attribute and is dropped.
    let offline_asr = outcome
        .asrs
        .iter()
        .find(|r| r.condition_text == OFFLINE[0])
        .unwrap();
    assert_eq!(
        offline_asr.quality_attributes,
        vec![arlo::QualityAttribute::Reliability]
    );

    let groups = &outcome.condition_groups;
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].nominal_condition, UNCONDITIONAL);
    assert_eq!(groups[0].requirements.len(), 2);
    assert_eq!(groups[1].nominal_condition, TRAFFIC[0]);
    assert_eq!(groups[1].requirements.len(), 8);
    assert_eq!(groups[2].nominal_condition, OFFLINE[0]);
    assert_eq!(groups[2].requirements.len(), 8);
    for group in &groups[1..] {
        let topics: Vec<_> = group
            .requirements
            .iter()
            .map(|r| topic(&r.condition_text))
            .collect();
        assert!(topics.windows(2).all(|p| p[0] == p[1]));
    }
    assert!(oracle.equivalence_calls.load(Ordering::SeqCst) >= 14);

    let partition: Vec<Vec<usize>> = outcome
        .satisfiable_groups
        .iter()
        .map(|sg| sg.condition_groups.clone())
        .collect();
    assert_eq!(partition, vec![vec![0, 1], vec![0, 2]]);
    assert_eq!(oracle.partition_calls.load(Ordering::SeqCst), 1);

    let matrix = ScoringMatrix::bundled().unwrap();
    assert_eq!(outcome.concerns.len(), 2);
    let traffic = &outcome.concerns[0];
    assert_eq!(traffic.conditions, vec![UNCONDITIONAL.to_string(), TRAFFIC[0].to_string()]);
    assert_eq!(
        traffic.desired_qualities,
        w(&[("Performance Efficiency", 8), ("Security", 2)])
    );
    assert_eq!(
        traffic.normalized_weights,
        w(&[("Performance Efficiency", 80), ("Security", 20)])
    );
    assert_eq!(traffic.status, SolveStatus::Optimal);
    assert_eq!(traffic.decisions.len(), matrix.categories().len());

    let offline = &outcome.concerns[1];
    assert_eq!(
        offline.desired_qualities,
        w(&[("Reliability", 8), ("Security", 2)])
    );

    let report = render_report(&outcome);
    assert!(report.contains("Concern 2"));
    assert!(report.contains("Architecturally-Significant: 18"));
    assert!(report.contains("With Conditions: 16"));
}

#[tokio::test]
async fn greedy_and_exact_agree_on_concern_totals() {
    let (text, annotations) = corpus();
    let exact = architect(
        Arc::new(ScriptedText::new(annotations.clone(), "((1,2),(1,3))")),
        AnalysisConfig::default(),
    )
    .analyze(&text)
    .await
    .unwrap();
    let greedy = architect(
        Arc::new(ScriptedText::new(annotations, "((1,2),(1,3))")),
        AnalysisConfig {
            optimizer: OptimizerMode::Greedy,
            ..AnalysisConfig::default()
        },
    )
    .analyze(&text)
    .await
    .unwrap();

    assert_ne!(exact.run_id, greedy.run_id);
    for (e, g) in exact.concerns.iter().zip(&greedy.concerns) {
        assert!(e.total_score >= g.total_score);
        assert_eq!(e.total_score, g.total_score);
    }
}

#[tokio::test]
async fn unparsable_partition_falls_back_to_one_group_after_three_attempts() {
    let (text, annotations) = corpus();
    let oracle = Arc::new(ScriptedText::new(annotations, "I am not sure how to group these."));
    let outcome = architect(oracle.clone(), AnalysisConfig::default())
        .analyze(&text)
        .await
        .unwrap();

    assert_eq!(oracle.partition_calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.satisfiable_groups.len(), 1);
    assert_eq!(outcome.satisfiable_groups[0].condition_groups, vec![0, 1, 2]);
    assert_eq!(outcome.concerns.len(), 1);
    assert_eq!(
        outcome.concerns[0].desired_qualities,
        w(&[("Performance Efficiency", 8), ("Reliability", 8), ("Security", 2)])
    );
}

#[tokio::test]
async fn failed_extraction_yields_no_concerns() {
    let (text, annotations) = corpus();
    let mut scripted = ScriptedText::new(annotations, "((1,2))");
    scripted.fail_extraction = true;
    let oracle = Arc::new(scripted);

    let outcome = architect(oracle.clone(), AnalysisConfig::default())
        .analyze(&text)
        .await
        .unwrap();

    assert_eq!(outcome.stats.total, 20);
    assert_eq!(outcome.stats.parsed, 0);
    assert!(outcome.asrs.is_empty());
    assert!(outcome.condition_groups.is_empty());
    assert!(outcome.concerns.is_empty());
    assert_eq!(oracle.partition_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_embeddings_make_singleton_groups() {
    let (_, annotations) = corpus();
    let oracle = Arc::new(ScriptedText::new(annotations, "((1,2,3,4))"));
    let architect = Architect::new(
        Arc::new(ScoringMatrix::bundled().unwrap()),
        oracle.clone(),
        Arc::new(NoEmbeddings),
        AnalysisConfig {
            weights: arlo::WeightsMode::EquallyImportant,
            ..AnalysisConfig::default()
        },
    );

    let reqs = vec![
        Requirement::new(3, "c").significant([arlo::QualityAttribute::Security], "when offline"),
        Requirement::new(1, "a").significant([arlo::QualityAttribute::Usability], "when traffic is high"),
        Requirement::new(2, "b").significant([arlo::QualityAttribute::Security], "N/A"),
        Requirement::new(4, "d"),
    ];
    let outcome = architect.analyze_requirements(reqs).await.unwrap();

    let nominals: Vec<&str> = outcome
        .condition_groups
        .iter()
        .map(|g| g.nominal_condition.as_str())
        .collect();
    assert_eq!(nominals, vec![UNCONDITIONAL, "when traffic is high", "when offline"]);
    assert_eq!(oracle.equivalence_calls.load(Ordering::SeqCst), 0);

    // Index 4 is out of range and dropped; the rest form one group.
    assert_eq!(outcome.satisfiable_groups.len(), 1);
    assert_eq!(outcome.satisfiable_groups[0].condition_groups, vec![0, 1, 2]);

    let concern = &outcome.concerns[0];
    assert_eq!(concern.desired_qualities.len(), 8);
    assert!(concern.desired_qualities.values().all(|v| *v == 1));
    assert_eq!(concern.normalized_weights.values().copied().next(), Some(12));
}
