use std::io::Write;

use arlo::matrix::{MatrixError, ScoringMatrix};
use arlo::optimizer::{optimize, OptimizerMode, Weights};
use tempfile::NamedTempFile;

fn write_table(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn tab_table_loads_from_disk() {
    let file = write_table(
        "\t\tPE\tSE\tMA\n\
         Deployment\tMonolith\t1\t1\t-1\n\
         Deployment\tMicroservices\t0\t0\t1\n\
         Caching\tNo Cache\t-1\t1\t1\n\
         Caching\tIn-Memory Cache\t1\t0\t0\n",
    );
    let m = ScoringMatrix::load(file.path()).unwrap();

    assert_eq!(
        m.columns(),
        &["Performance Efficiency", "Security", "Maintainability"]
    );
    assert_eq!(m.categories(), &["Deployment", "Caching"]);
    assert_eq!(m.patterns().len(), 4);
    assert_eq!(m.category_of("In-Memory Cache"), Some("Caching"));

    let weights: Weights = [("Performance Efficiency".to_string(), 100)].into_iter().collect();
    let desired: Vec<String> = weights.keys().cloned().collect();
    let selection = optimize(OptimizerMode::Ilp, &m, &desired, &weights, None).unwrap();
    let picked: Vec<&str> = selection
        .decisions
        .iter()
        .map(|d| d.selected_pattern.as_str())
        .collect();
    assert_eq!(picked, vec!["Monolith", "In-Memory Cache"]);
}

#[test]
fn csv_table_with_crlf_line_endings() {
    let file = write_table(",,US,RE\r\nUser Interface,SPA,1,0\r\nUser Interface,SSR,0,1\r\n");
    let m = ScoringMatrix::load(file.path()).unwrap();
    assert_eq!(m.columns(), &["Usability", "Reliability"]);
    assert_eq!(m.pattern("SSR").unwrap().score("Reliability"), 1);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.tsv");
    let err = ScoringMatrix::load(&path).unwrap_err();
    match err {
        MatrixError::Io { path: reported, .. } => assert!(reported.ends_with("absent.tsv")),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn malformed_row_reports_line_number() {
    let file = write_table("\t\tPE\nDeployment\tMonolith\t1\n\nCaching\n");
    let err = ScoringMatrix::load(file.path()).unwrap_err();
    assert!(matches!(err, MatrixError::MalformedRow { line: 4, .. }));
}
