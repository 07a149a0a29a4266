//! Quality/pattern scoring matrix.
//!
//! A static table mapping each architectural pattern to a signed score per
//! quality attribute, with every pattern assigned to exactly one decision
//! category. Loaded once per process and shared read-only.
//!
//! Table format (tab- or comma-delimited):
//!
//! ```text
//! <blank>  <blank>        PE  CO  US  RE  SE  MA  PO  CE
//! Deployment  Monolith     1   0   0   0   1  -1  -1   1
//! ```
//!
//! Header codes map to canonical quality names; unknown codes are kept as
//! written. Score cells are matched to header columns by position and
//! non-integer cells are skipped.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::quality::column_name;

const BUNDLED_TABLE: &str = include_str!("../data/quality_archipattern_matrix.tsv");

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("failed to read scoring table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scoring table is empty")]
    Empty,
    #[error("scoring table header has no quality columns")]
    MissingHeader,
    #[error("line {line}: expected category, pattern and at least one score, got {content:?}")]
    MalformedRow { line: usize, content: String },
    #[error("pattern {pattern:?} listed twice (categories {first:?} and {second:?})")]
    DuplicatePattern {
        pattern: String,
        first: String,
        second: String,
    },
}

/// One pattern row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternRow {
    pub name: String,
    pub category: String,
    /// (quality, score) in column order. Only parsed cells are present.
    pub scores: Vec<(String, i64)>,
}

impl PatternRow {
    /// Score for a quality; missing entries count as 0.
    pub fn score(&self, quality: &str) -> i64 {
        self.scores
            .iter()
            .find(|(q, _)| q == quality)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    pub fn has_entry(&self, quality: &str) -> bool {
        self.scores.iter().any(|(q, _)| q == quality)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoringMatrix {
    columns: Vec<String>,
    /// Category names in first-seen order.
    categories: Vec<String>,
    /// Pattern rows in table order.
    patterns: Vec<PatternRow>,
}

impl ScoringMatrix {
    /// Empty matrix with the given quality columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            categories: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// The table compiled into the crate.
    pub fn bundled() -> Result<Self, MatrixError> {
        Self::parse(BUNDLED_TABLE)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MatrixError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MatrixError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, MatrixError> {
        let mut lines = text.lines().enumerate();
        let (_, header) = lines
            .by_ref()
            .find(|(_, l)| !l.trim().is_empty())
            .ok_or(MatrixError::Empty)?;

        let delimiter = if header.contains('\t') { '\t' } else { ',' };
        let columns: Vec<String> = split_cells(header, delimiter)
            .into_iter()
            .map(column_name)
            .collect();
        if columns.is_empty() {
            return Err(MatrixError::MissingHeader);
        }

        let mut matrix = Self::new(columns);
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split(delimiter).map(str::trim).collect();
            if cells.len() < 3 || cells[0].is_empty() || cells[1].is_empty() {
                return Err(MatrixError::MalformedRow {
                    line: idx + 1,
                    content: line.to_string(),
                });
            }

            let scores: Vec<(String, i64)> = cells[2..]
                .iter()
                .zip(matrix.columns.iter())
                .filter_map(|(cell, column)| cell.parse::<i64>().ok().map(|v| (column.clone(), v)))
                .collect();
            matrix.add_pattern(cells[0], cells[1], scores)?;
        }

        if matrix.patterns.is_empty() {
            return Err(MatrixError::Empty);
        }
        Ok(matrix)
    }

    /// Register a category. Categories are otherwise created by their first
    /// pattern.
    pub fn add_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
    }

    pub fn add_pattern<Q: Into<String>>(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        scores: impl IntoIterator<Item = (Q, i64)>,
    ) -> Result<(), MatrixError> {
        let category = category.into();
        let name = name.into();
        if let Some(existing) = self.pattern(&name) {
            return Err(MatrixError::DuplicatePattern {
                pattern: name,
                first: existing.category.clone(),
                second: category,
            });
        }

        let scores: Vec<(String, i64)> = scores.into_iter().map(|(q, v)| (q.into(), v)).collect();
        for (q, _) in &scores {
            if !self.columns.contains(q) {
                self.columns.push(q.clone());
            }
        }

        self.add_category(category.clone());
        self.patterns.push(PatternRow {
            name,
            category,
            scores,
        });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn patterns(&self) -> &[PatternRow] {
        &self.patterns
    }

    pub fn pattern(&self, name: &str) -> Option<&PatternRow> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn category_of(&self, pattern: &str) -> Option<&str> {
        self.pattern(pattern).map(|p| p.category.as_str())
    }

    /// Patterns of one category, in table order.
    pub fn patterns_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a PatternRow> + 'a {
        self.patterns.iter().filter(move |p| p.category == category)
    }
}

/// Header cells; the blank cells above the category and pattern columns are
/// dropped.
fn split_cells(line: &str, delimiter: char) -> Vec<&str> {
    line.split(delimiter)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}
