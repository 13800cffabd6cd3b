//! Per-function argument role tables.
//!
//! Each row of a label file names a function followed by one label per
//! argument, one of which is `head`:
//!
//! ```text
//! PredVP   subj head   -- clause
//! ComplV2  head obj
//! ```
//!
//! Everything from the first token starting with `--` is a comment.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::Err;

/// Label of the argument slot that holds the syntactic head
pub const HEAD: &str = "head";

/// Maps function names to their ordered argument labels. Functions missing
/// from the table have their head at argument 0 and no other labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
  labels: HashMap<String, Vec<String>>,
  default: Vec<String>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self {
      labels: HashMap::new(),
      default: vec![HEAD.to_string()],
    }
  }
}

impl LabelTable {
  pub fn new() -> Self {
    Default::default()
  }

  /// Sets the labels of `function`, replacing any earlier entry. An empty
  /// label list is stored as the default `[head]`.
  pub fn insert(&mut self, function: impl Into<String>, labels: Vec<String>) {
    let labels = if labels.is_empty() {
      self.default.clone()
    } else {
      labels
    };
    self.labels.insert(function.into(), labels);
  }

  pub fn labels_for(&self, function: &str) -> &[String] {
    self.labels.get(function).unwrap_or(&self.default)
  }

  /// Argument position of the head. Rows that don't mention `head` keep it at 0.
  pub fn head_index(&self, function: &str) -> usize {
    self
      .labels_for(function)
      .iter()
      .position(|l| l == HEAD)
      .unwrap_or(0)
  }

  pub fn contains(&self, function: &str) -> bool {
    self.labels.contains_key(function)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let src = fs::read_to_string(path)
      .map_err(|e| -> Err { format!("label table {}: {}", path.display(), e).into() })?;
    let table: Self = src.parse()?;
    info!(functions = table.len(), path = %path.display(), "loaded label table");
    Ok(table)
  }
}

impl FromStr for LabelTable {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut table = Self::new();

    for line in s.lines() {
      let mut tokens = line.split_whitespace();
      let Some(function) = tokens.next() else {
        continue;
      };
      if function.starts_with("--") {
        continue;
      }

      let labels = tokens
        .take_while(|t| !t.starts_with("--"))
        .map(str::to_string)
        .collect();
      table.insert(function, labels);
    }

    Ok(table)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const LABELS: &str = r#"
    PredVP   subj head   -- clause level
    ComplV2  head obj
    V2       obj head -- comment -- with dashes

    UseN
  "#;

  #[test]
  fn test_parse_rows() {
    let table: LabelTable = LABELS.parse().unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.labels_for("PredVP"), ["subj", "head"]);
    assert_eq!(table.head_index("PredVP"), 1);
    assert_eq!(table.labels_for("V2"), ["obj", "head"]);
    assert_eq!(table.head_index("ComplV2"), 0);
  }

  #[test]
  fn test_missing_function_defaults_to_head() {
    let table: LabelTable = LABELS.parse().unwrap();
    assert!(!table.contains("DetCN"));
    assert_eq!(table.labels_for("DetCN"), [HEAD]);
    assert_eq!(table.head_index("DetCN"), 0);
  }

  #[test]
  fn test_row_without_labels() {
    let table: LabelTable = LABELS.parse().unwrap();
    assert!(table.contains("UseN"));
    assert_eq!(table.labels_for("UseN"), [HEAD]);
  }

  #[test]
  fn test_later_row_wins() {
    let table: LabelTable = "f head a\nf b head".parse().unwrap();
    assert_eq!(table.head_index("f"), 1);
  }
}
