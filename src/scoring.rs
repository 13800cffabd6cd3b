//! Bigram/unigram probability tables and tree scores.
//!
//! Scores are costs: the more probable a tree, the lower its score.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::utils::{needed_char, optional_char, optional_re, skip_whitespace, ParseResult};
use crate::Err;

/// Trained (node, head) and node probabilities. Unseen keys have probability 0.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProbTables {
  bigrams: HashMap<String, HashMap<String, f64>>,
  unigrams: HashMap<String, f64>,
}

impl ProbTables {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn insert_bigram(&mut self, node: impl Into<String>, head: impl Into<String>, prob: f64) {
    self
      .bigrams
      .entry(node.into())
      .or_default()
      .insert(head.into(), prob);
  }

  pub fn insert_unigram(&mut self, node: impl Into<String>, prob: f64) {
    self.unigrams.insert(node.into(), prob);
  }

  pub fn bigram(&self, node: &str, head: &str) -> f64 {
    self
      .bigrams
      .get(node)
      .and_then(|heads| heads.get(head))
      .copied()
      .unwrap_or(0.0)
  }

  pub fn unigram(&self, node: &str) -> f64 {
    self.unigrams.get(node).copied().unwrap_or(0.0)
  }

  pub fn bigram_count(&self) -> usize {
    self.bigrams.values().map(HashMap::len).sum()
  }

  pub fn unigram_count(&self) -> usize {
    self.unigrams.len()
  }

  /// Reads `KEY<TAB>PROB` rows where KEY is a tuple literal like
  /// `('eat_V2', 'the_Det')`. Keys that aren't pairs are skipped.
  pub fn add_bigrams(&mut self, src: &str) -> Result<(), Err> {
    for (idx, line) in src.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let (key, prob) = parse_prob_line(line)
        .map_err(|e| -> Err { format!("bigram line {}: {}", idx + 1, e).into() })?;
      let key = parse_key(key)
        .map_err(|e| -> Err { format!("bigram line {}: {}", idx + 1, e).into() })?;
      if let [node, head] = key.as_slice() {
        self.insert_bigram(node.as_str(), head.as_str(), prob);
      }
    }
    Ok(())
  }

  /// Reads `token<TAB>probability` rows
  pub fn add_unigrams(&mut self, src: &str) -> Result<(), Err> {
    for (idx, line) in src.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let (token, prob) = parse_prob_line(line)
        .map_err(|e| -> Err { format!("unigram line {}: {}", idx + 1, e).into() })?;
      self.insert_unigram(token.trim(), prob);
    }
    Ok(())
  }

  pub fn read_from_files(
    bigram_path: impl AsRef<Path>,
    unigram_path: impl AsRef<Path>,
  ) -> Result<Self, Err> {
    let bigram_path = bigram_path.as_ref();
    let unigram_path = unigram_path.as_ref();
    let mut tables = Self::new();

    let src = fs::read_to_string(bigram_path)
      .map_err(|e| -> Err { format!("bigram file {}: {}", bigram_path.display(), e).into() })?;
    tables.add_bigrams(&src)?;

    let src = fs::read_to_string(unigram_path)
      .map_err(|e| -> Err { format!("unigram file {}: {}", unigram_path.display(), e).into() })?;
    tables.add_unigrams(&src)?;

    info!(
      bigrams = tables.bigram_count(),
      unigrams = tables.unigram_count(),
      "loaded probability tables"
    );
    Ok(tables)
  }
}

/// Splits a row at its last tab into key and probability
fn parse_prob_line(line: &str) -> Result<(&str, f64), Err> {
  let (key, prob) = line
    .trim_end()
    .rsplit_once('\t')
    .ok_or_else(|| -> Err { format!("expected KEY<TAB>PROB, got '{}'", line).into() })?;
  let prob = prob
    .trim()
    .parse::<f64>()
    .map_err(|e| -> Err { format!("bad probability '{}': {}", prob, e).into() })?;
  Ok((key, prob))
}

/// Parses a tuple literal key: `('a', 'b')`, `("it's", 'b')`, `('a',)`.
/// A key without brackets is read as whitespace separated tokens.
fn parse_key(s: &str) -> Result<Vec<String>, Err> {
  let s = s.trim();
  if !s.starts_with('(') {
    return Ok(s.split_whitespace().map(str::to_string).collect());
  }

  let (_, mut rem) = needed_char('(', s)?;
  let mut items = Vec::new();
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), rest) = optional_char(')', rem) {
      if !rest.trim().is_empty() {
        return Err(format!("trailing input after key: '{}'", rest).into());
      }
      return Ok(items);
    }
    let (item, rest) = parse_quoted(rem)?;
    items.push(item);
    rem = skip_whitespace(rest);
    rem = optional_char(',', rem).1;
  }
}

fn parse_quoted(s: &str) -> ParseResult<'_, String> {
  regex_static!(SINGLE, r"'((?:[^'\\]|\\.)*)'");
  regex_static!(DOUBLE, r#""((?:[^"\\]|\\.)*)""#);

  let (quoted, rest) = match optional_re(&SINGLE, s) {
    (Some(q), rest) => (q, rest),
    (None, _) => match optional_re(&DOUBLE, s) {
      (Some(q), rest) => (q, rest),
      (None, _) => return Err(format!("expected quoted string at '{}'", s).into()),
    },
  };

  let inner = &quoted[1..quoted.len() - 1];
  Ok((unescape(inner), rest))
}

fn unescape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      if let Some(next) = chars.next() {
        out.push(next);
      }
    } else {
      out.push(c);
    }
  }
  out
}

/// Scores (node, nearest head) pairs against the tables. Lower is better.
///
/// Each pair contributes one term, and the score is their negated sum:
///
/// * seen as a bigram: `ln P(node, head) - ln P(head)`. When the head has no
///   unigram probability the term is just `ln P(node, head)`, so an unseen
///   head never drives the score to infinity.
/// * otherwise, with `unigram_fallback` and a unigram for the node:
///   `ln P(node)`.
/// * otherwise `0`.
pub fn tree_probability(
  pairs: &[(String, String)],
  tables: &ProbTables,
  unigram_fallback: bool,
) -> f64 {
  let mut total = 0.0;
  let mut bigram_hits = 0;
  let mut unigram_hits = 0;

  for (node, head) in pairs {
    let bigram_prob = tables.bigram(node, head);
    let unigram_prob = tables.unigram(node);

    let logprob = if bigram_prob != 0.0 {
      debug!("({},{}): {}", node, head, bigram_prob);
      bigram_hits += 1;
      let head_prob = tables.unigram(head);
      if head_prob != 0.0 {
        bigram_prob.ln() - head_prob.ln()
      } else {
        bigram_prob.ln()
      }
    } else if unigram_fallback && unigram_prob != 0.0 {
      debug!("({},): {}", node, unigram_prob);
      unigram_hits += 1;
      unigram_prob.ln()
    } else {
      debug!("{} no collected data", node);
      0.0
    };

    total -= logprob;
  }

  debug!(
    "tree probability from {} bigrams and {} unigrams",
    bigram_hits, unigram_hits
  );
  total
}

/// Unigram-only cost: `-ln P(node)` summed over nodes with a probability
pub fn unigram_tree_probability<'a, I>(nodes: I, tables: &ProbTables) -> f64
where
  I: IntoIterator<Item = &'a str>,
{
  nodes
    .into_iter()
    .map(|node| tables.unigram(node))
    .filter(|&p| p != 0.0)
    .map(|p| -p.ln())
    .sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pair(node: &str, head: &str) -> (String, String) {
    (node.to_string(), head.to_string())
  }

  fn tables() -> ProbTables {
    let mut tables = ProbTables::new();
    tables.insert_bigram("the_Det", "eat_V2", 0.4);
    tables.insert_unigram("eat_V2", 0.1);
    tables.insert_unigram("the_Det", 0.2);
    tables
  }

  fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
  }

  #[test]
  fn test_parse_key() {
    assert_eq!(parse_key("('a', 'b')").unwrap(), vec!["a", "b"]);
    assert_eq!(parse_key("(\"it's\", 'b')").unwrap(), vec!["it's", "b"]);
    assert_eq!(parse_key("('a',)").unwrap(), vec!["a"]);
    assert_eq!(parse_key("('a', 'b', 'nsubj')").unwrap().len(), 3);
    assert_eq!(parse_key("a b").unwrap(), vec!["a", "b"]);
    assert!(parse_key("('a' 'b'").is_err());
  }

  #[test]
  fn test_bigram_file_skips_other_arities() {
    let mut tables = ProbTables::new();
    tables
      .add_bigrams("('a', 'b')\t0.5\n\n('a',)\t0.1\n('a', 'b', 'obj')\t0.2\n")
      .unwrap();
    assert_eq!(tables.bigram_count(), 1);
    assert_eq!(tables.bigram("a", "b"), 0.5);
  }

  #[test]
  fn test_bad_probability_is_an_error() {
    let mut tables = ProbTables::new();
    assert!(tables.add_bigrams("('a', 'b')\tlots").is_err());
    assert!(tables.add_unigrams("a").is_err());
  }

  #[test]
  fn test_unigram_file() {
    let mut tables = ProbTables::new();
    tables.add_unigrams("eat_V2\t0.25\nthe_Det\t1e-3\n").unwrap();
    assert_eq!(tables.unigram("eat_V2"), 0.25);
    assert_eq!(tables.unigram("the_Det"), 0.001);
    assert_eq!(tables.unigram("cat_N"), 0.0);
  }

  #[test]
  fn test_bigram_normalised_by_head() {
    let score = tree_probability(&[pair("the_Det", "eat_V2")], &tables(), false);
    assert!(close(score, -(0.4f64.ln() - 0.1f64.ln())));
  }

  #[test]
  fn test_unigram_fallback() {
    let pairs = [pair("eat_V2", "ROOT")];
    assert_eq!(tree_probability(&pairs, &tables(), false), 0.0);
    assert!(close(tree_probability(&pairs, &tables(), true), -(0.1f64.ln())));
  }

  #[test]
  fn test_no_evidence_is_neutral() {
    let pairs = [pair("cat_N", "ROOT"), pair("dog_N", "cat_N")];
    assert_eq!(tree_probability(&pairs, &tables(), true), 0.0);
    assert_eq!(tree_probability(&pairs, &tables(), false), 0.0);
  }

  #[test]
  fn test_order_invariant() {
    let a = [pair("the_Det", "eat_V2"), pair("eat_V2", "ROOT"), pair("cat_N", "eat_V2")];
    let b = [pair("cat_N", "eat_V2"), pair("the_Det", "eat_V2"), pair("eat_V2", "ROOT")];
    assert!(close(
      tree_probability(&a, &tables(), true),
      tree_probability(&b, &tables(), true)
    ));
  }

  #[test]
  fn test_unseen_head_skips_normalisation() {
    let mut tables = tables();
    tables.insert_bigram("eat_V2", "ROOT", 0.5);
    let score = tree_probability(&[pair("eat_V2", "ROOT")], &tables, true);
    assert!(score.is_finite());
    assert!(close(score, -(0.5f64.ln())));
  }

  #[test]
  fn test_unigram_tree_probability() {
    let score = unigram_tree_probability(["eat_V2", "the_Det", "cat_N"], &tables());
    assert!(close(score, -(0.1f64.ln()) - 0.2f64.ln()));
  }
}
