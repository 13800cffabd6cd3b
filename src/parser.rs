//! The grammar parser the reranker consumes.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::expr::Expr;
use crate::Err;

/// A parse with the parser's own log-probability
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub log_prob: f64,
  pub expr: Expr,
}

/// Lazily produced candidates, best first
pub type Candidates<'a> = Box<dyn Iterator<Item = Candidate> + 'a>;

/// The parser could not analyse a sentence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
  pub sentence: String,
  pub reason: String,
}

impl fmt::Display for ParseFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "could not parse '{}': {}", self.sentence, self.reason)
  }
}

impl Error for ParseFailure {}

pub trait Parser {
  fn parse<'a>(&'a self, sentence: &str) -> Result<Candidates<'a>, ParseFailure>;
}

/// Precomputed parses, read from rows of `sentence<TAB>logprob<TAB>expression`.
/// Candidates of a sentence are served in file order.
#[derive(Debug, Default, Clone)]
pub struct ParseTable {
  parses: HashMap<String, Vec<Candidate>>,
}

impl ParseTable {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn insert(&mut self, sentence: &str, candidate: Candidate) {
    self
      .parses
      .entry(sentence.trim().to_string())
      .or_default()
      .push(candidate);
  }

  /// Number of sentences with at least one parse
  pub fn len(&self) -> usize {
    self.parses.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let src = fs::read_to_string(path)
      .map_err(|e| -> Err { format!("parse table {}: {}", path.display(), e).into() })?;
    let table: Self = src
      .parse()
      .map_err(|e| -> Err { format!("parse table {}: {}", path.display(), e).into() })?;
    info!(sentences = table.len(), "loaded parse table");
    Ok(table)
  }
}

impl FromStr for ParseTable {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut table = Self::new();
    for (idx, line) in s.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let mut fields = line.splitn(3, '\t');
      let (Some(sentence), Some(log_prob), Some(expr)) =
        (fields.next(), fields.next(), fields.next())
      else {
        return Err(
          format!("line {}: expected sentence<TAB>logprob<TAB>expression", idx + 1).into(),
        );
      };
      let log_prob = log_prob
        .trim()
        .parse::<f64>()
        .map_err(|e| -> Err {
          format!("line {}: bad log probability '{}': {}", idx + 1, log_prob, e).into()
        })?;
      let expr = expr
        .parse::<Expr>()
        .map_err(|e| -> Err { format!("line {}: {}", idx + 1, e).into() })?;
      table.insert(sentence, Candidate { log_prob, expr });
    }
    Ok(table)
  }
}

impl Parser for ParseTable {
  fn parse<'a>(&'a self, sentence: &str) -> Result<Candidates<'a>, ParseFailure> {
    match self.parses.get(sentence.trim()) {
      Some(candidates) => Ok(Box::new(candidates.iter().cloned())),
      None => Err(ParseFailure {
        sentence: sentence.to_string(),
        reason: "no parses".to_string(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARSES: &str = "\
the cat eats fish\t12.5\tPredVP (DetCN the_Det cat_N) (ComplV2 eat_V2 fish_N)
the cat eats fish\t13.0\tPredVP (DetCN the_Det cat_N) (UseV eat_V)

time flies\t7.25\tPredVP time_N fly_V
";

  #[test]
  fn test_candidates_in_file_order() {
    let table: ParseTable = PARSES.parse().unwrap();
    assert_eq!(table.len(), 2);

    let candidates = table.parse(" the cat eats fish ").unwrap().collect::<Vec<_>>();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].log_prob, 12.5);
    assert_eq!(candidates[1].expr.to_string(), "PredVP (DetCN the_Det cat_N) (UseV eat_V)");
  }

  #[test]
  fn test_unknown_sentence_fails() {
    let table: ParseTable = PARSES.parse().unwrap();
    let err = table.parse("colorless green ideas").err().unwrap();
    assert_eq!(err.sentence, "colorless green ideas");
  }

  #[test]
  fn test_malformed_rows() {
    assert!("the cat\t1.0".parse::<ParseTable>().is_err());
    assert!("the cat\tx\tcat_N".parse::<ParseTable>().is_err());
    assert!("the cat\t1.0\t(cat_N".parse::<ParseTable>().is_err());
  }

  #[test]
  fn test_deeply_nested_row_is_an_error() {
    let expr = "f (".repeat(10_000) + "x" + &")".repeat(10_000);
    let err = format!("s\t1.0\t{}", expr).parse::<ParseTable>().unwrap_err();
    assert!(err.to_string().starts_with("line 1:"), "{}", err);
  }
}
