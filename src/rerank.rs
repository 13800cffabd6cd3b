//! Rescoring a parser's candidates with head-dependent statistics.

use std::fmt;
use std::io::{self, BufRead, Write};

use tracing::{debug, error, info, warn};

use crate::expr::Expr;
use crate::heads::{bigrams, find_heads};
use crate::labels::LabelTable;
use crate::morpho::Linearizer;
use crate::parser::{Candidate, Parser};
use crate::scoring::{tree_probability, unigram_tree_probability, ProbTables};
use crate::Err;

/// Order in which a sentence's candidates are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
  /// Keep the parser's order
  Parser,
  /// Lowest rerank score first
  Rerank,
  /// Lowest combined score first
  Total,
}

#[derive(Debug, Clone)]
pub struct RerankOptions {
  /// Candidates taken from the parser per sentence
  pub max_parses: usize,
  pub unigram_fallback: bool,
  pub sort: SortKey,
}

impl Default for RerankOptions {
  fn default() -> Self {
    Self {
      max_parses: 10,
      unigram_fallback: true,
      sort: SortKey::Parser,
    }
  }
}

/// A candidate with its scores
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
  pub parser_prob: f64,
  pub rerank_prob: f64,
  /// Unigram-only cost, for diagnostics
  pub unigram_prob: f64,
  /// `parser_prob + rerank_prob`
  pub total: f64,
  pub bigrams: Vec<(String, String)>,
  pub expr: Expr,
}

/// Gold answers that came out on top, out of the sentences whose gold answer
/// was among the candidates at all
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Accuracy {
  pub successes: usize,
  pub total_tests: usize,
}

impl Accuracy {
  pub fn ratio(&self) -> Option<f64> {
    if self.total_tests == 0 {
      None
    } else {
      Some(self.successes as f64 / self.total_tests as f64)
    }
  }
}

impl fmt::Display for Accuracy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.ratio() {
      Some(r) => write!(f, "{}/{} ({:.4})", self.successes, self.total_tests, r),
      None => write!(f, "{}/{}", self.successes, self.total_tests),
    }
  }
}

/// Outcome of evaluating one sentence against its gold answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  NoGold,
  GoldNotFound,
  Success,
  Failure,
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::NoGold => "no-gold",
      Self::GoldNotFound => "gold-not-found",
      Self::Success => "success",
      Self::Failure => "failure",
    };
    write!(f, "{}", s)
  }
}

pub struct Reranker<'a> {
  parser: &'a dyn Parser,
  labels: &'a LabelTable,
  tables: &'a ProbTables,
  options: RerankOptions,
}

impl<'a> Reranker<'a> {
  pub fn new(
    parser: &'a dyn Parser,
    labels: &'a LabelTable,
    tables: &'a ProbTables,
    options: RerankOptions,
  ) -> Self {
    Self {
      parser,
      labels,
      tables,
      options,
    }
  }

  pub fn options(&self) -> &RerankOptions {
    &self.options
  }

  /// Head-finds and scores a single candidate
  pub fn score(&self, candidate: Candidate) -> Result<Scored, Err> {
    let (tuples, _) = find_heads(&candidate.expr, self.labels)?;
    let bigrams = bigrams(&tuples);

    let rerank_prob = tree_probability(&bigrams, self.tables, self.options.unigram_fallback);
    let nodes = bigrams.iter().map(|(node, _)| node.as_str());
    let unigram_prob = unigram_tree_probability(nodes, self.tables);

    Ok(Scored {
      parser_prob: candidate.log_prob,
      rerank_prob,
      unigram_prob,
      total: candidate.log_prob + rerank_prob,
      bigrams,
      expr: candidate.expr,
    })
  }

  /// Scores up to `max_parses` candidates of `sentence`. A sentence the
  /// parser rejects has no candidates.
  pub fn rerank(&self, sentence: &str) -> Vec<Scored> {
    debug!("parsing sentence: {}", sentence);
    let candidates = match self.parser.parse(sentence) {
      Ok(candidates) => candidates,
      Err(failure) => {
        error!("{}", failure);
        return Vec::new();
      }
    };

    let mut scored = Vec::new();
    for candidate in candidates.take(self.options.max_parses) {
      debug!("tree: {}", candidate.expr);
      match self.score(candidate) {
        Ok(s) => scored.push(s),
        Err(e) => warn!("skipping candidate: {}", e),
      }
    }

    match self.options.sort {
      SortKey::Parser => {}
      SortKey::Rerank => scored.sort_by(|a, b| a.rerank_prob.total_cmp(&b.rerank_prob)),
      SortKey::Total => scored.sort_by(|a, b| a.total.total_cmp(&b.total)),
    }

    scored
  }

  /// Prints every sentence followed by one line per candidate:
  /// `parser<TAB>rerank<TAB>total<TAB>linearization`
  pub fn report<W: Write>(
    &self,
    sentences: &[String],
    linearizer: &dyn Linearizer,
    out: &mut W,
    print_trees: bool,
  ) -> io::Result<()> {
    for sentence in sentences {
      writeln!(out, "{}", sentence)?;
      writeln!(out, "Parser\tRerank\tTotal\tTranslation")?;
      for result in self.rerank(sentence) {
        writeln!(
          out,
          "{}\t{}\t{}\t{}",
          result.parser_prob,
          result.rerank_prob,
          result.total,
          linearizer.linearize(&result.expr)
        )?;
        if print_trees {
          writeln!(out, "\t{}", result.expr)?;
          let pairs = result
            .bigrams
            .iter()
            .map(|(n, h)| format!("({},{})", n, h))
            .collect::<Vec<_>>();
          writeln!(out, "\t{}\tunigram: {}", pairs.join(" "), result.unigram_prob)?;
        }
      }
      writeln!(out)?;
    }
    Ok(())
  }

  /// Whether a candidate linearizing to `gold` has the lowest rerank score
  pub fn judge(&self, sentence: &str, gold: Option<&str>, linearizer: &dyn Linearizer) -> Verdict {
    let Some(gold) = gold else {
      return Verdict::NoGold;
    };

    let results = self.rerank(sentence);
    let best = results
      .iter()
      .map(|r| r.rerank_prob)
      .fold(f64::INFINITY, f64::min);

    let gold_scores = results
      .iter()
      .filter(|r| linearizer.linearize(&r.expr) == gold)
      .map(|r| r.rerank_prob)
      .collect::<Vec<_>>();

    if gold_scores.is_empty() {
      Verdict::GoldNotFound
    } else if gold_scores.iter().any(|&s| s <= best) {
      Verdict::Success
    } else {
      Verdict::Failure
    }
  }

  /// Judges every `(sentence, gold)` item, printing `sentence<TAB>verdict`
  /// lines, and returns the accuracy over sentences whose gold answer was
  /// found among the candidates
  pub fn evaluate<W: Write>(
    &self,
    items: &[(String, Option<String>)],
    linearizer: &dyn Linearizer,
    out: &mut W,
  ) -> io::Result<Accuracy> {
    let mut accuracy = Accuracy::default();

    for (sentence, gold) in items {
      let verdict = self.judge(sentence, gold.as_deref(), linearizer);
      match verdict {
        Verdict::Success => {
          accuracy.successes += 1;
          accuracy.total_tests += 1;
        }
        Verdict::Failure => accuracy.total_tests += 1,
        Verdict::NoGold | Verdict::GoldNotFound => {}
      }
      writeln!(out, "{}\t{}", sentence, verdict)?;
    }

    info!(
      successes = accuracy.successes,
      total_tests = accuracy.total_tests,
      "evaluation finished"
    );
    Ok(accuracy)
  }
}

/// One sentence per non-blank line
pub fn read_sentences<R: BufRead>(reader: R) -> Result<Vec<String>, Err> {
  let mut sentences = Vec::new();
  for line in reader.lines() {
    let line = line?;
    let line = line.trim();
    if !line.is_empty() {
      sentences.push(line.to_string());
    }
  }
  Ok(sentences)
}

/// `sentence<TAB>gold` per non-blank line; the gold column is optional
pub fn read_gold_items<R: BufRead>(reader: R) -> Result<Vec<(String, Option<String>)>, Err> {
  let mut items = Vec::new();
  for line in reader.lines() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let item = match line.split_once('\t') {
      Some((sentence, gold)) if !gold.trim().is_empty() => {
        (sentence.trim().to_string(), Some(gold.trim().to_string()))
      }
      Some((sentence, _)) => (sentence.trim().to_string(), None),
      None => (line.trim().to_string(), None),
    };
    items.push(item);
  }
  Ok(items)
}
