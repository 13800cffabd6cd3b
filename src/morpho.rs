//! Morphological lookup and linearization.
//!
//! `Lexicon` is a file-backed implementation of both, read from rows of
//! `form<TAB>function<TAB>category[<TAB>analysis]`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::expr::Expr;
use crate::Err;

/// One reading of a word form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
  pub function: String,
  pub category: String,
  /// Inflection information, e.g. `s Sg Nom`
  pub analysis: String,
}

pub trait Morphology {
  /// All grammar functions `form` could be an instance of
  fn lookup_morpho(&self, form: &str) -> Vec<Analysis>;

  /// Syntactic category of a grammar function
  fn function_category(&self, function: &str) -> Option<String>;
}

pub trait Linearizer {
  fn linearize(&self, expr: &Expr) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct Lexicon {
  by_form: HashMap<String, Vec<Analysis>>,
  categories: HashMap<String, String>,
  /// First form recorded for each function, used when linearizing
  forms: HashMap<String, String>,
}

impl Lexicon {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn insert(&mut self, form: &str, function: &str, category: &str, analysis: &str) {
    let readings = self.by_form.entry(form.to_string()).or_default();
    if !readings.iter().any(|a| a.function == function && a.analysis == analysis) {
      readings.push(Analysis {
        function: function.to_string(),
        category: category.to_string(),
        analysis: analysis.to_string(),
      });
    }
    self
      .categories
      .entry(function.to_string())
      .or_insert_with(|| category.to_string());
    self
      .forms
      .entry(function.to_string())
      .or_insert_with(|| form.to_string());
  }

  /// Number of distinct word forms
  pub fn len(&self) -> usize {
    self.by_form.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let src = fs::read_to_string(path)
      .map_err(|e| -> Err { format!("lexicon {}: {}", path.display(), e).into() })?;
    let lexicon: Self = src
      .parse()
      .map_err(|e| -> Err { format!("lexicon {}: {}", path.display(), e).into() })?;
    info!(forms = lexicon.len(), functions = lexicon.categories.len(), "loaded lexicon");
    Ok(lexicon)
  }
}

impl FromStr for Lexicon {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut lexicon = Self::new();
    for (idx, line) in s.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      match line.split('\t').collect::<Vec<_>>().as_slice() {
        [form, function, category] => lexicon.insert(form, function, category, ""),
        [form, function, category, analysis] => lexicon.insert(form, function, category, analysis),
        _ => {
          return Err(
            format!(
              "line {}: expected form<TAB>function<TAB>category, got '{}'",
              idx + 1,
              line
            )
            .into(),
          );
        }
      }
    }
    Ok(lexicon)
  }
}

impl Morphology for Lexicon {
  fn lookup_morpho(&self, form: &str) -> Vec<Analysis> {
    self.by_form.get(form).cloned().unwrap_or_default()
  }

  fn function_category(&self, function: &str) -> Option<String> {
    self.categories.get(function).cloned()
  }
}

impl Linearizer for Lexicon {
  /// Word forms of the lexical leaves in tree order. Leaves the lexicon
  /// doesn't know (tense, polarity, ...) have no surface form.
  fn linearize(&self, expr: &Expr) -> String {
    expr
      .leaves()
      .into_iter()
      .filter_map(|f| self.forms.get(f))
      .map(String::as_str)
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const LEXICON: &str = "eats\teat_V2\tV2\tVPres Sg P3
eats\teat_V\tV
the\tthe_Det\tDet
cat\tcat_N\tN\ts Sg Nom
cats\tcat_N\tN\ts Pl Nom
fish\tfish_N\tN
";

  #[test]
  fn test_lookup() {
    let lex: Lexicon = LEXICON.parse().unwrap();
    let funs = lex
      .lookup_morpho("eats")
      .into_iter()
      .map(|a| a.function)
      .collect::<Vec<_>>();
    assert_eq!(funs, vec!["eat_V2", "eat_V"]);
    assert!(lex.lookup_morpho("dog").is_empty());
    assert_eq!(lex.function_category("cat_N").as_deref(), Some("N"));
    assert_eq!(lex.function_category("dog_N"), None);
  }

  #[test]
  fn test_linearize_uses_first_form() {
    let lex: Lexicon = LEXICON.parse().unwrap();
    let expr: Expr =
      "PredVP (DetCN the_Det (UseN cat_N)) (ComplV2 eat_V2 (MassNP (UseN fish_N))) PPos"
        .parse()
      .unwrap();
    assert_eq!(lex.linearize(&expr), "the cat eats fish");
  }

  #[test]
  fn test_malformed_row() {
    assert!("eats\teat_V2".parse::<Lexicon>().is_err());
  }
}
