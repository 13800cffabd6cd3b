//! Head percolation over abstract syntax trees.

use std::fmt;

use crate::expr::Expr;
use crate::labels::LabelTable;
use crate::Err;

/// Argument label given to the outermost node of a tree
pub const ROOT_LABEL: &str = "root";
/// Stand-in governor for nodes that have none
pub const ROOT_HEAD: &str = "ROOT";
/// Deepest tree `find_heads` will descend into
pub const MAX_DEPTH: usize = 512;

/// One application node after head finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadTuple {
  pub function: String,
  /// Heads of the governing nodes, nearest first
  pub governors: Vec<String>,
  pub label: String,
}

impl HeadTuple {
  /// The nearest governor, or `ROOT`
  pub fn governor(&self) -> &str {
    self.governors.first().map(String::as_str).unwrap_or(ROOT_HEAD)
  }

  pub fn bigram(&self) -> (String, String) {
    (self.function.clone(), self.governor().to_string())
  }
}

impl fmt::Display for HeadTuple {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}] <-", self.function, self.label)?;
    if self.governors.is_empty() {
      write!(f, " {}", ROOT_HEAD)?;
    }
    for g in self.governors.iter() {
      write!(f, " {}", g)?;
    }
    Ok(())
  }
}

/// Flattens `expr` into one `HeadTuple` per application node and returns the
/// function that heads the whole tree.
///
/// At every node the label table picks the head argument. The head argument
/// is visited with the node's own governors and label, the remaining
/// arguments with the head's function pushed onto the front of the governor
/// chain and their own argument label. Head tuples come first, then the
/// dependents' tuples in argument order.
///
/// ```
/// use headrank::{find_heads, Expr, LabelTable};
///
/// let labels: LabelTable = "ComplV2 head obj".parse().unwrap();
/// let expr: Expr = "ComplV2 eat_V2 the_Det".parse().unwrap();
/// let (tuples, head) = find_heads(&expr, &labels).unwrap();
///
/// assert_eq!(head, "eat_V2");
/// assert_eq!(tuples[1].function, "the_Det");
/// assert_eq!(tuples[1].governors, ["eat_V2"]);
/// assert_eq!(tuples[1].label, "obj");
/// ```
pub fn find_heads(expr: &Expr, labels: &LabelTable) -> Result<(Vec<HeadTuple>, String), Err> {
  find_heads_under(expr, labels, &[], ROOT_LABEL, 0)
}

fn find_heads_under(
  expr: &Expr,
  labels: &LabelTable,
  governors: &[String],
  label: &str,
  depth: usize,
) -> Result<(Vec<HeadTuple>, String), Err> {
  if depth > MAX_DEPTH {
    return Err(format!("expression deeper than {} nodes at {}", MAX_DEPTH, expr.function()).into());
  }

  let Expr::App(function, arguments) = expr;
  let arg_labels = labels.labels_for(function);
  let head_idx = labels.head_index(function);

  if arguments.len() <= head_idx {
    let tuple = HeadTuple {
      function: function.clone(),
      governors: governors.to_vec(),
      label: label.to_string(),
    };
    return Ok((vec![tuple], function.clone()));
  }

  let (mut out, head) =
    find_heads_under(&arguments[head_idx], labels, governors, label, depth + 1)?;

  // every dependent sees the same chain, extended with this node's head
  let mut dependent_governors = Vec::with_capacity(governors.len() + 1);
  dependent_governors.push(head.clone());
  dependent_governors.extend_from_slice(governors);

  for (idx, argument) in arguments.iter().enumerate() {
    if idx == head_idx {
      continue;
    }
    let arg_label = arg_labels.get(idx).map(String::as_str).unwrap_or(label);
    let (tuples, _) =
      find_heads_under(argument, labels, &dependent_governors, arg_label, depth + 1)?;
    out.extend(tuples);
  }

  Ok((out, head))
}

/// Projects head tuples onto (node, nearest governor) pairs
pub fn bigrams(tuples: &[HeadTuple]) -> Vec<(String, String)> {
  tuples.iter().map(HeadTuple::bigram).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tuple(function: &str, governors: &[&str], label: &str) -> HeadTuple {
    HeadTuple {
      function: function.to_string(),
      governors: governors.iter().map(|g| g.to_string()).collect(),
      label: label.to_string(),
    }
  }

  fn labels() -> LabelTable {
    r#"
      PredVP  subj head
      ComplV2 head obj
      DetCN   det head
      UseCl   tense pol head
    "#
    .parse()
    .unwrap()
  }

  #[test]
  fn test_single_leaf() {
    let (tuples, head) = find_heads(&Expr::leaf("walk_V"), &labels()).unwrap();
    assert_eq!(head, "walk_V");
    assert_eq!(tuples, vec![tuple("walk_V", &[], ROOT_LABEL)]);
  }

  #[test]
  fn test_clause() {
    let expr: Expr = "PredVP (DetCN the_Det (UseN cat_N)) (ComplV2 eat_V2 (DetCN a_Det fish_N))"
      .parse()
      .unwrap();
    let (tuples, head) = find_heads(&expr, &labels()).unwrap();

    assert_eq!(head, "eat_V2");
    assert_eq!(
      tuples,
      vec![
        tuple("eat_V2", &[], "root"),
        tuple("fish_N", &["eat_V2"], "obj"),
        tuple("a_Det", &["fish_N", "eat_V2"], "det"),
        tuple("cat_N", &["eat_V2"], "subj"),
        tuple("the_Det", &["cat_N", "eat_V2"], "det"),
      ]
    );
  }

  #[test]
  fn test_one_tuple_per_headless_node() {
    let expr: Expr = "UseCl (TTAnt TPres ASimul) PPos (PredVP (UsePN john_PN) (UseV walk_V))"
      .parse()
      .unwrap();
    let (tuples, _) = find_heads(&expr, &labels()).unwrap();
    // every inner node here fills its head slot, so it is represented by its
    // head and only the leaves produce tuples
    assert_eq!(tuples.len(), expr.leaves().len());

    let mut functions = tuples.iter().map(|t| t.function.as_str()).collect::<Vec<_>>();
    functions.sort();
    assert_eq!(functions, vec!["ASimul", "PPos", "TPres", "john_PN", "walk_V"]);
  }

  #[test]
  fn test_unknown_function_inherits_label() {
    // f is not in the table: head is argument 0, the rest inherit "obj"
    let expr: Expr = "ComplV2 eat_V2 (f x y z)".parse().unwrap();
    let (tuples, _) = find_heads(&expr, &labels()).unwrap();
    assert_eq!(
      tuples,
      vec![
        tuple("eat_V2", &[], "root"),
        tuple("x", &["eat_V2"], "obj"),
        tuple("y", &["x", "eat_V2"], "obj"),
        tuple("z", &["x", "eat_V2"], "obj"),
      ]
    );
  }

  #[test]
  fn test_missing_head_argument() {
    // head slot is argument 1 but only one argument is present
    let expr: Expr = "PredVP john_PN".parse().unwrap();
    let (tuples, head) = find_heads(&expr, &labels()).unwrap();
    assert_eq!(head, "PredVP");
    assert_eq!(tuples, vec![tuple("PredVP", &[], "root")]);
  }

  #[test]
  fn test_depth_guard() {
    let mut expr = Expr::leaf("x");
    for _ in 0..(MAX_DEPTH + 10) {
      expr = Expr::app("f", vec![expr]);
    }
    assert!(find_heads(&expr, &labels()).is_err());
  }

  #[test]
  fn test_bigrams_use_nearest_governor() {
    let tuples = vec![
      tuple("eat_V2", &[], "root"),
      tuple("the_Det", &["fish_N", "eat_V2"], "det"),
    ];
    assert_eq!(
      bigrams(&tuples),
      vec![
        ("eat_V2".to_string(), ROOT_HEAD.to_string()),
        ("the_Det".to_string(), "fish_N".to_string()),
      ]
    );
  }
}
