//! Abstract syntax expressions: trees of function applications.
//!
//! The text form is prefix application, with parenthesised sub-applications:
//! `PredVP (UsePN john_PN) (UseV walk_V)`.

use std::fmt;
use std::str::FromStr;

use crate::heads::MAX_DEPTH;
use crate::utils::{needed_char, needed_re, optional_char, skip_whitespace, ParseResult};
use crate::Err;

/// A function applied to zero or more argument expressions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
  App(String, Vec<Expr>),
}

impl Expr {
  pub fn app(function: impl Into<String>, children: Vec<Expr>) -> Self {
    Self::App(function.into(), children)
  }

  /// A zero-arity application, e.g. a lexical constant like `walk_V`
  pub fn leaf(function: impl Into<String>) -> Self {
    Self::App(function.into(), Vec::new())
  }

  pub fn function(&self) -> &str {
    let Self::App(function, _) = self;
    function
  }

  pub fn children(&self) -> &[Expr] {
    let Self::App(_, children) = self;
    children
  }

  pub fn arity(&self) -> usize {
    self.children().len()
  }

  pub fn is_leaf(&self) -> bool {
    self.arity() == 0
  }

  /// Number of application nodes in the tree
  pub fn size(&self) -> usize {
    1 + self.children().iter().map(Expr::size).sum::<usize>()
  }

  pub fn depth(&self) -> usize {
    1 + self.children().iter().map(Expr::depth).max().unwrap_or(0)
  }

  /// Functions of the zero-arity nodes, left to right
  pub fn leaves(&self) -> Vec<&str> {
    if self.is_leaf() {
      vec![self.function()]
    } else {
      self.children().iter().flat_map(Expr::leaves).collect()
    }
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.function())?;
    for child in self.children() {
      if child.is_leaf() {
        write!(f, " {}", child)?;
      } else {
        write!(f, " ({})", child)?;
      }
    }
    Ok(())
  }
}

impl FromStr for Expr {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = skip_whitespace(s);
    let (expr, rest) = if s.starts_with('(') {
      parse_argument(s, 0)?
    } else {
      parse_application(s, 0)?
    };

    let rest = skip_whitespace(rest);
    if rest.is_empty() {
      Ok(expr)
    } else {
      Err(format!("trailing input after expression: '{}'", rest).into())
    }
  }
}

/// Function names are anything up to whitespace or a bracket
fn parse_name(s: &str) -> ParseResult<'_, &str> {
  regex_static!(NAME, r"[^\s()]+");
  needed_re(&NAME, s).map_err(|e| format!("function name: {}", e).into())
}

/// An argument is either a bare function name or a parenthesised application.
/// `depth` counts the enclosing brackets.
fn parse_argument(s: &str, depth: usize) -> ParseResult<'_, Expr> {
  if let (Some(_), rem) = optional_char('(', s) {
    if depth >= MAX_DEPTH {
      return Err(format!("expression nested deeper than {} levels", MAX_DEPTH).into());
    }
    let rem = skip_whitespace(rem);
    let (expr, rem) = parse_application(rem, depth + 1)?;
    let rem = skip_whitespace(rem);
    let (_, rem) = needed_char(')', rem)
      .map_err(|e| -> Err { format!("argument: {}", e).into() })?;
    Ok((expr, rem))
  } else {
    let (name, rem) = parse_name(s)?;
    Ok((Expr::leaf(name), rem))
  }
}

/// Function name followed by its arguments, up to a closing bracket or end of input
fn parse_application(s: &str, depth: usize) -> ParseResult<'_, Expr> {
  let (function, s) = parse_name(s)?;

  let mut children = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() || rem.starts_with(')') {
      return Ok((Expr::app(function, children), rem));
    }
    let (child, s) = parse_argument(rem, depth)?;
    children.push(child);
    rem = s;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_leaf() {
    assert_eq!("walk_V".parse::<Expr>().unwrap(), Expr::leaf("walk_V"));
    assert_eq!(" ( walk_V ) ".parse::<Expr>().unwrap(), Expr::leaf("walk_V"));
  }

  #[test]
  fn test_parse_nested() {
    let expr: Expr = "PredVP (UsePN john_PN) (UseV walk_V)".parse().unwrap();
    assert_eq!(
      expr,
      Expr::app(
        "PredVP",
        vec![
          Expr::app("UsePN", vec![Expr::leaf("john_PN")]),
          Expr::app("UseV", vec![Expr::leaf("walk_V")]),
        ]
      )
    );
    assert_eq!(expr.size(), 5);
    assert_eq!(expr.depth(), 3);
    assert_eq!(expr.leaves(), vec!["john_PN", "walk_V"]);
  }

  #[test]
  fn test_parse_errors() {
    assert!("".parse::<Expr>().is_err());
    assert!("(f x".parse::<Expr>().is_err());
    assert!("f x)".parse::<Expr>().is_err());
    assert!("(f x) y".parse::<Expr>().is_err());
  }

  fn nested(depth: usize) -> String {
    "f (".repeat(depth) + "x" + &")".repeat(depth)
  }

  #[test]
  fn test_nesting_limit() {
    let expr: Expr = nested(MAX_DEPTH).parse().unwrap();
    assert_eq!(expr.depth(), MAX_DEPTH + 1);

    let err = nested(MAX_DEPTH + 1).parse::<Expr>().unwrap_err();
    assert!(err.to_string().contains("nested deeper"), "{}", err);

    // far past the limit fails the same way instead of exhausting the stack
    assert!(nested(30_000).parse::<Expr>().is_err());
  }

  #[test]
  fn test_display_roundtrip() {
    let src = "UseCl (TTAnt TPres ASimul) PPos \
               (PredVP (DetCN (DetQuant DefArt NumSg) (UseN dog_N)) (UseV bark_V))";
    let expr: Expr = src.parse().unwrap();
    assert_eq!(expr.to_string(), src);
  }
}
