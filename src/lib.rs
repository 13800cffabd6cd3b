//! Reranking of ambiguous grammar parses with head-dependent statistics
//! learned from dependency treebanks.
//!
//! A parser proposes candidate abstract syntax trees. [`find_heads`] flattens
//! each tree into (function, governors, label) tuples using a per-function
//! [`LabelTable`], [`tree_probability`] turns the (node, nearest governor)
//! pairs into a cost with [`ProbTables`] trained from treebanks, and the
//! [`Reranker`] combines that cost with the parser's own score. The
//! statistics are trained from ambiguity-set counts produced by
//! [`count_features`] over CoNLL-U treebanks.

#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod utils;

pub mod conllu;
pub mod expr;
pub mod features;
pub mod heads;
pub mod labels;
pub mod morpho;
pub mod parser;
pub mod rerank;
pub mod scoring;

pub use crate::conllu::{Treebank, UDGraph, UDNode};
pub use crate::expr::Expr;
pub use crate::features::{
  count_features, write_counts, FeatureConfig, FeatureGenerator, LemmaFeatures, MorphoFeatures,
};
pub use crate::heads::{bigrams, find_heads, HeadTuple};
pub use crate::labels::LabelTable;
pub use crate::morpho::{Lexicon, Linearizer, Morphology};
pub use crate::parser::{Candidate, Candidates, ParseFailure, ParseTable, Parser};
pub use crate::rerank::{Accuracy, RerankOptions, Reranker, Scored, SortKey};
pub use crate::scoring::{tree_probability, unigram_tree_probability, ProbTables};
pub use crate::utils::Err;
