//! Ambiguity-set features from gold dependency treebanks.
//!
//! A treebank token usually matches several grammar functions. Rather than
//! guessing, every token yields the set of all its readings (or all
//! reading pairs with its head, in bigram mode), and whole sets are counted.
//! Resolving the sets into per-reading probabilities is left to an
//! estimator downstream.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::conllu::{UDGraph, UDNode};
use crate::heads::ROOT_HEAD;
use crate::morpho::Morphology;
use crate::utils::combinations;
use crate::Err;

/// A single reading: `[function]`, `[function, head]`, optionally followed by
/// the dependency relation
pub type Feature = Vec<String>;

/// Mutually exclusive readings of one treebank position
pub type OccurrenceSet = BTreeSet<Feature>;

/// Occurrences of each ambiguity set
pub type Counts = HashMap<OccurrenceSet, usize>;

pub const OOV_PREFIX: &str = "OOV_";

/// Grammar category to UD part of speech
const GF_TO_UD: &[(&str, &str)] = &[
  ("N", "NOUN"),
  ("N", "PROPN"),
  ("PN", "PROPN"),
  ("A", "ADJ"),
  ("V", "VERB"),
  ("V2", "VERB"),
  ("V3", "VERB"),
  ("VV", "VERB"),
  ("VA", "VERB"),
  ("VV", "AUX"),
  ("VS", "VERB"),
  ("VQ", "VERB"),
  ("V2V", "VERB"),
  ("V2A", "VERB"),
  ("V2S", "VERB"),
  ("V2Q", "VERB"),
  ("VP", "VERB"),
  ("AdA", "ADV"),
  ("AdN", "ADV"),
  ("AdV", "ADV"),
  ("Adv", "ADV"),
  ("CAdv", "ADV"),
  ("IAdv", "ADV"),
];

/// Grammar categories each UD part of speech may be realised as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
  allowed: HashMap<String, Vec<String>>,
}

impl Default for CategoryMap {
  /// The built-in GF category table
  fn default() -> Self {
    let mut map = Self::empty();
    for (cat, upos) in GF_TO_UD {
      map.insert(cat, upos);
    }
    map
  }
}

impl CategoryMap {
  pub fn empty() -> Self {
    Self {
      allowed: HashMap::new(),
    }
  }

  pub fn insert(&mut self, category: &str, upostag: &str) {
    let cats = self.allowed.entry(upostag.to_string()).or_default();
    if !cats.iter().any(|c| c == category) {
      cats.push(category.to_string());
    }
  }

  pub fn categories_for(&self, upostag: &str) -> &[String] {
    self.allowed.get(upostag).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let src = fs::read_to_string(path)
      .map_err(|e| -> Err { format!("category map {}: {}", path.display(), e).into() })?;
    src.parse()
  }
}

impl FromStr for CategoryMap {
  type Err = Err;

  /// Rows of `CATEGORY<TAB>UPOS`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut map = Self::empty();
    for (idx, line) in s.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        [cat, upos] => map.insert(cat, upos),
        _ => {
          return Err(
            format!("line {}: expected CATEGORY<TAB>UPOS, got '{}'", idx + 1, line).into(),
          );
        }
      }
    }
    Ok(map)
  }
}

/// How tokens without any reading are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OovStyle {
  /// `OOV_<UPOS>`
  Upos,
  /// `OOV_<category>` for every category allowed for the token's UPOS
  Category,
}

#[derive(Debug, Clone)]
pub struct FeatureConfig {
  /// Pair every reading with every reading of the head
  pub bigram: bool,
  /// Append the dependency relation to every feature
  pub deprel: bool,
  pub oov_fallback: bool,
  pub oov_style: OovStyle,
  /// Keep only readings whose category fits the token's UPOS
  pub filter_categories: bool,
  /// Only produce features for tokens with these UPOS tags
  pub upos_filter: Option<HashSet<String>>,
  pub categories: CategoryMap,
}

impl Default for FeatureConfig {
  fn default() -> Self {
    Self {
      bigram: false,
      deprel: false,
      oov_fallback: true,
      oov_style: OovStyle::Upos,
      filter_categories: false,
      upos_filter: None,
      categories: CategoryMap::default(),
    }
  }
}

/// Something that turns a graph into one occurrence set per (kept) node
pub trait FeatureGenerator {
  fn features<'a>(&'a self, graph: &'a UDGraph) -> Box<dyn Iterator<Item = OccurrenceSet> + 'a>;
}

/// Features from the morphological readings of each token's form
pub struct MorphoFeatures<'m, M: ?Sized> {
  morpho: &'m M,
  config: FeatureConfig,
}

impl<'m, M: Morphology + ?Sized> MorphoFeatures<'m, M> {
  pub fn new(morpho: &'m M, config: FeatureConfig) -> Self {
    Self { morpho, config }
  }

  pub fn config(&self) -> &FeatureConfig {
    &self.config
  }

  /// Grammar functions the token could be, without duplicates
  pub fn possible_functions(&self, node: &UDNode) -> Vec<String> {
    let allowed = self.config.categories.categories_for(&node.upostag);

    let mut functions: Vec<String> = Vec::new();
    for analysis in self.morpho.lookup_morpho(&node.form.to_lowercase()) {
      if self.config.filter_categories {
        let fits = self
          .morpho
          .function_category(&analysis.function)
          .is_some_and(|cat| allowed.contains(&cat));
        if !fits {
          continue;
        }
      }
      if !functions.contains(&analysis.function) {
        functions.push(analysis.function);
      }
    }

    if functions.is_empty() && self.config.oov_fallback {
      debug!("no readings for '{}' ({})", node.form, node.upostag);
      match self.config.oov_style {
        OovStyle::Category if !allowed.is_empty() => {
          functions.extend(allowed.iter().map(|cat| format!("{}{}", OOV_PREFIX, cat)));
        }
        _ => functions.push(format!("{}{}", OOV_PREFIX, node.upostag)),
      }
    }

    functions
  }

  fn keeps(&self, node: &UDNode) -> bool {
    match &self.config.upos_filter {
      Some(tags) => tags.contains(&node.upostag),
      None => true,
    }
  }

  /// One occurrence set per kept node, in graph order
  pub fn generate_features<'a>(
    &'a self,
    graph: &'a UDGraph,
  ) -> impl Iterator<Item = OccurrenceSet> + 'a {
    graph
      .nodes()
      .iter()
      .filter(move |node| self.keeps(node))
      .map(move |node| {
        let node_functions = self.possible_functions(node);

        let mut features: Vec<Feature> = if self.config.bigram {
          let head_functions = match graph.head_of(node) {
            Some(head) => self.possible_functions(head),
            None => vec![ROOT_HEAD.to_string()],
          };
          combinations(&[node_functions, head_functions])
        } else {
          node_functions.into_iter().map(|f| vec![f]).collect()
        };

        if self.config.deprel {
          for feature in features.iter_mut() {
            feature.push(node.deprel.clone());
          }
        }

        features.into_iter().collect()
      })
  }
}

impl<M: Morphology + ?Sized> FeatureGenerator for MorphoFeatures<'_, M> {
  fn features<'a>(&'a self, graph: &'a UDGraph) -> Box<dyn Iterator<Item = OccurrenceSet> + 'a> {
    Box::new(self.generate_features(graph))
  }
}

/// Unambiguous lemma features, `[lemma]` or `[lemma, head lemma]`
#[derive(Debug, Clone, Copy, Default)]
pub struct LemmaFeatures {
  pub bigram: bool,
}

impl FeatureGenerator for LemmaFeatures {
  fn features<'a>(&'a self, graph: &'a UDGraph) -> Box<dyn Iterator<Item = OccurrenceSet> + 'a> {
    let bigram = self.bigram;
    Box::new(graph.nodes().iter().map(move |node| {
      let mut feature = vec![node.lemma.clone()];
      if bigram {
        let head = graph
          .head_of(node)
          .map(|h| h.lemma.clone())
          .unwrap_or_else(|| ROOT_HEAD.to_string());
        feature.push(head);
      }
      BTreeSet::from([feature])
    }))
  }
}

/// Counts the occurrence sets of every generator over all graphs, reading
/// each graph once. Returns one table per generator, in order.
pub fn count_features<I>(
  graphs: I,
  generators: &[&dyn FeatureGenerator],
) -> Result<Vec<Counts>, Err>
where
  I: IntoIterator<Item = Result<UDGraph, Err>>,
{
  let mut counters: Vec<Counts> = generators.iter().map(|_| Counts::new()).collect();
  let mut sentences = 0;

  for graph in graphs {
    let graph = graph?;
    sentences += 1;
    for (counter, generator) in counters.iter_mut().zip(generators) {
      for set in generator.features(&graph) {
        *counter.entry(set).or_insert(0) += 1;
      }
    }
  }

  info!(sentences, "counted treebank features");
  Ok(counters)
}

/// Writes `count<TAB>feature<TAB>feature...` lines, most frequent first.
/// Parts of a feature are separated by spaces.
pub fn write_counts<W: Write + ?Sized>(counts: &Counts, buf: &mut W) -> io::Result<()> {
  let mut rows = counts.iter().collect::<Vec<_>>();
  rows.sort_by(|(a_set, a_count), (b_set, b_count)| {
    b_count.cmp(a_count).then_with(|| a_set.cmp(b_set))
  });

  for (set, count) in rows {
    write!(buf, "{}", count)?;
    for feature in set {
      write!(buf, "\t{}", feature.join(" "))?;
    }
    writeln!(buf)?;
  }

  Ok(())
}
