//! Reading gold dependency graphs from CoNLL-U treebanks.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::str::FromStr;

use ::conllu::graph::{Node, Sentence};
use ::conllu::io::{ReadSentence, Reader};
use tracing::debug;

use crate::Err;

/// One token of a dependency graph. Ids and heads are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UDNode {
  pub id: usize,
  pub form: String,
  pub lemma: String,
  pub upostag: String,
  pub xpostag: String,
  pub feats: Vec<String>,
  /// Index of the governing node, `None` for the root
  pub head: Option<usize>,
  pub deprel: String,
}

impl UDNode {
  pub fn is_root(&self) -> bool {
    self.head.is_none()
  }
}

/// A sentence of `UDNode`s. Every head points into the graph and heads never
/// form a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UDGraph {
  nodes: Vec<UDNode>,
}

impl UDGraph {
  /// Checks head indices and acyclicity
  pub fn new(nodes: Vec<UDNode>) -> Result<Self, Err> {
    for (idx, node) in nodes.iter().enumerate() {
      if node.id != idx {
        return Err(format!("node {} has id {}", idx + 1, node.id + 1).into());
      }
      if let Some(head) = node.head {
        if head >= nodes.len() {
          return Err(
            format!("node {} has head {} outside the sentence", idx + 1, head + 1).into(),
          );
        }
      }
    }

    for start in 0..nodes.len() {
      let mut current = start;
      let mut steps = 0;
      while let Some(head) = nodes[current].head {
        steps += 1;
        if steps > nodes.len() {
          return Err(format!("head cycle through node {}", start + 1).into());
        }
        current = head;
      }
    }

    Ok(Self { nodes })
  }

  pub fn nodes(&self) -> &[UDNode] {
    &self.nodes
  }

  pub fn get(&self, id: usize) -> Option<&UDNode> {
    self.nodes.get(id)
  }

  pub fn head_of(&self, node: &UDNode) -> Option<&UDNode> {
    node.head.and_then(|h| self.get(h))
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Converts a sentence read by the `conllu` reader. Token `i` of the
  /// sentence becomes node `i - 1`; every token must have a head.
  pub fn from_sentence(sentence: &Sentence) -> Result<Self, Err> {
    let graph = sentence.dep_graph();
    let mut nodes = Vec::with_capacity(sentence.len());

    for idx in 1..sentence.len() {
      let token = match &sentence[idx] {
        Node::Token(token) => token,
        Node::Root => continue,
      };
      let triple = graph
        .head(idx)
        .ok_or_else(|| -> Err {
          format!("token {} ('{}') has no head", idx, token.form()).into()
        })?;
      let head = match triple.head() {
        0 => None,
        h => Some(h - 1),
      };

      nodes.push(UDNode {
        id: idx - 1,
        form: token.form().to_string(),
        lemma: token.lemma().unwrap_or("_").to_string(),
        upostag: token.upos().unwrap_or("_").to_string(),
        xpostag: token.xpos().unwrap_or("_").to_string(),
        feats: token
          .features()
          .iter()
          .map(|(k, v)| format!("{}={}", k, v))
          .collect(),
        head,
        deprel: triple.relation().unwrap_or("_").to_string(),
      });
    }

    Self::new(nodes)
  }

  /// Reads one sentence block. The block's comments and multiword or
  /// empty-node lines are left to the `conllu` reader.
  fn from_block(block: &str) -> Result<Self, Err> {
    let mut reader = Reader::new(block.as_bytes());
    let sentence = reader
      .read_sentence()
      .map_err(|e| -> Err { e.to_string().into() })?
      .ok_or_else(|| -> Err { "empty sentence".into() })?;
    Self::from_sentence(&sentence)
  }
}

impl FromStr for UDGraph {
  type Err = Err;

  /// Parses a single sentence
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_block(s)
  }
}

impl fmt::Display for UDGraph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for node in self.nodes.iter() {
      let feats = if node.feats.is_empty() {
        "_".to_string()
      } else {
        node.feats.join("|")
      };
      let head = node.head.map(|h| h + 1).unwrap_or(0);
      writeln!(
        f,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t_\t_",
        node.id + 1,
        node.form,
        node.lemma,
        node.upostag,
        node.xpostag,
        feats,
        head,
        node.deprel
      )?;
    }
    Ok(())
  }
}

/// Iterator over the sentences of a treebank. Blank lines split the input
/// into sentence blocks, each read with the `conllu` reader, so errors can
/// name the line a sentence starts on.
pub struct Treebank<R> {
  lines: Lines<R>,
  line_no: usize,
}

impl<R: BufRead> Treebank<R> {
  pub fn new(reader: R) -> Self {
    Self {
      lines: reader.lines(),
      line_no: 0,
    }
  }

  fn finish(block: &str, first_line: usize) -> Result<UDGraph, Err> {
    debug!("reading sentence at line {}", first_line);
    UDGraph::from_block(block)
      .map_err(|e| -> Err { format!("sentence at line {}: {}", first_line, e).into() })
  }
}

impl Treebank<BufReader<File>> {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, Err> {
    let path = path.as_ref();
    let file = File::open(path)
      .map_err(|e| -> Err { format!("treebank {}: {}", path.display(), e).into() })?;
    Ok(Self::new(BufReader::new(file)))
  }
}

impl<R: BufRead> Iterator for Treebank<R> {
  type Item = Result<UDGraph, Err>;

  fn next(&mut self) -> Option<Self::Item> {
    let mut block = String::new();
    let mut first_line = self.line_no + 1;

    loop {
      match self.lines.next() {
        None => {
          return if block.is_empty() {
            None
          } else {
            Some(Self::finish(&block, first_line))
          };
        }
        Some(Err(e)) => return Some(Err(e.into())),
        Some(Ok(line)) => {
          self.line_no += 1;
          if line.trim().is_empty() {
            if !block.is_empty() {
              return Some(Self::finish(&block, first_line));
            }
          } else if !line.starts_with('#') {
            if block.is_empty() {
              first_line = self.line_no;
            }
            block.push_str(&line);
            block.push('\n');
          }
        }
      }
    }
  }
}
