use criterion::{black_box, criterion_group, criterion_main, Criterion};

use headrank::{bigrams, find_heads, tree_probability, Expr, LabelTable, ProbTables};

const LABELS: &str = r#"
  UseCl   tense pol head
  PredVP  subj head
  ComplV2 head obj
  DetCN   det head
  AdjCN   mod head
  AdvVP   head mod
  PrepNP  head obj
"#;

const TREE: &str = "UseCl (TTAnt TPres ASimul) PPos \
  (PredVP (DetCN (DetQuant DefArt NumSg) (AdjCN (PositA old_A) (UseN man_N))) \
  (AdvVP (ComplV2 see_V2 (DetCN (DetQuant IndefArt NumSg) (UseN dog_N))) \
  (PrepNP in_Prep (DetCN (DetQuant DefArt NumSg) (UseN park_N)))))";

fn tables() -> ProbTables {
  let mut tables = ProbTables::new();
  tables.insert_bigram("man_N", "see_V2", 0.02);
  tables.insert_bigram("dog_N", "see_V2", 0.01);
  tables.insert_bigram("old_A", "man_N", 0.05);
  tables.insert_bigram("park_N", "in_Prep", 0.03);
  for (node, p) in [("see_V2", 0.01), ("man_N", 0.02), ("dog_N", 0.01), ("in_Prep", 0.1)] {
    tables.insert_unigram(node, p);
  }
  tables
}

fn criterion_benchmark(c: &mut Criterion) {
  let labels = LABELS.parse::<LabelTable>().unwrap();
  let tree = TREE.parse::<Expr>().unwrap();
  let tables = tables();

  c.bench_function("find heads", |b| {
    b.iter(|| find_heads(black_box(&tree), black_box(&labels)).unwrap())
  });

  let (tuples, _) = find_heads(&tree, &labels).unwrap();
  let pairs = bigrams(&tuples);
  c.bench_function("tree probability", |b| {
    b.iter(|| tree_probability(black_box(&pairs), black_box(&tables), true))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
