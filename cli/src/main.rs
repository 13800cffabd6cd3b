use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use headrank::conllu::Treebank;
use headrank::features::{CategoryMap, OovStyle};
use headrank::rerank::{read_gold_items, read_sentences};
use headrank::{
  count_features, write_counts, Err, FeatureConfig, FeatureGenerator, LabelTable, Lexicon,
  MorphoFeatures, ParseTable, ProbTables, RerankOptions, Reranker, SortKey,
};

/// Rerank grammar parses with head-dependent treebank statistics
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
  /// Print debug messages
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Rerank the parses of every sentence in FILE (one per line, default stdin)
  Rerank {
    file: Option<PathBuf>,
    #[command(flatten)]
    model: ModelArgs,
    /// Print the tree and its (node, head) pairs under each candidate
    #[arg(long)]
    print_trees: bool,
  },
  /// Check whether reranking puts the gold answer on top, for lines of
  /// sentence<TAB>gold in FILE (default stdin)
  Evaluate {
    file: Option<PathBuf>,
    #[command(flatten)]
    model: ModelArgs,
  },
  /// Count ambiguity-set features in CoNLL-U treebanks
  Count {
    #[arg(required = true)]
    treebanks: Vec<PathBuf>,
    /// form<TAB>function<TAB>category lexicon used for lookups
    #[arg(long, value_name = "FILE")]
    lexicon: PathBuf,
    /// Count (node, head) pairs instead of single nodes
    #[arg(long)]
    bigram: bool,
    /// Append the dependency relation to every feature
    #[arg(long)]
    deprel: bool,
    /// Don't substitute OOV_ labels for tokens without readings
    #[arg(long)]
    no_oov: bool,
    #[arg(long, value_enum, default_value_t = OovArg::Upos)]
    oov_style: OovArg,
    /// Drop readings whose category doesn't fit the token's UPOS tag
    #[arg(long)]
    filter_categories: bool,
    /// CATEGORY<TAB>UPOS table replacing the built-in one
    #[arg(long, value_name = "FILE")]
    categories: Option<PathBuf>,
    /// Only count tokens with these UPOS tags
    #[arg(long, value_delimiter = ',')]
    upos: Vec<String>,
    /// Write counts here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
  },
}

#[derive(Args)]
struct ModelArgs {
  /// sentence<TAB>logprob<TAB>expression file of candidate parses
  #[arg(long, value_name = "FILE")]
  parses: PathBuf,
  /// form<TAB>function<TAB>category lexicon
  #[arg(long, value_name = "FILE")]
  lexicon: PathBuf,
  /// Lexicon of the language to linearize into (defaults to --lexicon)
  #[arg(long, value_name = "FILE")]
  translate: Option<PathBuf>,
  /// Argument label table
  #[arg(long, value_name = "FILE")]
  labels: PathBuf,
  /// Bigram probabilities
  #[arg(long, value_name = "FILE")]
  bigram: PathBuf,
  /// Unigram probabilities
  #[arg(long, value_name = "FILE")]
  unigram: PathBuf,
  /// Consider the top N parses of each sentence
  #[arg(long, value_name = "N", default_value_t = 10)]
  nparses: usize,
  /// Score pairs without bigram evidence as neutral instead of by unigram
  #[arg(long)]
  no_unigram_fallback: bool,
  #[arg(long, value_enum, default_value_t = SortArg::Parser)]
  sort: SortArg,
}

#[derive(ValueEnum, Copy, Clone, PartialEq, Eq)]
enum SortArg {
  Parser,
  Rerank,
  Total,
}

impl From<SortArg> for SortKey {
  fn from(arg: SortArg) -> Self {
    match arg {
      SortArg::Parser => SortKey::Parser,
      SortArg::Rerank => SortKey::Rerank,
      SortArg::Total => SortKey::Total,
    }
  }
}

#[derive(ValueEnum, Copy, Clone, PartialEq, Eq)]
enum OovArg {
  Upos,
  Category,
}

impl From<OovArg> for OovStyle {
  fn from(arg: OovArg) -> Self {
    match arg {
      OovArg::Upos => OovStyle::Upos,
      OovArg::Category => OovStyle::Category,
    }
  }
}

/// Everything the reranker needs, loaded before any sentence is read
struct Model {
  parses: ParseTable,
  labels: LabelTable,
  tables: ProbTables,
  linearizer: Lexicon,
  options: RerankOptions,
}

impl Model {
  fn load(args: &ModelArgs) -> Result<Self, Err> {
    let parses = ParseTable::read_from_file(&args.parses)?;
    let labels = LabelTable::read_from_file(&args.labels)?;
    let tables = ProbTables::read_from_files(&args.bigram, &args.unigram)?;
    let linearizer = Lexicon::read_from_file(args.translate.as_ref().unwrap_or(&args.lexicon))?;

    let options = RerankOptions {
      max_parses: args.nparses,
      unigram_fallback: !args.no_unigram_fallback,
      sort: args.sort.into(),
    };

    Ok(Self {
      parses,
      labels,
      tables,
      linearizer,
      options,
    })
  }

  fn reranker(&self) -> Reranker<'_> {
    Reranker::new(&self.parses, &self.labels, &self.tables, self.options.clone())
  }
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

fn open_input(file: Option<&Path>) -> Result<Box<dyn BufRead>, Err> {
  match file {
    Some(path) => {
      let f = File::open(path).map_err(|e| -> Err { format!("{}: {}", path.display(), e).into() })?;
      Ok(Box::new(BufReader::new(f)))
    }
    None => Ok(Box::new(BufReader::new(io::stdin()))),
  }
}

fn count(
  treebanks: &[PathBuf],
  lexicon: &Lexicon,
  config: FeatureConfig,
  out: &mut dyn Write,
) -> Result<(), Err> {
  let generator = MorphoFeatures::new(lexicon, config);
  let generators: [&dyn FeatureGenerator; 1] = [&generator];

  // open everything up front so a bad path fails before any counting
  let banks = treebanks
    .iter()
    .map(|path| Treebank::open(path))
    .collect::<Result<Vec<_>, _>>()?;

  let mut counts = count_features(banks.into_iter().flatten(), &generators)?;
  let counts = counts.remove(0);
  info!(sets = counts.len(), "writing counts");
  write_counts(&counts, out)?;
  Ok(())
}

fn main() -> Result<(), Err> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let stdout = io::stdout();
  let mut out = BufWriter::new(stdout.lock());

  match cli.command {
    Commands::Rerank {
      file,
      model,
      print_trees,
    } => {
      let model = Model::load(&model)?;
      let sentences = read_sentences(open_input(file.as_deref())?)?;
      model
        .reranker()
        .report(&sentences, &model.linearizer, &mut out, print_trees)?;
    }
    Commands::Evaluate { file, model } => {
      let model = Model::load(&model)?;
      let items = read_gold_items(open_input(file.as_deref())?)?;
      let accuracy = model.reranker().evaluate(&items, &model.linearizer, &mut out)?;
      writeln!(out, "accuracy\t{}", accuracy)?;
    }
    Commands::Count {
      treebanks,
      lexicon,
      bigram,
      deprel,
      no_oov,
      oov_style,
      filter_categories,
      categories,
      upos,
      output,
    } => {
      let lexicon = Lexicon::read_from_file(&lexicon)?;
      let categories = match categories {
        Some(path) => CategoryMap::read_from_file(path)?,
        None => CategoryMap::default(),
      };
      let upos_filter = if upos.is_empty() {
        None
      } else {
        Some(upos.into_iter().collect::<HashSet<_>>())
      };

      let config = FeatureConfig {
        bigram,
        deprel,
        oov_fallback: !no_oov,
        oov_style: oov_style.into(),
        filter_categories,
        upos_filter,
        categories,
      };

      match output {
        Some(path) => {
          let file = File::create(&path)
            .map_err(|e| -> Err { format!("{}: {}", path.display(), e).into() })?;
          let mut writer = BufWriter::new(file);
          count(&treebanks, &lexicon, config, &mut writer)?;
          writer.flush()?;
        }
        None => count(&treebanks, &lexicon, config, &mut out)?,
      }
    }
  }

  out.flush()?;
  Ok(())
}
