//! Command-line launcher for mkr collections.
//!
//! An index root holds up to three databases: `sparse/` (BM25), `dense/`
//! (hash embeddings), and `corpus/` (content used by the reranker).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mkr_eval::{Benchmark, BenchmarkConfig, load_qrels_jsonl};
use mkr_retrieval::{
    Bm25Variant, Database, DenseRetriever, DocumentRetriever, EmbeddingProvider,
    HashEmbeddingProvider, HybridRetriever, KeywordOverlapScorer, LexicalConfig, Metric, Reranker,
    Retriever, SimpleTokenizer, SparseRetriever, VectorConfig, read_corpus,
};
use tracing::info;

const SPARSE_DIR: &str = "sparse";
const DENSE_DIR: &str = "dense";
const CORPUS_DIR: &str = "corpus";

/// Index, search, and evaluate document collections.
#[derive(Debug, Parser)]
#[command(name = "mkr", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest a JSONL corpus into one or more backends.
    Index(IndexArgs),
    /// Run a query and print results as JSON lines.
    Search(SearchArgs),
    /// Score a retrieval strategy against a qrels file.
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Sparse,
    Dense,
    Corpus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    Sparse,
    Dense,
    Hybrid,
    TwoStage,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct IndexLocation {
    /// Index root directory.
    #[arg(long, default_value = "index")]
    pub root: PathBuf,
    /// Collection name.
    #[arg(long, default_value = "corpus")]
    pub corpus: String,
    /// Hash embedding dimensions for the dense backend.
    #[arg(long, default_value_t = 256)]
    pub dimensions: usize,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    #[command(flatten)]
    pub location: IndexLocation,
    /// JSONL corpus of `{"hash"?, "content", "metadata"?}` records.
    #[arg(long)]
    pub input: PathBuf,
    /// Backends to populate.
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values = ["sparse", "dense", "corpus"]
    )]
    pub backends: Vec<Backend>,
    /// BM25 variant: okapi, l, or plus.
    #[arg(long, default_value = "okapi")]
    pub variant: Bm25Variant,
    /// Encoder batch size.
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

/// Strategy options shared by search and evaluate.
#[derive(Debug, Args)]
pub struct StrategyArgs {
    #[arg(long, value_enum, default_value = "sparse")]
    pub strategy: Strategy,
    /// Sparse weight for the hybrid strategy.
    #[arg(long, default_value_t = 0.5)]
    pub sparse_weight: f32,
    /// Candidates fetched by the first stage of the two-stage strategy.
    #[arg(long, default_value_t = 100)]
    pub rerank_depth: usize,
    /// Aggregate passages into documents.
    #[arg(long)]
    pub documents: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub location: IndexLocation,
    #[command(flatten)]
    pub strategy: StrategyArgs,
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,
    pub query: String,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub location: IndexLocation,
    #[command(flatten)]
    pub strategy: StrategyArgs,
    /// JSONL qrels of `{"question", "document_ids"}`.
    #[arg(long)]
    pub qrels: PathBuf,
    /// Retrieval depth per question.
    #[arg(long, default_value_t = mkr_eval::DEFAULT_DEPTH)]
    pub depth: usize,
}

/// Run a parsed command, writing results to `out`.
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    match cli.command {
        Command::Index(args) => index(&args, out),
        Command::Search(args) => search(&args, out),
        Command::Evaluate(args) => evaluate(&args, out),
    }
}

fn index(args: &IndexArgs, out: &mut impl Write) -> Result<()> {
    let records = read_corpus(&args.input)
        .with_context(|| format!("failed to read corpus {}", args.input.display()))?;
    let location = &args.location;
    for backend in &args.backends {
        let added = match backend {
            Backend::Sparse => {
                let config = LexicalConfig::builder().variant(args.variant).build()?;
                let db = open_sparse_with(&location.root, config)?;
                let mut retriever = SparseRetriever::new(db)?;
                let added = retriever.add_corpus(&location.corpus, &records)?;
                retriever.save()?;
                added
            }
            Backend::Dense => {
                let mut retriever = open_dense(location)?;
                let added = retriever.add_corpus(&location.corpus, &records, args.batch_size)?;
                retriever.save()?;
                added
            }
            Backend::Corpus => {
                let mut reranker = open_reranker(&location.root)?;
                let added = reranker.add_corpus(&location.corpus, &records)?;
                reranker.save()?;
                added
            }
        };
        info!(backend = ?backend, corpus = %location.corpus, added, "indexed");
        writeln!(
            out,
            "{}",
            serde_json::json!({ "backend": format!("{backend:?}").to_lowercase(), "added": added })
        )?;
    }
    Ok(())
}

fn search(args: &SearchArgs, out: &mut impl Write) -> Result<()> {
    let mut retriever = build_retriever(&args.location, &args.strategy, args.top_k)?;
    let corpus = &args.location.corpus;
    if args.strategy.documents {
        let mut retriever = DocumentRetriever::new(retriever);
        for document in retriever.retrieve(corpus, &args.query, args.top_k)? {
            writeln!(out, "{}", serde_json::to_string(&document)?)?;
        }
    } else {
        for result in retriever.retrieve(corpus, &args.query, args.top_k, None)? {
            writeln!(out, "{}", serde_json::to_string(&result)?)?;
        }
    }
    Ok(())
}

fn evaluate(args: &EvaluateArgs, out: &mut impl Write) -> Result<()> {
    let qrels = load_qrels_jsonl(&args.qrels)
        .with_context(|| format!("failed to read qrels {}", args.qrels.display()))?;
    let config = BenchmarkConfig::builder().depth(args.depth).build()?;
    let benchmark = Benchmark::new(config);
    let mut retriever = build_retriever(&args.location, &args.strategy, args.depth)?;
    let corpus = &args.location.corpus;
    let report = if args.strategy.documents {
        benchmark.evaluate_documents(&mut DocumentRetriever::new(retriever), corpus, &qrels)?
    } else {
        benchmark.evaluate(&mut retriever, corpus, &qrels)?
    };
    writeln!(
        out,
        "{}",
        serde_json::json!({
            "evaluated": report.evaluated,
            "skipped": report.skipped,
            "depth": report.depth,
            "mrr": report.mrr,
            "recall": report.recall,
        })
    )?;
    Ok(())
}

fn build_retriever(
    location: &IndexLocation,
    args: &StrategyArgs,
    top_k: usize,
) -> Result<Retriever> {
    let retriever = match args.strategy {
        Strategy::Sparse => Retriever::from(SparseRetriever::new(open_sparse(&location.root)?)?),
        Strategy::Dense => Retriever::from(open_dense(location)?),
        Strategy::Hybrid => Retriever::from(HybridRetriever::new(
            Retriever::from(open_dense(location)?),
            Retriever::from(SparseRetriever::new(open_sparse(&location.root)?)?),
            args.sparse_weight,
        )?),
        Strategy::TwoStage => {
            if args.rerank_depth == 0 {
                bail!("--rerank-depth must be greater than 0");
            }
            let first = Retriever::from(SparseRetriever::new(open_sparse(&location.root)?)?);
            let reranker = open_reranker(&location.root)?;
            Retriever::two_stage(first, reranker, [args.rerank_depth.max(top_k), top_k])?
        }
    };
    Ok(retriever)
}

fn open_sparse(root: &Path) -> Result<Database> {
    open_sparse_with(root, LexicalConfig::default())
}

fn open_sparse_with(root: &Path, config: LexicalConfig) -> Result<Database> {
    Ok(Database::lexical(root.join(SPARSE_DIR), config, Arc::new(SimpleTokenizer))?)
}

fn open_dense(location: &IndexLocation) -> Result<DenseRetriever> {
    let encoder = HashEmbeddingProvider::new(location.dimensions);
    let config =
        VectorConfig::new(encoder.name(), encoder.dimensions(), Metric::InnerProduct)?;
    let db = Database::vector(location.root.join(DENSE_DIR), config)?;
    Ok(DenseRetriever::new(db, Arc::new(encoder))?)
}

fn open_reranker(root: &Path) -> Result<Reranker> {
    let db = Database::corpus(root.join(CORPUS_DIR))?;
    Ok(Reranker::new(db, Arc::new(KeywordOverlapScorer::default())))
}
