//! Command-line front end for the RAG pipeline
//!
//! ```bash
//! # Answer a question over a folder of papers
//! rag-pipeline run --file ~/papers --method sentence --sentences-per-chunk 4 \
//!     --model-name gpt-4o-mini --query "What is the attention mechanism?"
//!
//! # Inspect how a file is chunked
//! rag-pipeline chunk --file notes.txt --method paragraph
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use rag_pipeline::config::{PipelineConfig, ServiceConfig};
use rag_pipeline::embeddings::load_embedder;
use rag_pipeline::ingestion::{ChunkingStrategy, DocumentLoader, TextChunker};
use rag_pipeline::{FileType, PipelineOrchestrator, Providers, RunResult};

#[derive(Parser)]
#[command(name = "rag-pipeline")]
#[command(about = "Chunk, retrieve, rerank and answer questions over local documents")]
#[command(version)]
struct Cli {
    /// Path to a TOML service config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the answer
    Run {
        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Generation model (gpt-*, o1*, o3*, o4*, ollama/<model>)
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model_name: String,

        /// Question to answer
        #[arg(short, long)]
        query: Option<String>,

        /// Questions per chunk
        #[arg(long, default_value_t = 2)]
        n_questions_per_chunk: usize,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the chunks a strategy produces
    Chunk {
        #[command(flatten)]
        chunking: ChunkingArgs,
    },
}

#[derive(Args)]
struct ChunkingArgs {
    /// File or directory to load (repeatable)
    #[arg(short, long = "file", required = true)]
    files: Vec<PathBuf>,

    /// character, word, sentence, paragraph, delimiter, token or semantic
    #[arg(long, default_value = "character")]
    method: String,

    #[arg(long, default_value_t = 500)]
    chunk_size: usize,

    #[arg(long, default_value_t = 100)]
    words_per_chunk: usize,

    #[arg(long, default_value_t = 3)]
    sentences_per_chunk: usize,

    #[arg(long, default_value = "\n")]
    delimiter: String,

    #[arg(long, default_value_t = 512)]
    tokens_per_chunk: usize,

    #[arg(long, default_value_t = 10)]
    semantic_clusters: usize,
}

impl ChunkingArgs {
    fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            file_paths: collect_files(&self.files),
            method: self.method.clone(),
            chunk_size: self.chunk_size,
            words_per_chunk: self.words_per_chunk,
            sentences_per_chunk: self.sentences_per_chunk,
            delimiter: self.delimiter.clone(),
            tokens_per_chunk: self.tokens_per_chunk,
            semantic_clusters: self.semantic_clusters,
            ..Default::default()
        }
    }
}

/// Expand directories into the supported files they contain, sorted by path
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()))
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| FileType::from_path(p).is_supported())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "rag_pipeline=debug" } else { "rag_pipeline=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .init();

    let config = ServiceConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Run {
            chunking,
            model_name,
            query,
            n_questions_per_chunk,
            json,
        } => {
            let run = PipelineConfig {
                model_name,
                query,
                n_questions_per_chunk,
                ..chunking.to_config()
            };
            run.validate()?;

            let pb = spinner("Loading models...");
            let providers = Providers::load(&config).await?;
            let orchestrator = PipelineOrchestrator::new(config, providers)?;

            pb.set_message(format!("Running pipeline over {} files...", run.file_paths.len()));
            let result = orchestrator.run(&run).await;
            pb.finish_and_clear();

            let result = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Chunk { chunking } => {
            let run = chunking.to_config();
            let strategy = ChunkingStrategy::from_config(&run)?;

            let mut chunker = TextChunker::new(strategy);
            if matches!(chunker.strategy(), ChunkingStrategy::Semantic { .. }) {
                let pb = spinner("Loading sentence embedder...");
                let embedder = load_embedder(&config, &config.embeddings.semantic_model).await?;
                pb.finish_and_clear();
                chunker = chunker.with_embedder(embedder);
            }

            let corpus = DocumentLoader::flatten(&DocumentLoader::new(run.file_paths.clone()).load());
            let chunks = chunker.chunk(&corpus).await?;

            for (i, chunk) in chunks.iter().enumerate() {
                println!("{} {}", style(format!("[{}]", i)).cyan().bold(), chunk);
            }
            println!(
                "\n{} {} chunks from {} files",
                style("✓").green().bold(),
                chunks.len(),
                run.file_paths.len()
            );
        }
    }

    Ok(())
}

fn print_result(result: &RunResult) {
    println!("{}", style("Answer").bold().underlined());
    println!("{}\n", result.model_response);

    println!("{}", style("Contexts").bold().underlined());
    for context in &result.contexts {
        println!(
            "{} {}",
            style(format!("#{} ({:.3})", context.id, context.score)).cyan(),
            preview(&context.text, 160)
        );
    }

    println!(
        "\n{} run {} | {} chunks | tokens {} prompt + {} completion = {} | {:.2}s",
        style("✓").green().bold(),
        style(&result.run_id).dim(),
        result.chunk_count,
        result.prompt_tokens,
        result.completion_tokens,
        result.total_tokens,
        result.total_time
    );
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}
