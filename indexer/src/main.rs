use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use wikisearch_indexer::pipeline;

#[derive(Parser)]
#[command(name = "wikisearch-indexer")]
#[command(about = "Build the sharded TF-IDF inverted index from a crawled corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus CSV (doc_id,title,url,body)
    Build {
        /// Corpus CSV produced by the crawler
        #[arg(long)]
        input: PathBuf,
        /// Stopwords file, one term per line
        #[arg(long)]
        stopwords: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            stopwords,
            output,
        } => pipeline::build_index(&input, &stopwords, &output),
    }
}
