use chrono::Utc;
use clap::{Parser, Subcommand};
use graphrag_core::{
    discover_markdown_files, Cl100kEstimator, ChunkerOptions, IndexingOptions, IndexingPipeline,
    LiteLlmClient, LocalSearch, Neo4jStore, SearchOptions,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "graphrag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Neo4j HTTP endpoint
    #[arg(long, default_value = "http://localhost:7474")]
    neo4j_url: String,

    /// Neo4j database name
    #[arg(long, default_value = "neo4j")]
    neo4j_db: String,

    /// Neo4j username
    #[arg(long, default_value = "neo4j")]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, default_value = "password", env = "NEO4J_PASSWORD")]
    neo4j_password: String,

    /// OpenAI-compatible gateway base URL (LiteLLM proxy or similar)
    #[arg(long, default_value = "http://localhost:4000")]
    llm_url: String,

    /// Gateway API key
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Completion model used for extraction
    #[arg(long, default_value = "gemini-2.5-flash")]
    model: String,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Embedding dimensions
    #[arg(long, default_value = "1536")]
    dimensions: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk documents, extract their knowledge graph and index it.
    Index {
        /// A markdown file, or a folder to scan recursively.
        #[arg(long)]
        path: String,
        /// Document id; defaults to the file name. Ignored for folders.
        #[arg(long)]
        document_id: Option<String>,
        /// Maximum tokens per chunk.
        #[arg(long, default_value = "800")]
        max_chunk_tokens: usize,
        /// Minimum tokens for a trailing chunk before it merges backward.
        #[arg(long, default_value = "120")]
        min_chunk_tokens: usize,
    },
    /// Run local search and print the ranked context records.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of context records to return.
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Cosine threshold a chunk must exceed to be considered.
        #[arg(long, default_value = "0.5")]
        threshold: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = Neo4jStore::new(
        &cli.neo4j_url,
        &cli.neo4j_db,
        &cli.neo4j_user,
        &cli.neo4j_password,
    );
    let llm = LiteLlmClient::new(
        &cli.llm_url,
        cli.llm_api_key.clone(),
        &cli.model,
        &cli.embedding_model,
        cli.dimensions,
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "graphrag boot"
    );

    match cli.command {
        Command::Index {
            path,
            document_id,
            max_chunk_tokens,
            min_chunk_tokens,
        } => {
            let llm_embedder = LiteLlmClient::new(
                &cli.llm_url,
                cli.llm_api_key.clone(),
                &cli.model,
                &cli.embedding_model,
                cli.dimensions,
            )?;
            let pipeline = IndexingPipeline::new(
                store,
                llm,
                llm_embedder,
                Box::new(Cl100kEstimator::new()?),
                IndexingOptions {
                    chunker: ChunkerOptions {
                        max_chunk_tokens,
                        min_chunk_tokens,
                    },
                    ..Default::default()
                },
            );

            let target = Path::new(&path);
            let single_file = target.is_file();
            let files = if target.is_dir() {
                let discovered = discover_markdown_files(target);
                if discovered.is_empty() {
                    anyhow::bail!("no markdown files found in {path}");
                }
                discovered
            } else {
                vec![target.to_path_buf()]
            };

            for file in files {
                let file_name = file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("unknown")
                    .to_string();
                let id = match (&document_id, single_file) {
                    (Some(id), true) => id.clone(),
                    _ => file_name.clone(),
                };

                let content = tokio::fs::read_to_string(&file).await?;
                match pipeline.index_document(&id, &file_name, &content).await {
                    Ok(report) => {
                        info!(
                            document_id = %report.document_id,
                            chunks = report.chunks_indexed,
                            failed = report.chunks_failed,
                            entities = report.entities,
                            relationships = report.relationships,
                            unparsed = report.unparsed_records,
                            "document indexed"
                        );
                        println!(
                            "{}: {} chunks ({} failed), {} entities, {} relationships",
                            report.document_id,
                            report.chunks_indexed,
                            report.chunks_failed,
                            report.entities,
                            report.relationships
                        );
                    }
                    Err(error) => {
                        warn!(file = %file.display(), %error, "indexing failed, continuing");
                    }
                }
            }
        }
        Command::Search {
            query,
            top_k,
            threshold,
        } => {
            let llm_embedder = LiteLlmClient::new(
                &cli.llm_url,
                cli.llm_api_key.clone(),
                &cli.model,
                &cli.embedding_model,
                cli.dimensions,
            )?;
            let search = LocalSearch::new(
                store,
                llm,
                llm_embedder,
                SearchOptions {
                    top_k,
                    similarity_threshold: threshold,
                    ..Default::default()
                },
            );

            let records = search.search(&query).await;
            if records.is_empty() {
                println!("no relevant information found");
                return Ok(());
            }

            for (rank, record) in records.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    rank + 1,
                    record.score,
                    record.entity_name,
                    record.source_file.as_deref().unwrap_or("unknown source")
                );
                if let Some(description) = &record.entity_description {
                    println!("   entity: {description}");
                }
                for description in &record.relationship_descriptions {
                    println!("   related: {description}");
                }
                println!("   chunk: {}", record.chunk_text.replace('\n', " "));
            }
        }
    }

    Ok(())
}
