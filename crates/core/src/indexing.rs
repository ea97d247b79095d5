use crate::builder::GraphBuilder;
use crate::chunking::chunk_markdown;
use crate::error::IndexError;
use crate::extraction::GraphExtractor;
use crate::llm::{Embedder, TextGenerator};
use crate::models::{content_uid, Chunk, ChunkExtraction, Extraction, IndexingOptions, IndexingReport};
use crate::tokens::TokenEstimator;
use crate::traits::GraphStore;
use futures::{stream, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const MARKDOWN_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Recursively lists indexable text documents under `folder`, sorted for a
/// stable processing order.
pub fn discover_markdown_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                MARKDOWN_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Indexing pipeline for one document: chunk the text, extract entities and
/// relationships per chunk with bounded fan-out, then build the graph.
/// Chunk-level failures are logged and skipped; they never abort the batch.
pub struct IndexingPipeline<S, G, E>
where
    S: GraphStore,
    G: TextGenerator,
    E: Embedder,
{
    store: S,
    generator: G,
    embedder: E,
    estimator: Box<dyn TokenEstimator>,
    options: IndexingOptions,
}

impl<S, G, E> IndexingPipeline<S, G, E>
where
    S: GraphStore,
    G: TextGenerator,
    E: Embedder,
{
    pub fn new(
        store: S,
        generator: G,
        embedder: E,
        estimator: Box<dyn TokenEstimator>,
        options: IndexingOptions,
    ) -> Self {
        Self {
            store,
            generator,
            embedder,
            estimator,
            options,
        }
    }

    pub async fn index_document(
        &self,
        document_id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<IndexingReport, IndexError> {
        let chunker = &self.options.chunker;
        if chunker.min_chunk_tokens > chunker.max_chunk_tokens {
            return Err(IndexError::InvalidChunkConfig(format!(
                "min_chunk_tokens {} exceeds max_chunk_tokens {}",
                chunker.min_chunk_tokens, chunker.max_chunk_tokens
            )));
        }

        let mut report = IndexingReport {
            document_id: document_id.to_string(),
            ..Default::default()
        };

        let drafts = chunk_markdown(content, chunker, self.estimator.as_ref());
        if drafts.is_empty() {
            warn!(document_id, "document produced no chunks");
            return Ok(report);
        }
        info!(document_id, chunks = drafts.len(), "chunking complete");

        self.store
            .ensure_schema(self.embedder.dimensions())
            .await
            .map_err(IndexError::Store)?;

        let extractor = GraphExtractor::new(&self.generator, &self.embedder);
        let limit = self.options.max_concurrent_extractions.max(1);

        // Per-chunk extraction fans out up to `limit` concurrent gateway
        // calls; `buffered` keeps document order for the build step.
        let outcomes: Vec<Option<ChunkExtraction>> = stream::iter(drafts.into_iter().enumerate())
            .map(|(index, draft)| {
                let extractor = &extractor;
                let embedder = &self.embedder;
                async move {
                    let uid =
                        content_uid(&[document_id, index.to_string().as_str(), draft.text.as_str()]);

                    let embedding = match embedder.embed(&draft.text).await {
                        Ok(embedding) => embedding,
                        Err(error) => {
                            warn!(document_id, chunk_uid = %uid, %error, "chunk embedding failed, skipping chunk");
                            return None;
                        }
                    };

                    let extraction = match extractor.extract(&draft.text).await {
                        Ok(extraction) => extraction,
                        Err(error) => {
                            warn!(document_id, chunk_uid = %uid, %error, "extraction failed, storing chunk without records");
                            Extraction::default()
                        }
                    };

                    Some(ChunkExtraction {
                        chunk: Chunk {
                            uid,
                            document_id: document_id.to_string(),
                            text: draft.text,
                            header_path: draft.header_path,
                            embedding,
                        },
                        extraction,
                    })
                }
            })
            .buffered(limit)
            .collect()
            .await;

        let mut extractions = Vec::new();
        for outcome in outcomes {
            match outcome {
                Some(item) => {
                    report.unparsed_records += item.extraction.unparsed;
                    extractions.push(item);
                }
                None => report.chunks_failed += 1,
            }
        }

        let summary = GraphBuilder::new(&self.store)
            .build(document_id, file_name, &extractions)
            .await
            .map_err(IndexError::Store)?;

        report.chunks_indexed = summary.chunks;
        report.entities = summary.entities;
        report.relationships = summary.relationships;
        Ok(report)
    }
}
