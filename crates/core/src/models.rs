use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Output of the chunker: a bounded slice of document text together with the
/// header lineage that introduces it (ancestor headers first, own header last).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub text: String,
    pub header_path: Vec<String>,
}

/// A chunk as stored in the graph. Immutable once written; re-indexing the
/// same document produces the same uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub uid: String,
    pub document_id: String,
    pub text: String,
    pub header_path: Vec<String>,
    pub embedding: Vec<f32>,
}

/// One parsed entity record from the extraction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub entity_type: String,
    pub description: String,
}

/// One parsed relationship record from the extraction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source: String,
    pub target: String,
    pub rel_type: String,
    pub description: String,
}

/// A single line of extraction output. Malformed lines become `Unparsed` and
/// are counted instead of failing the chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionRecord {
    Entity(EntityRecord),
    Relationship(RelationshipRecord),
    Unparsed(String),
}

#[derive(Debug, Clone)]
pub struct EmbeddedEntity {
    pub record: EntityRecord,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct EmbeddedRelationship {
    pub record: RelationshipRecord,
    pub embedding: Vec<f32>,
}

/// Everything extracted from one chunk, with description embeddings attached.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entities: Vec<EmbeddedEntity>,
    pub relationships: Vec<EmbeddedRelationship>,
    pub unparsed: usize,
}

/// A chunk paired with its extraction, ready for the graph builder.
#[derive(Debug, Clone)]
pub struct ChunkExtraction {
    pub chunk: Chunk,
    pub extraction: Extraction,
}

/// A candidate surfaced by the vector-index similarity search at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub name: String,
    pub entity_type: String,
    pub description_id: String,
    pub description: String,
    pub chunk_id: String,
    pub score: f64,
}

/// A chunk row returned by the store for similarity scoring.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub uid: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub file_name: Option<String>,
}

/// A description row returned during context expansion; the embedding is
/// absent when the store never attached one.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionRow {
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// One row of the context-expansion traversal, per (entity, chunk) pair.
#[derive(Debug, Clone)]
pub struct ContextRow {
    pub entity_name: String,
    pub chunk_uid: String,
    pub entity_description: Option<DescriptionRow>,
    pub relationship_descriptions: Vec<DescriptionRow>,
    pub file_name: Option<String>,
}

/// Final ranked context handed to downstream generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    pub entity_name: String,
    pub chunk_text: String,
    pub entity_description: Option<String>,
    pub relationship_descriptions: Vec<String>,
    pub source_file: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkerOptions {
    pub max_chunk_tokens: usize,
    pub min_chunk_tokens: usize,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 800,
            min_chunk_tokens: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub chunker: ChunkerOptions,
    /// Upper bound on concurrent extraction calls for one document.
    pub max_concurrent_extractions: usize,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            chunker: ChunkerOptions::default(),
            max_concurrent_extractions: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Final number of context records returned to the caller.
    pub top_k: usize,
    /// Number of chunks retained after similarity filtering.
    pub chunk_top_k: usize,
    /// Candidates fetched from the vector index per seed embedding.
    pub entity_top_k: usize,
    /// Cosine threshold a chunk must strictly exceed to stay in play.
    pub similarity_threshold: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            chunk_top_k: 10,
            entity_top_k: 10,
            similarity_threshold: 0.5,
        }
    }
}

/// Outcome of indexing one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexingReport {
    pub document_id: String,
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
    pub entities: usize,
    pub relationships: usize,
    pub unparsed_records: usize,
}

/// Entity identity key: lowercase with interior whitespace collapsed, so
/// "UBND Phường" and "ubnd  phường" resolve to one node.
pub fn normalize_entity_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Content-addressed uid over the parts that define a node's identity.
/// Stable across re-indexing runs, which makes every store write a MERGE
/// instead of an insert.
pub fn content_uid(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
