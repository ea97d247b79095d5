pub mod builder;
pub mod chunking;
pub mod error;
pub mod extraction;
pub mod indexing;
pub mod llm;
pub mod local_search;
pub mod mapper;
pub mod models;
pub mod prompts;
pub mod query;
pub mod stores;
pub mod tokens;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{BuildSummary, GraphBuilder};
pub use chunking::{chunk_markdown, parent_headers, parse_headers, Header};
pub use error::{IndexError, LlmError, SearchError, StoreError};
pub use extraction::{parse_records, GraphExtractor};
pub use indexing::{discover_markdown_files, IndexingPipeline};
pub use llm::{ChatMessage, Embedder, LiteLlmClient, Role, TextGenerator};
pub use local_search::LocalSearch;
pub use mapper::{context_score, cosine_similarity, EntityMapper};
pub use models::{
    normalize_entity_name, CandidateEntity, Chunk, ChunkDraft, ChunkerOptions, ContextRecord,
    EntityRecord, Extraction, ExtractionRecord, IndexingOptions, IndexingReport,
    RelationshipRecord, SearchOptions,
};
pub use query::QueryEntityExtractor;
pub use stores::Neo4jStore;
pub use tokens::{Cl100kEstimator, TokenEstimator, WordEstimator};
pub use traits::{EntityDescriptionUpsert, GraphStore, RelationshipUpsert};
