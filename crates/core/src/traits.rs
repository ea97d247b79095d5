use crate::error::StoreError;
use crate::models::{CandidateEntity, Chunk, ChunkRow, ContextRow};
use async_trait::async_trait;

/// Row handed to the store for one entity description occurrence.
#[derive(Debug, Clone)]
pub struct EntityDescriptionUpsert {
    /// Normalized identity key (`normalize_entity_name`).
    pub entity_key: String,
    pub display_name: String,
    pub entity_type: String,
    pub description_uid: String,
    pub description: String,
    pub embedding: Vec<f32>,
    pub chunk_uid: String,
}

/// Row handed to the store for one relationship occurrence.
#[derive(Debug, Clone)]
pub struct RelationshipUpsert {
    pub source_key: String,
    pub source_display: String,
    pub target_key: String,
    pub target_display: String,
    pub rel_type: String,
    pub relationship_uid: String,
    pub description_uid: String,
    pub description: String,
    pub embedding: Vec<f32>,
    pub chunk_uid: String,
}

/// The graph-store capability: transactional upserts, a vector-indexed
/// similarity query over description embeddings, and the traversals the
/// entity mapper needs. Writes are idempotent per key; reads may run
/// concurrently.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates uniqueness constraints and the description vector index.
    async fn ensure_schema(&self, dimensions: usize) -> Result<(), StoreError>;

    /// Upserts the Document node and its Chunk nodes with CONTAINED edges.
    async fn upsert_document_chunks(
        &self,
        document_id: &str,
        file_name: &str,
        chunks: &[Chunk],
    ) -> Result<(), StoreError>;

    /// Upserts Entity nodes by normalized name and attaches Description
    /// nodes linked to both the entity and the originating chunk.
    async fn upsert_entity_descriptions(
        &self,
        rows: &[EntityDescriptionUpsert],
    ) -> Result<(), StoreError>;

    /// Upserts reified Relationship nodes between entities, anchored to an
    /// embedded relationship description referencing the chunk of origin.
    async fn upsert_relationships(&self, rows: &[RelationshipUpsert]) -> Result<(), StoreError>;

    /// Nearest entity descriptions by embedding, joined to their owning
    /// entity, ordered by similarity score descending.
    async fn similar_entity_descriptions(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<CandidateEntity>, StoreError>;

    /// Chunk rows (text + stored embedding + source file) for the given ids.
    async fn candidate_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRow>, StoreError>;

    /// Context-expansion traversal: for entities mentioned in the candidate
    /// chunks, their relationship descriptions anchored to those chunks and
    /// their own descriptions when matched by the candidate description ids.
    async fn entity_context(
        &self,
        entity_keys: &[String],
        chunk_ids: &[String],
        description_ids: &[String],
    ) -> Result<Vec<ContextRow>, StoreError>;
}
