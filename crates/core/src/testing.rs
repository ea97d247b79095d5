//! In-memory fakes shared by the pipeline and orchestrator tests.

use crate::error::{LlmError, StoreError};
use crate::llm::{ChatMessage, Embedder, TextGenerator};
use crate::models::{CandidateEntity, Chunk, ChunkRow, ContextRow};
use crate::traits::{EntityDescriptionUpsert, GraphStore, RelationshipUpsert};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct Writes {
    pub chunks: Vec<Chunk>,
    pub entity_rows: Vec<EntityDescriptionUpsert>,
    pub relationship_rows: Vec<RelationshipUpsert>,
}

/// Graph store fake: records writes, serves canned read results.
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub writes: Mutex<Writes>,
    pub candidates: Vec<CandidateEntity>,
    pub chunk_rows: Vec<ChunkRow>,
    pub context_rows: Vec<ContextRow>,
}

#[async_trait]
impl GraphStore for RecordingStore {
    async fn ensure_schema(&self, _dimensions: usize) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_document_chunks(
        &self,
        _document_id: &str,
        _file_name: &str,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        self.writes
            .lock()
            .expect("writes lock")
            .chunks
            .extend_from_slice(chunks);
        Ok(())
    }

    async fn upsert_entity_descriptions(
        &self,
        rows: &[EntityDescriptionUpsert],
    ) -> Result<(), StoreError> {
        self.writes
            .lock()
            .expect("writes lock")
            .entity_rows
            .extend_from_slice(rows);
        Ok(())
    }

    async fn upsert_relationships(&self, rows: &[RelationshipUpsert]) -> Result<(), StoreError> {
        self.writes
            .lock()
            .expect("writes lock")
            .relationship_rows
            .extend_from_slice(rows);
        Ok(())
    }

    async fn similar_entity_descriptions(
        &self,
        _embedding: &[f32],
        k: usize,
    ) -> Result<Vec<CandidateEntity>, StoreError> {
        Ok(self.candidates.iter().take(k).cloned().collect())
    }

    async fn candidate_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRow>, StoreError> {
        Ok(self
            .chunk_rows
            .iter()
            .filter(|row| chunk_ids.contains(&row.uid))
            .cloned()
            .collect())
    }

    async fn entity_context(
        &self,
        _entity_keys: &[String],
        chunk_ids: &[String],
        _description_ids: &[String],
    ) -> Result<Vec<ContextRow>, StoreError> {
        Ok(self
            .context_rows
            .iter()
            .filter(|row| chunk_ids.contains(&row.chunk_uid))
            .cloned()
            .collect())
    }
}

/// LLM fake with a scripted completion and deterministic embeddings.
#[derive(Default, Clone)]
pub(crate) struct ScriptedLlm {
    pub completion: String,
    pub fail_generation: bool,
    pub fail_embedding: bool,
    /// Exact-text embedding overrides; anything else gets a length-derived
    /// vector so distinct texts stay distinguishable.
    pub embeddings: HashMap<String, Vec<f32>>,
}

#[async_trait]
impl TextGenerator for ScriptedLlm {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.fail_generation {
            return Err(LlmError::MissingField("choices[0].message.content"));
        }
        Ok(self.completion.clone())
    }
}

#[async_trait]
impl Embedder for ScriptedLlm {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail_embedding {
            return Err(LlmError::MissingField("data[0].embedding"));
        }
        if let Some(vector) = self.embeddings.get(text) {
            return Ok(vector.clone());
        }
        Ok(vec![text.len() as f32, 1.0])
    }

    fn dimensions(&self) -> usize {
        2
    }
}
