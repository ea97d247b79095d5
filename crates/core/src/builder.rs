use crate::error::StoreError;
use crate::models::{content_uid, normalize_entity_name, ChunkExtraction};
use crate::traits::{EntityDescriptionUpsert, GraphStore, RelationshipUpsert};
use tracing::info;

/// Counts of what one build pass wrote.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSummary {
    pub chunks: usize,
    pub entities: usize,
    pub relationships: usize,
}

/// Writes one document's chunks and extractions into the graph. Entity
/// identity is the normalized name; description and relationship uids are
/// content-addressed over `(entity key, chunk uid)`, so running the builder
/// twice over the same input merges into the same nodes instead of
/// duplicating descriptions.
pub struct GraphBuilder<'a> {
    store: &'a dyn GraphStore,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self { store }
    }

    /// Writes are serialized per document: chunks first so descriptions can
    /// link back to them, then entity descriptions, then relationships.
    pub async fn build(
        &self,
        document_id: &str,
        file_name: &str,
        extractions: &[ChunkExtraction],
    ) -> Result<BuildSummary, StoreError> {
        let chunks: Vec<_> = extractions
            .iter()
            .map(|item| item.chunk.clone())
            .collect();

        let mut entity_rows = Vec::new();
        let mut relationship_rows = Vec::new();

        for item in extractions {
            let chunk_uid = &item.chunk.uid;

            for entity in &item.extraction.entities {
                let entity_key = normalize_entity_name(&entity.record.name);
                entity_rows.push(EntityDescriptionUpsert {
                    description_uid: content_uid(&[entity_key.as_str(), chunk_uid.as_str()]),
                    entity_key,
                    display_name: entity.record.name.clone(),
                    entity_type: entity.record.entity_type.clone(),
                    description: entity.record.description.clone(),
                    embedding: entity.embedding.clone(),
                    chunk_uid: chunk_uid.clone(),
                });
            }

            for relationship in &item.extraction.relationships {
                let source_key = normalize_entity_name(&relationship.record.source);
                let target_key = normalize_entity_name(&relationship.record.target);
                let relationship_uid = content_uid(&[
                    source_key.as_str(),
                    target_key.as_str(),
                    relationship.record.rel_type.as_str(),
                    chunk_uid.as_str(),
                ]);
                relationship_rows.push(RelationshipUpsert {
                    description_uid: content_uid(&[relationship_uid.as_str(), "description"]),
                    source_key,
                    source_display: relationship.record.source.clone(),
                    target_key,
                    target_display: relationship.record.target.clone(),
                    rel_type: relationship.record.rel_type.clone(),
                    relationship_uid,
                    description: relationship.record.description.clone(),
                    embedding: relationship.embedding.clone(),
                    chunk_uid: chunk_uid.clone(),
                });
            }
        }

        self.store
            .upsert_document_chunks(document_id, file_name, &chunks)
            .await?;
        self.store.upsert_entity_descriptions(&entity_rows).await?;
        self.store.upsert_relationships(&relationship_rows).await?;

        let summary = BuildSummary {
            chunks: chunks.len(),
            entities: entity_rows.len(),
            relationships: relationship_rows.len(),
        };
        info!(
            document_id,
            chunks = summary.chunks,
            entities = summary.entities,
            relationships = summary.relationships,
            "graph build complete"
        );
        Ok(summary)
    }
}
