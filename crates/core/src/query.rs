use crate::error::SearchError;
use crate::extraction::parse_records;
use crate::llm::{ChatMessage, Embedder, TextGenerator};
use crate::models::{CandidateEntity, ExtractionRecord, SearchOptions};
use crate::prompts::QUERY_ENTITY_PROMPT;
use crate::traits::GraphStore;
use std::collections::HashSet;
use tracing::debug;

/// Query-time entity extraction: recover the entities the user is asking
/// about, embed the query, and surface candidate entity descriptions from
/// the vector index.
pub struct QueryEntityExtractor<'a> {
    store: &'a dyn GraphStore,
    generator: &'a dyn TextGenerator,
    embedder: &'a dyn Embedder,
    options: &'a SearchOptions,
}

impl<'a> QueryEntityExtractor<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        generator: &'a dyn TextGenerator,
        embedder: &'a dyn Embedder,
        options: &'a SearchOptions,
    ) -> Self {
        Self {
            store,
            generator,
            embedder,
            options,
        }
    }

    /// Returns ranked candidate entities (deduplicated by description
    /// identity, not entity name) and the raw query embedding. The
    /// similarity search is seeded by the query embedding and by each
    /// extracted entity name; ties keep the store's natural return order.
    pub async fn extract(
        &self,
        query_text: &str,
    ) -> Result<(Vec<CandidateEntity>, Vec<f32>), SearchError> {
        let messages = [ChatMessage::user(format!(
            "{QUERY_ENTITY_PROMPT}{query_text}"
        ))];
        let response = self.generator.complete(&messages).await?;

        let extracted_names: Vec<String> = parse_records(&response)
            .into_iter()
            .filter_map(|record| match record {
                ExtractionRecord::Entity(entity) => Some(entity.name),
                _ => None,
            })
            .collect();
        debug!(names = ?extracted_names, "query entities extracted");

        let query_embedding = self.embedder.embed(query_text).await?;

        let mut seeds = vec![query_embedding.clone()];
        for name in &extracted_names {
            seeds.push(self.embedder.embed(name).await?);
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for seed in &seeds {
            let hits = self
                .store
                .similar_entity_descriptions(seed, self.options.entity_top_k)
                .await?;
            for hit in hits {
                if seen.insert(hit.description_id.clone()) {
                    candidates.push(hit);
                }
            }
        }

        // Stable sort: equal scores keep their arrival order.
        candidates.sort_by(|left, right| right.score.total_cmp(&left.score));
        candidates.truncate(self.options.entity_top_k);

        Ok((candidates, query_embedding))
    }
}
