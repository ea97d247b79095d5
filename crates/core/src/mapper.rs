use crate::error::SearchError;
use crate::models::{
    normalize_entity_name, CandidateEntity, ContextRecord, DescriptionRow, SearchOptions,
};
use crate::traits::GraphStore;
use std::collections::HashMap;
use tracing::debug;

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut left_norm = 0.0f64;
    let mut right_norm = 0.0f64;
    for (a, b) in left.iter().zip(right) {
        dot += f64::from(*a) * f64::from(*b);
        left_norm += f64::from(*a) * f64::from(*a);
        right_norm += f64::from(*b) * f64::from(*b);
    }

    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

/// Ranking score for one context row. The fallback order is fixed:
/// relationship-description embedding first, then the entity's own
/// description embedding, then zero.
pub fn context_score(
    relationship_descriptions: &[DescriptionRow],
    entity_description: Option<&DescriptionRow>,
    query_embedding: &[f32],
) -> f64 {
    let best_relationship = relationship_descriptions
        .iter()
        .filter_map(|row| row.embedding.as_deref())
        .map(|embedding| cosine_similarity(embedding, query_embedding))
        .fold(None::<f64>, |best, score| {
            Some(best.map_or(score, |value| value.max(score)))
        });

    if let Some(score) = best_relationship {
        return score;
    }

    entity_description
        .and_then(|row| row.embedding.as_deref())
        .map(|embedding| cosine_similarity(embedding, query_embedding))
        .unwrap_or(0.0)
}

/// Expands candidate entities into supporting chunks and relationship
/// descriptions, merged into one ranked context set. "Nothing relevant" is a
/// normal outcome and comes back as an empty list, never an error.
pub struct EntityMapper<'a> {
    store: &'a dyn GraphStore,
    options: &'a SearchOptions,
}

impl<'a> EntityMapper<'a> {
    pub fn new(store: &'a dyn GraphStore, options: &'a SearchOptions) -> Self {
        Self { store, options }
    }

    pub async fn map(
        &self,
        candidates: &[CandidateEntity],
        query_embedding: &[f32],
    ) -> Result<Vec<ContextRecord>, SearchError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Stage 1: direct chunk similarity above the threshold.
        let chunk_ids = dedupe(candidates.iter().map(|candidate| candidate.chunk_id.clone()));
        let rows = self.store.candidate_chunks(&chunk_ids).await?;

        let mut scored_chunks: Vec<_> = rows
            .into_iter()
            .map(|row| {
                let score = cosine_similarity(&row.embedding, query_embedding);
                (row, score)
            })
            .filter(|(_, score)| *score > self.options.similarity_threshold)
            .collect();
        scored_chunks.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored_chunks.truncate(self.options.chunk_top_k);

        if scored_chunks.is_empty() {
            debug!("no chunks above similarity threshold");
            return Ok(Vec::new());
        }

        let surviving_ids: Vec<String> = scored_chunks
            .iter()
            .map(|(row, _)| row.uid.clone())
            .collect();
        let chunk_texts: HashMap<String, String> = scored_chunks
            .iter()
            .map(|(row, _)| (row.uid.clone(), row.text.clone()))
            .collect();

        // Stage 2: graph traversal around the candidate entities.
        let entity_keys = dedupe(
            candidates
                .iter()
                .map(|candidate| normalize_entity_name(&candidate.name)),
        );
        let description_ids = dedupe(
            candidates
                .iter()
                .map(|candidate| candidate.description_id.clone()),
        );

        let context_rows = self
            .store
            .entity_context(&entity_keys, &surviving_ids, &description_ids)
            .await?;

        // Stage 3: attribution and ranking.
        let mut records: Vec<ContextRecord> = context_rows
            .into_iter()
            .filter_map(|row| {
                let chunk_text = chunk_texts.get(&row.chunk_uid)?.clone();
                let score = context_score(
                    &row.relationship_descriptions,
                    row.entity_description.as_ref(),
                    query_embedding,
                );
                Some(ContextRecord {
                    entity_name: row.entity_name,
                    chunk_text,
                    entity_description: row.entity_description.map(|description| description.text),
                    relationship_descriptions: dedupe(
                        row.relationship_descriptions
                            .into_iter()
                            .map(|description| description.text),
                    ),
                    source_file: row.file_name,
                    score,
                })
            })
            .collect();

        records.sort_by(|left, right| right.score.total_cmp(&left.score));
        records.truncate(self.options.top_k);
        Ok(records)
    }
}

fn dedupe(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkRow, ContextRow};
    use crate::testing::RecordingStore;

    fn candidate(name: &str, description_id: &str, chunk_id: &str) -> CandidateEntity {
        CandidateEntity {
            name: name.to_string(),
            entity_type: "concept".to_string(),
            description_id: description_id.to_string(),
            description: format!("{name} is a concept."),
            chunk_id: chunk_id.to_string(),
            score: 0.9,
        }
    }

    fn chunk_row(uid: &str, embedding: Vec<f32>) -> ChunkRow {
        ChunkRow {
            uid: uid.to_string(),
            text: format!("text of {uid}"),
            embedding,
            file_name: Some("lecture-3.md".to_string()),
        }
    }

    fn description(text: &str, embedding: Option<Vec<f32>>) -> DescriptionRow {
        DescriptionRow {
            text: text.to_string(),
            embedding,
        }
    }

    fn options(threshold: f64) -> SearchOptions {
        SearchOptions {
            similarity_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn cosine_handles_identical_orthogonal_and_degenerate_inputs() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn score_fallback_prefers_relationship_then_entity_then_zero() {
        let query = [1.0, 0.0];
        let relationship = [description("rel", Some(vec![1.0, 0.0]))];
        let entity = description("ent", Some(vec![0.0, 1.0]));

        // Relationship embedding wins even when the entity one scores lower.
        let preferred = context_score(&relationship, Some(&entity), &query);
        assert!((preferred - 1.0).abs() < 1e-9);

        // No relationship embedding: fall back to the entity description.
        let entity_only = context_score(&[], Some(&description("ent", Some(vec![1.0, 0.0]))), &query);
        assert!((entity_only - 1.0).abs() < 1e-9);

        // Relationship rows without embeddings do not shadow the fallback.
        let bare_relationship = [description("rel", None)];
        let fallback = context_score(
            &bare_relationship,
            Some(&description("ent", Some(vec![1.0, 0.0]))),
            &query,
        );
        assert!((fallback - 1.0).abs() < 1e-9);

        assert_eq!(context_score(&[], None, &query), 0.0);
    }

    #[tokio::test]
    async fn threshold_of_one_returns_an_empty_context() {
        let store = RecordingStore {
            chunk_rows: vec![chunk_row("c1", vec![1.0, 0.0])],
            context_rows: vec![ContextRow {
                entity_name: "Perceptron".to_string(),
                chunk_uid: "c1".to_string(),
                entity_description: Some(description("d", Some(vec![1.0, 0.0]))),
                relationship_descriptions: Vec::new(),
                file_name: None,
            }],
            ..Default::default()
        };
        let options = options(1.0);
        let mapper = EntityMapper::new(&store, &options);

        let records = mapper
            .map(&[candidate("Perceptron", "d1", "c1")], &[1.0, 0.0])
            .await
            .expect("mapping");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn lowering_the_threshold_never_shrinks_the_result_set() {
        let store = RecordingStore {
            chunk_rows: vec![
                chunk_row("c1", vec![1.0, 0.0]),
                chunk_row("c2", vec![0.6, 0.8]),
            ],
            context_rows: vec![
                ContextRow {
                    entity_name: "Perceptron".to_string(),
                    chunk_uid: "c1".to_string(),
                    entity_description: Some(description("d1", Some(vec![1.0, 0.0]))),
                    relationship_descriptions: Vec::new(),
                    file_name: None,
                },
                ContextRow {
                    entity_name: "SVM".to_string(),
                    chunk_uid: "c2".to_string(),
                    entity_description: Some(description("d2", Some(vec![0.6, 0.8]))),
                    relationship_descriptions: Vec::new(),
                    file_name: None,
                },
            ],
            ..Default::default()
        };
        let candidates = [
            candidate("Perceptron", "d1", "c1"),
            candidate("SVM", "d2", "c2"),
        ];
        let query = [1.0, 0.0];

        let strict_options = options(0.9);
        let strict = EntityMapper::new(&store, &strict_options)
            .map(&candidates, &query)
            .await
            .expect("strict mapping");

        let loose_options = options(0.1);
        let loose = EntityMapper::new(&store, &loose_options)
            .map(&candidates, &query)
            .await
            .expect("loose mapping");

        assert!(loose.len() >= strict.len());
        assert_eq!(strict.len(), 1);
        assert_eq!(loose.len(), 2);
    }

    #[tokio::test]
    async fn best_matching_chunk_ranks_first_with_source_attribution() {
        let store = RecordingStore {
            chunk_rows: vec![
                chunk_row("c1", vec![1.0, 0.0]),
                chunk_row("c2", vec![0.6, 0.8]),
            ],
            context_rows: vec![
                ContextRow {
                    entity_name: "SVM".to_string(),
                    chunk_uid: "c2".to_string(),
                    entity_description: Some(description("svm desc", Some(vec![0.6, 0.8]))),
                    relationship_descriptions: vec![
                        description("SVM uses the kernel trick.", Some(vec![0.6, 0.8])),
                        description("SVM uses the kernel trick.", Some(vec![0.6, 0.8])),
                    ],
                    file_name: Some("lecture-4.md".to_string()),
                },
                ContextRow {
                    entity_name: "Perceptron".to_string(),
                    chunk_uid: "c1".to_string(),
                    entity_description: Some(description(
                        "perceptron desc",
                        Some(vec![1.0, 0.0]),
                    )),
                    relationship_descriptions: Vec::new(),
                    file_name: Some("lecture-3.md".to_string()),
                },
            ],
            ..Default::default()
        };
        let candidates = [
            candidate("Perceptron", "d1", "c1"),
            candidate("SVM", "d2", "c2"),
        ];
        let options = options(0.1);
        let mapper = EntityMapper::new(&store, &options);

        let records = mapper
            .map(&candidates, &[1.0, 0.0])
            .await
            .expect("mapping");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_name, "Perceptron");
        assert!((records[0].score - 1.0).abs() < 1e-9);
        assert_eq!(records[0].source_file.as_deref(), Some("lecture-3.md"));
        // Duplicate relationship descriptions collapse to one entry.
        assert_eq!(records[1].relationship_descriptions.len(), 1);
    }

    #[tokio::test]
    async fn no_candidates_is_a_valid_empty_outcome() {
        let store = RecordingStore::default();
        let options = options(0.5);
        let mapper = EntityMapper::new(&store, &options);

        let records = mapper.map(&[], &[1.0, 0.0]).await.expect("mapping");
        assert!(records.is_empty());
    }
}
