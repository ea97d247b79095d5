use crate::error::StoreError;
use crate::models::{CandidateEntity, Chunk, ChunkRow, ContextRow, DescriptionRow};
use crate::traits::{EntityDescriptionUpsert, GraphStore, RelationshipUpsert};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const VECTOR_INDEX_NAME: &str = "description_embedding";

/// Graph store over the Neo4j HTTP transaction API.
pub struct Neo4jStore {
    endpoint: String,
    database: String,
    username: String,
    password: String,
    client: Client,
}

impl Neo4jStore {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            client: Client::new(),
        }
    }

    fn tx_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.endpoint, self.database)
    }

    async fn run(&self, statement: &str, parameters: Value) -> Result<Value, StoreError> {
        let response = self
            .client
            .post(self.tx_url())
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({
                "statements": [
                    {
                        "statement": statement,
                        "parameters": parameters
                    }
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "neo4j".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;

        // The transaction endpoint reports Cypher failures with HTTP 200.
        if let Some(errors) = body.pointer("/errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                return Err(StoreError::BackendResponse {
                    backend: "neo4j".to_string(),
                    details: first
                        .pointer("/message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown cypher error")
                        .to_string(),
                });
            }
        }

        Ok(body)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ensure_schema(&self, dimensions: usize) -> Result<(), StoreError> {
        let vector_index = format!(
            "CREATE VECTOR INDEX {VECTOR_INDEX_NAME} IF NOT EXISTS \
             FOR (d:Description) ON (d.embedding) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {dimensions}, `vector.similarity_function`: 'cosine'}}}}"
        );

        // Schema statements run one per transaction.
        let statements = [
            "CREATE CONSTRAINT chunk_uid IF NOT EXISTS FOR (c:Chunk) REQUIRE c.uid IS UNIQUE",
            "CREATE CONSTRAINT entity_name IF NOT EXISTS FOR (e:Entity) REQUIRE e.name IS UNIQUE",
            "CREATE CONSTRAINT description_uid IF NOT EXISTS FOR (d:Description) REQUIRE d.uid IS UNIQUE",
            vector_index.as_str(),
        ];

        for statement in statements {
            self.run(statement, json!({})).await?;
        }
        Ok(())
    }

    async fn upsert_document_chunks(
        &self,
        document_id: &str,
        file_name: &str,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let rows: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                json!({
                    "uid": chunk.uid,
                    "text": chunk.text,
                    "header_path": chunk.header_path,
                    "embedding": chunk.embedding,
                })
            })
            .collect();

        let cypher = r#"
            MERGE (doc:Document {document_id: $document_id})
            SET doc.file_name = $file_name,
                doc.indexed_at = $indexed_at
            WITH doc
            UNWIND $rows AS row
            MERGE (c:Chunk {uid: row.uid})
            SET c.text = row.text,
                c.header_path = row.header_path,
                c.embedding = row.embedding,
                c.document_id = $document_id
            MERGE (doc)-[:CONTAINED]->(c)
            RETURN count(c) AS chunk_count
        "#;

        self.run(
            cypher,
            json!({
                "document_id": document_id,
                "file_name": file_name,
                "indexed_at": chrono::Utc::now().to_rfc3339(),
                "rows": rows,
            }),
        )
        .await?;
        Ok(())
    }

    async fn upsert_entity_descriptions(
        &self,
        rows: &[EntityDescriptionUpsert],
    ) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let rows: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "entity_key": row.entity_key,
                    "display_name": row.display_name,
                    "entity_type": row.entity_type,
                    "description_uid": row.description_uid,
                    "description": row.description,
                    "embedding": row.embedding,
                    "chunk_uid": row.chunk_uid,
                })
            })
            .collect();

        let cypher = r#"
            UNWIND $rows AS row
            MATCH (c:Chunk {uid: row.chunk_uid})
            MERGE (e:Entity {name: row.entity_key})
            ON CREATE SET e.display_name = row.display_name,
                          e.type = row.entity_type
            MERGE (d:Description {uid: row.description_uid})
            SET d.text = row.description,
                d.embedding = row.embedding,
                d.chunk_uid = row.chunk_uid,
                d.kind = 'ENTITY'
            MERGE (e)-[:DESCRIBED]->(d)
            MERGE (c)-[:MENTIONS]->(e)
            RETURN count(d) AS description_count
        "#;

        self.run(cypher, json!({ "rows": rows })).await?;
        Ok(())
    }

    async fn upsert_relationships(&self, rows: &[RelationshipUpsert]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let rows: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "source_key": row.source_key,
                    "source_display": row.source_display,
                    "target_key": row.target_key,
                    "target_display": row.target_display,
                    "rel_type": row.rel_type,
                    "relationship_uid": row.relationship_uid,
                    "description_uid": row.description_uid,
                    "description": row.description,
                    "embedding": row.embedding,
                    "chunk_uid": row.chunk_uid,
                })
            })
            .collect();

        let cypher = r#"
            UNWIND $rows AS row
            MERGE (src:Entity {name: row.source_key})
            ON CREATE SET src.display_name = row.source_display
            MERGE (tgt:Entity {name: row.target_key})
            ON CREATE SET tgt.display_name = row.target_display
            MERGE (r:Relationship {uid: row.relationship_uid})
            SET r.type = row.rel_type
            MERGE (src)-[:RELATED]->(r)
            MERGE (r)-[:RELATED]->(tgt)
            MERGE (d:Description {uid: row.description_uid})
            SET d.text = row.description,
                d.embedding = row.embedding,
                d.chunk_uid = row.chunk_uid,
                d.kind = 'RELATIONSHIP'
            MERGE (r)-[:DESCRIBED]->(d)
            RETURN count(r) AS relationship_count
        "#;

        self.run(cypher, json!({ "rows": rows })).await?;
        Ok(())
    }

    async fn similar_entity_descriptions(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<CandidateEntity>, StoreError> {
        let cypher = r#"
            CALL db.index.vector.queryNodes($index_name, $fetch, $embedding)
            YIELD node, score
            WHERE node.kind = 'ENTITY'
            MATCH (node)<-[:DESCRIBED]-(e:Entity)
            RETURN coalesce(e.display_name, e.name) AS name,
                   coalesce(e.type, '') AS type,
                   node.uid AS description_id,
                   node.text AS description,
                   node.chunk_uid AS chunk_id,
                   score
            ORDER BY score DESC LIMIT $k
        "#;

        let body = self
            .run(
                cypher,
                json!({
                    "index_name": VECTOR_INDEX_NAME,
                    // Over-fetch so the kind filter cannot starve the limit.
                    "fetch": k * 2,
                    "embedding": embedding,
                    "k": k,
                }),
            )
            .await?;

        let mut candidates = Vec::new();
        for row in extract_rows(&body) {
            let Some(values) = row.as_array() else {
                continue;
            };
            if values.len() < 6 {
                continue;
            }
            candidates.push(CandidateEntity {
                name: string_at(values, 0),
                entity_type: string_at(values, 1),
                description_id: string_at(values, 2),
                description: string_at(values, 3),
                chunk_id: string_at(values, 4),
                score: values.get(5).and_then(Value::as_f64).unwrap_or(0.0),
            });
        }
        Ok(candidates)
    }

    async fn candidate_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRow>, StoreError> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cypher = r#"
            MATCH (c:Chunk)
            WHERE c.uid IN $chunk_ids
            OPTIONAL MATCH (doc:Document)-[:CONTAINED]->(c)
            RETURN c.uid AS chunk_id,
                   c.text AS text,
                   c.embedding AS embedding,
                   doc.file_name AS file_name
        "#;

        let body = self
            .run(cypher, json!({ "chunk_ids": chunk_ids }))
            .await?;

        let mut chunks = Vec::new();
        for row in extract_rows(&body) {
            let Some(values) = row.as_array() else {
                continue;
            };
            if values.len() < 4 {
                continue;
            }
            chunks.push(ChunkRow {
                uid: string_at(values, 0),
                text: string_at(values, 1),
                embedding: values
                    .get(2)
                    .and_then(as_f32_vec)
                    .unwrap_or_default(),
                file_name: optional_string_at(values, 3),
            });
        }
        Ok(chunks)
    }

    async fn entity_context(
        &self,
        entity_keys: &[String],
        chunk_ids: &[String],
        description_ids: &[String],
    ) -> Result<Vec<ContextRow>, StoreError> {
        if entity_keys.is_empty() || chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cypher = r#"
            MATCH (c:Chunk)-[:MENTIONS]->(e:Entity)
            WHERE c.uid IN $chunk_ids AND e.name IN $entity_keys
            OPTIONAL MATCH (e)-[:RELATED]-(r:Relationship)-[:DESCRIBED]->(rd:Description)
            WHERE rd.embedding IS NOT NULL AND rd.chunk_uid IN $chunk_ids
            OPTIONAL MATCH (e)-[:DESCRIBED]->(ed:Description)
            WHERE ed.uid IN $description_ids AND ed.embedding IS NOT NULL
            OPTIONAL MATCH (doc:Document)-[:CONTAINED]->(c)
            WITH e, c, doc,
                 collect(DISTINCT rd) AS rels,
                 collect(DISTINCT ed) AS eds
            RETURN coalesce(e.display_name, e.name) AS entity_name,
                   c.uid AS chunk_id,
                   [d IN eds WHERE d IS NOT NULL | {text: d.text, embedding: d.embedding}][0] AS entity_description,
                   [d IN rels WHERE d IS NOT NULL | {text: d.text, embedding: d.embedding}] AS relationship_descriptions,
                   doc.file_name AS file_name
        "#;

        let body = self
            .run(
                cypher,
                json!({
                    "entity_keys": entity_keys,
                    "chunk_ids": chunk_ids,
                    "description_ids": description_ids,
                }),
            )
            .await?;

        let mut rows = Vec::new();
        for row in extract_rows(&body) {
            let Some(values) = row.as_array() else {
                continue;
            };
            if values.len() < 5 {
                continue;
            }
            let relationship_descriptions = values
                .get(3)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(parse_description).collect())
                .unwrap_or_default();

            rows.push(ContextRow {
                entity_name: string_at(values, 0),
                chunk_uid: string_at(values, 1),
                entity_description: values.get(2).and_then(parse_description),
                relationship_descriptions,
                file_name: optional_string_at(values, 4),
            });
        }
        Ok(rows)
    }
}

fn string_at(values: &[Value], index: usize) -> String {
    values
        .get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn optional_string_at(values: &[Value], index: usize) -> Option<String> {
    values
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn as_f32_vec(value: &Value) -> Option<Vec<f32>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_f64)
            .map(|item| item as f32)
            .collect()
    })
}

fn parse_description(value: &Value) -> Option<DescriptionRow> {
    let map = value.as_object()?;
    Some(DescriptionRow {
        text: map.get("text")?.as_str()?.to_string(),
        embedding: map.get("embedding").and_then(as_f32_vec),
    })
}

/// Flattens the transaction endpoint's `results[].data[].row` nesting.
fn extract_rows(payload: &Value) -> Vec<&Value> {
    payload
        .pointer("/results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|result| result.pointer("/data").and_then(Value::as_array))
                .flatten()
                .filter_map(|entry| entry.pointer("/row"))
                .filter(|row| row.is_array())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_rows_are_flattened_from_results_data_row() {
        let payload = json!({
            "results": [
                {
                    "columns": ["name", "score"],
                    "data": [
                        {"row": ["perceptron", 0.91]},
                        {"row": ["svm", 0.85]}
                    ]
                }
            ],
            "errors": []
        });

        let rows = extract_rows(&payload);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "perceptron");
    }

    #[test]
    fn description_maps_parse_with_optional_embeddings() {
        let with_embedding = json!({"text": "SVM uses the kernel trick.", "embedding": [0.5, 0.25]});
        let parsed = parse_description(&with_embedding).expect("description");
        assert_eq!(parsed.embedding, Some(vec![0.5, 0.25]));

        let without_embedding = json!({"text": "bare", "embedding": null});
        let parsed = parse_description(&without_embedding).expect("description");
        assert_eq!(parsed.embedding, None);

        assert!(parse_description(&json!(null)).is_none());
    }
}
