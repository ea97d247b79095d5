use crate::error::LlmError;
use crate::llm::{ChatMessage, Embedder, TextGenerator};
use crate::models::{
    EmbeddedEntity, EmbeddedRelationship, EntityRecord, Extraction, ExtractionRecord,
    RelationshipRecord,
};
use crate::prompts::GRAPH_EXTRACTION_PROMPT;
use tracing::debug;

/// Parses extraction output with a tolerant line-oriented grammar. Each line
/// is expected to look like
/// `("entity"|<name>|<type>|<description>)` or
/// `("relationship"|<source>|<target>|<type>|<description>)`.
/// Anything else becomes `Unparsed` instead of failing the chunk; extra
/// separators inside the description are folded back in.
pub fn parse_records(text: &str) -> Vec<ExtractionRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> ExtractionRecord {
    let inner = line
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();
    let fields: Vec<&str> = inner.split('|').collect();

    let marker = fields[0].trim().trim_matches('"').to_lowercase();
    match (marker.as_str(), fields.len()) {
        ("entity", n) if n >= 4 => {
            let name = fields[1].trim();
            let entity_type = fields[2].trim().to_lowercase();
            let description = fields[3..].join("|").trim().to_string();
            if name.is_empty() || description.is_empty() {
                return ExtractionRecord::Unparsed(line.to_string());
            }
            ExtractionRecord::Entity(EntityRecord {
                name: name.to_string(),
                entity_type,
                description,
            })
        }
        ("relationship", n) if n >= 5 => {
            let source = fields[1].trim();
            let target = fields[2].trim();
            let rel_type = fields[3].trim().to_lowercase();
            let description = fields[4..].join("|").trim().to_string();
            if source.is_empty() || target.is_empty() || description.is_empty() {
                return ExtractionRecord::Unparsed(line.to_string());
            }
            ExtractionRecord::Relationship(RelationshipRecord {
                source: source.to_string(),
                target: target.to_string(),
                rel_type,
                description,
            })
        }
        _ => ExtractionRecord::Unparsed(line.to_string()),
    }
}

/// Indexing-time extractor: one generation call per chunk, lenient parsing,
/// then an embedding per entity/relationship description.
pub struct GraphExtractor<'a> {
    generator: &'a dyn TextGenerator,
    embedder: &'a dyn Embedder,
}

impl<'a> GraphExtractor<'a> {
    pub fn new(generator: &'a dyn TextGenerator, embedder: &'a dyn Embedder) -> Self {
        Self {
            generator,
            embedder,
        }
    }

    /// A failed generation or embedding call surfaces as an error here; the
    /// pipeline downgrades it to an empty extraction for that chunk only.
    pub async fn extract(&self, chunk_text: &str) -> Result<Extraction, LlmError> {
        let messages = [ChatMessage::user(format!(
            "{GRAPH_EXTRACTION_PROMPT}{chunk_text}"
        ))];
        let response = self.generator.complete(&messages).await?;

        let mut extraction = Extraction::default();
        for record in parse_records(&response) {
            match record {
                ExtractionRecord::Entity(record) => {
                    let embedding = self.embedder.embed(&record.description).await?;
                    extraction.entities.push(EmbeddedEntity { record, embedding });
                }
                ExtractionRecord::Relationship(record) => {
                    let embedding = self.embedder.embed(&record.description).await?;
                    extraction
                        .relationships
                        .push(EmbeddedRelationship { record, embedding });
                }
                ExtractionRecord::Unparsed(line) => {
                    debug!(line, "dropping unparsed extraction record");
                    extraction.unparsed += 1;
                }
            }
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn entity_records_are_parsed_and_type_normalized() {
        let records =
            parse_records(r#"("entity"|Perceptron|Concept|Perceptron is a linear classifier.)"#);

        assert_eq!(records.len(), 1);
        let ExtractionRecord::Entity(entity) = &records[0] else {
            panic!("expected entity record");
        };
        assert_eq!(entity.name, "Perceptron");
        assert_eq!(entity.entity_type, "concept");
        assert_eq!(entity.description, "Perceptron is a linear classifier.");
    }

    #[test]
    fn relationship_records_are_parsed() {
        let records = parse_records(
            r#"("relationship"|SVM|Kernel Trick|Uses|SVM uses the kernel trick for nonlinearity.)"#,
        );

        let ExtractionRecord::Relationship(rel) = &records[0] else {
            panic!("expected relationship record");
        };
        assert_eq!(rel.source, "SVM");
        assert_eq!(rel.target, "Kernel Trick");
        assert_eq!(rel.rel_type, "uses");
    }

    #[test]
    fn separators_inside_descriptions_are_preserved() {
        let records = parse_records(r#"("entity"|Norm|formula|The L1|L2 norms measure length.)"#);

        let ExtractionRecord::Entity(entity) = &records[0] else {
            panic!("expected entity record");
        };
        assert_eq!(entity.description, "The L1|L2 norms measure length.");
    }

    #[test]
    fn malformed_lines_become_unparsed_without_failing_siblings() {
        let response = r#"
            ("entity"|Perceptron|concept|Perceptron is a linear classifier.)
            here is some chatter from the model
            ("entity"|MissingDescription|concept)
            ("relationship"|A|B|uses|A uses B.)
        "#;
        let records = parse_records(response);

        assert_eq!(records.len(), 4);
        let unparsed = records
            .iter()
            .filter(|record| matches!(record, ExtractionRecord::Unparsed(_)))
            .count();
        assert_eq!(unparsed, 2);
    }

    #[test]
    fn blank_lines_are_skipped_entirely() {
        assert!(parse_records("\n   \n").is_empty());
    }

    struct ScriptedLlm {
        response: String,
        fail_embedding: bool,
    }

    #[async_trait]
    impl TextGenerator for ScriptedLlm {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            Ok(self.response.clone())
        }
    }

    #[async_trait]
    impl Embedder for ScriptedLlm {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            if self.fail_embedding {
                return Err(LlmError::MissingField("data[0].embedding"));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn extractor_embeds_descriptions_and_counts_unparsed() {
        let llm = ScriptedLlm {
            response: [
                r#"("entity"|Perceptron|concept|Perceptron is a linear classifier.)"#,
                "noise line",
                r#"("relationship"|SVM|Kernel Trick|uses|SVM uses the kernel trick.)"#,
            ]
            .join("\n"),
            fail_embedding: false,
        };

        let extractor = GraphExtractor::new(&llm, &llm);
        let extraction = extractor.extract("chunk body").await.expect("extraction");

        assert_eq!(extraction.entities.len(), 1);
        assert_eq!(extraction.relationships.len(), 1);
        assert_eq!(extraction.unparsed, 1);
        assert_eq!(extraction.entities[0].embedding.len(), 2);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_the_chunk_extraction() {
        let llm = ScriptedLlm {
            response: r#"("entity"|Perceptron|concept|Perceptron is a linear classifier.)"#
                .to_string(),
            fail_embedding: true,
        };

        let extractor = GraphExtractor::new(&llm, &llm);
        assert!(extractor.extract("chunk body").await.is_err());
    }
}
