//! Fixed instructions for the extraction calls. The record grammar is shared
//! by the indexing-time and query-time extractors and parsed leniently in
//! `extraction::parse_records`.

pub const GRAPH_EXTRACTION_PROMPT: &str = r#"You are an expert analyst of lecture material. From the text below, extract entities and relationships for a knowledge graph that supports studying and question answering.

1. Identify important entities of these types:
   - concept: a named idea, technique or model (e.g. "Perceptron", "Kernel Trick")
   - person: a person or role (e.g. "Frank Rosenblatt")
   - organization: an institution or group (e.g. "Stanford University")
   - document: a referenced paper, book or standard
   - formula: a named equation or mathematical result
   - method: a procedure or algorithm (e.g. "Gradient Descent")

2. Identify relationships between the entities, with a short lowercase type (e.g. uses, defines, extends, proposed_by, part_of).

3. Write a detailed description for every entity and relationship. Entity descriptions must start with "<entity name> is ..." and explain its role in the material. Relationship descriptions must explain the connection and its context.

Rules:
- Extract only information actually present in the text.
- Entity names must be exact and consistent.
- Types must be lowercase.

Output one record per line, using exactly this format:

("entity"|<entity_name>|<entity_type>|<entity_description>)
("relationship"|<source_entity>|<target_entity>|<relationship_type>|<relationship_description>)

Example:
("entity"|Perceptron|concept|Perceptron is a linear binary classifier that learns a separating hyperplane by iteratively correcting misclassified examples.)
("relationship"|SVM|Kernel Trick|uses|SVM uses the kernel trick to operate in a high-dimensional feature space without computing explicit coordinates.)

Text: "#;

pub const QUERY_ENTITY_PROMPT: &str = r#"Identify the entities the user's question is asking about. Return only entity records, one per line, using exactly this format:

("entity"|<entity_name>|<entity_type>|<short_description>)

Types must be lowercase and one of: concept, person, organization, document, formula, method. If the question mentions no identifiable entity, return nothing.

Question: "#;
