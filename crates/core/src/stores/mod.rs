pub mod neo4j;

pub use neo4j::Neo4jStore;
