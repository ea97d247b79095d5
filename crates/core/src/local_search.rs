use crate::error::SearchError;
use crate::llm::{Embedder, TextGenerator};
use crate::mapper::EntityMapper;
use crate::models::{ContextRecord, SearchOptions};
use crate::query::QueryEntityExtractor;
use crate::traits::GraphStore;
use tracing::{error, info};

/// Local search: query-time entity extraction composed with graph-context
/// assembly. One sequential request per query; queries may run concurrently
/// because the store supports concurrent readers.
pub struct LocalSearch<S, G, E>
where
    S: GraphStore,
    G: TextGenerator,
    E: Embedder,
{
    store: S,
    generator: G,
    embedder: E,
    options: SearchOptions,
}

impl<S, G, E> LocalSearch<S, G, E>
where
    S: GraphStore,
    G: TextGenerator,
    E: Embedder,
{
    pub fn new(store: S, generator: G, embedder: E, options: SearchOptions) -> Self {
        Self {
            store,
            generator,
            embedder,
            options,
        }
    }

    /// Downstream generation must always receive some context object, so
    /// capability failures degrade to an empty result here instead of
    /// propagating.
    pub async fn search(&self, query_text: &str) -> Vec<ContextRecord> {
        match self.try_search(query_text).await {
            Ok(records) => records,
            Err(search_error) => {
                error!(%search_error, "local search degraded to empty context");
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query_text: &str) -> Result<Vec<ContextRecord>, SearchError> {
        if query_text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let extractor = QueryEntityExtractor::new(
            &self.store,
            &self.generator,
            &self.embedder,
            &self.options,
        );
        let (candidates, query_embedding) = extractor.extract(query_text).await?;

        let mapper = EntityMapper::new(&self.store, &self.options);
        let records = mapper.map(&candidates, &query_embedding).await?;

        if records.is_empty() {
            info!("no relevant information found for query");
        }
        Ok(records)
    }
}
