use std::sync::Arc;
use tracing::debug;

use crate::metadata::models::{BusinessRule, Concept, Example, QueryPattern, TableMetadata};
use crate::metadata::{CatalogCounts, CatalogStore, StoreError};
use crate::util::best_effort;
use crate::util::cache::{Clock, TtlCache};

/// Read client over the catalog store with time-boxed in-memory caching of
/// the reference lists. Cache entries are disposable; on expiry the next
/// call fetches a fresh copy. Usage-counter increments are best-effort and
/// never block or fail the caller.
pub struct MetadataClient {
    store: Arc<dyn CatalogStore>,
    concepts: TtlCache<Vec<Concept>>,
    tables: TtlCache<Vec<TableMetadata>>,
    patterns: TtlCache<Vec<QueryPattern>>,
    rules: TtlCache<Vec<BusinessRule>>,
}

impl MetadataClient {
    pub fn new(store: Arc<dyn CatalogStore>, ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            concepts: TtlCache::new(ttl_secs, Arc::clone(&clock)),
            tables: TtlCache::new(ttl_secs, Arc::clone(&clock)),
            patterns: TtlCache::new(ttl_secs, Arc::clone(&clock)),
            rules: TtlCache::new(ttl_secs, clock),
        }
    }

    pub async fn concepts(&self) -> Result<Vec<Concept>, StoreError> {
        if let Some(cached) = self.concepts.get().await {
            return Ok(cached);
        }
        debug!("concept cache expired, fetching");
        let fresh = self.store.concepts().await?;
        self.concepts.put(fresh.clone()).await;
        Ok(fresh)
    }

    pub async fn tables(&self) -> Result<Vec<TableMetadata>, StoreError> {
        if let Some(cached) = self.tables.get().await {
            return Ok(cached);
        }
        let fresh = self.store.tables().await?;
        self.tables.put(fresh.clone()).await;
        Ok(fresh)
    }

    pub async fn patterns(&self) -> Result<Vec<QueryPattern>, StoreError> {
        if let Some(cached) = self.patterns.get().await {
            return Ok(cached);
        }
        let fresh = self.store.patterns().await?;
        self.patterns.put(fresh.clone()).await;
        Ok(fresh)
    }

    pub async fn rules(&self) -> Result<Vec<BusinessRule>, StoreError> {
        if let Some(cached) = self.rules.get().await {
            return Ok(cached);
        }
        let fresh = self.store.rules().await?;
        self.rules.put(fresh.clone()).await;
        Ok(fresh)
    }

    pub async fn successful_examples(&self, limit: usize) -> Result<Vec<Example>, StoreError> {
        // Examples grow continuously; always read through.
        self.store.successful_examples(limit).await
    }

    pub async fn catalog_counts(&self) -> Result<CatalogCounts, StoreError> {
        self.store.catalog_counts().await
    }

    /// Fire-and-forget usage bump for matched concepts.
    pub fn bump_usage(&self, ids: Vec<i64>) {
        if ids.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        best_effort("concept usage bump", async move {
            store.bump_concept_usage(&ids).await?;
            Ok(())
        });
    }
}
