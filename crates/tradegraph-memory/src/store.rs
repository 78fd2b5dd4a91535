use std::sync::{Arc, Mutex};

use tracing::debug;
use tradegraph_models::MemoryConfig;

use crate::embedding::{cosine_similarity, embedder_from_config, Embedder};
use crate::error::MemoryError;
use crate::sqlite::{MemoryRecord, MemoryTable};

/// A recommendation retrieved for a situation.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMatch {
    pub recommendation: String,
    pub similarity: f32,
}

/// One named memory namespace (e.g. `bull_memory`).
///
/// The SQLite table is shared between namespaces and guarded by a `Mutex`
/// because `rusqlite::Connection` is not `Sync`.
#[derive(Clone)]
pub struct MemoryStore {
    namespace: String,
    table: Arc<Mutex<MemoryTable>>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryStore {
    pub fn new(
        namespace: impl Into<String>,
        table: Arc<Mutex<MemoryTable>>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table,
            embedder,
        }
    }

    /// A store with its own in-memory table.
    pub fn in_memory(
        namespace: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, MemoryError> {
        let table = MemoryTable::open_in_memory()?;
        Ok(Self::new(namespace, Arc::new(Mutex::new(table)), embedder))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> Result<usize, MemoryError> {
        self.lock()?.count(&self.namespace)
    }

    pub fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len()? == 0)
    }

    /// Append `(situation, recommendation)` pairs with freshly computed embeddings.
    pub async fn add_situations(
        &self,
        situations_and_advice: &[(String, String)],
    ) -> Result<usize, MemoryError> {
        if situations_and_advice.is_empty() {
            return Ok(0);
        }

        let mut records = Vec::with_capacity(situations_and_advice.len());
        for (situation, recommendation) in situations_and_advice {
            records.push(MemoryRecord {
                situation: situation.clone(),
                embedding: self.embedder.embed(situation).await?,
                recommendation: recommendation.clone(),
            });
        }

        let added = self.lock()?.append(&self.namespace, &records)?;
        debug!(namespace = %self.namespace, added, "Stored memories");
        Ok(added)
    }

    /// Up to `n_matches` recommendations ranked by embedding similarity.
    /// Ties keep insertion order, so degenerate vectors still rank stably.
    pub async fn get_memories(
        &self,
        current_situation: &str,
        n_matches: usize,
    ) -> Result<Vec<MemoryMatch>, MemoryError> {
        if n_matches == 0 || self.is_empty()? {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(current_situation).await?;
        let records = self.lock()?.load(&self.namespace)?;

        let mut scored: Vec<MemoryMatch> = records
            .into_iter()
            .map(|record| MemoryMatch {
                similarity: cosine_similarity(&query, &record.embedding),
                recommendation: record.recommendation,
            })
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(n_matches);
        Ok(scored)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryTable>, MemoryError> {
        self.table
            .lock()
            .map_err(|e| MemoryError::Unavailable(format!("memory table mutex poisoned: {e}")))
    }
}

/// The per-role namespaces consulted by debate and manager nodes.
#[derive(Clone)]
pub struct MemoryRegistry {
    pub bull: MemoryStore,
    pub bear: MemoryStore,
    pub invest_judge: MemoryStore,
    pub trader: MemoryStore,
    pub risk_judge: MemoryStore,
}

impl MemoryRegistry {
    pub const BULL: &'static str = "bull_memory";
    pub const BEAR: &'static str = "bear_memory";
    pub const INVEST_JUDGE: &'static str = "invest_judge_memory";
    pub const TRADER: &'static str = "trader_memory";
    pub const RISK_JUDGE: &'static str = "risk_manager_memory";

    pub fn new(table: MemoryTable, embedder: Arc<dyn Embedder>) -> Self {
        let table = Arc::new(Mutex::new(table));
        let store = |name: &str| MemoryStore::new(name, table.clone(), embedder.clone());
        Self {
            bull: store(Self::BULL),
            bear: store(Self::BEAR),
            invest_judge: store(Self::INVEST_JUDGE),
            trader: store(Self::TRADER),
            risk_judge: store(Self::RISK_JUDGE),
        }
    }

    /// Build from configuration: file-backed when `sqlite_path` is set.
    pub fn from_config(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let table = match &config.sqlite_path {
            Some(path) => MemoryTable::open(path)?,
            None => MemoryTable::open_in_memory()?,
        };
        Ok(Self::new(table, embedder_from_config(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::ZeroEmbedder;
    use async_trait::async_trait;

    /// Embeds by keyword so similarity is predictable.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
            let rally = text.matches("rally").count() as f32;
            let crash = text.matches("crash").count() as f32;
            Ok(vec![rally, crash])
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(s, r)| (s.to_string(), r.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = MemoryStore::in_memory("bull_memory", Arc::new(KeywordEmbedder)).unwrap();
        assert!(store.get_memories("rally", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ranks_by_similarity() {
        let store = MemoryStore::in_memory("bull_memory", Arc::new(KeywordEmbedder)).unwrap();
        store
            .add_situations(&pairs(&[
                ("tech crash", "reduce exposure"),
                ("broad rally", "add to winners"),
            ]))
            .await
            .unwrap();

        let matches = store.get_memories("another rally", 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].recommendation, "add to winners");
    }

    #[tokio::test]
    async fn zero_vectors_rank_in_insertion_order() {
        let store = MemoryStore::in_memory("bear_memory", Arc::new(ZeroEmbedder::new(16))).unwrap();
        store
            .add_situations(&pairs(&[("a", "first"), ("b", "second"), ("c", "third")]))
            .await
            .unwrap();

        for _ in 0..3 {
            let matches = store.get_memories("anything", 2).await.unwrap();
            let recs: Vec<&str> = matches.iter().map(|m| m.recommendation.as_str()).collect();
            assert_eq!(recs, vec!["first", "second"]);
        }
    }

    #[tokio::test]
    async fn registry_namespaces_share_table_but_not_rows() {
        let registry = MemoryRegistry::new(
            MemoryTable::open_in_memory().unwrap(),
            Arc::new(ZeroEmbedder::new(4)),
        );
        registry
            .trader
            .add_situations(&pairs(&[("s", "r")]))
            .await
            .unwrap();
        assert_eq!(registry.trader.len().unwrap(), 1);
        assert!(registry.bull.is_empty().unwrap());
        assert_eq!(registry.risk_judge.namespace(), "risk_manager_memory");
    }
}
