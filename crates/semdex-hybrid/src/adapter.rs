//! One data source bound to its snapshot and filter vocabulary.
//!
//! The collection is loaded on first use and cached for the life of the
//! adapter (`Uninitialized -> Loading -> Ready`). There is no refresh: a new
//! snapshot is picked up by a new adapter.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use semdex_core::schema::{matches_all, Predicate, SourceSchema};
use semdex_core::types::Collection;
use semdex_core::Result;
use semdex_embed::SharedEmbedder;
use semdex_vector::{rank, store};

use crate::scoring;
use crate::types::{require_query, require_weight, RankedResult, SearchQuery, SearchResponse, SearchType, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Loading,
    Ready,
}

impl AdapterState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Loading,
            2 => Self::Ready,
            _ => Self::Uninitialized,
        }
    }
}

pub struct SourceAdapter {
    schema: SourceSchema,
    snapshot_path: PathBuf,
    embedder: SharedEmbedder,
    collection: OnceCell<Arc<Collection>>,
    state: AtomicU8,
}

impl SourceAdapter {
    /// Adapter reading `<index_dir>/<schema.snapshot_file>`.
    pub fn new(schema: SourceSchema, index_dir: &Path, embedder: SharedEmbedder) -> Self {
        let snapshot_path = index_dir.join(&schema.snapshot_file);
        Self::with_snapshot_path(schema, snapshot_path, embedder)
    }

    pub fn with_snapshot_path(schema: SourceSchema, snapshot_path: PathBuf, embedder: SharedEmbedder) -> Self {
        Self {
            schema,
            snapshot_path,
            embedder,
            collection: OnceCell::new(),
            state: AtomicU8::new(AdapterState::Uninitialized as u8),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn state(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The cached collection, loading it on first call.
    ///
    /// Concurrent first callers share one load. A failed load is not cached.
    pub async fn collection(&self) -> Result<Arc<Collection>> {
        let collection = self
            .collection
            .get_or_try_init(|| async {
                self.set_state(AdapterState::Loading);
                match store::load(&self.snapshot_path).await {
                    Ok(collection) => Ok(Arc::new(collection)),
                    Err(e) => {
                        self.set_state(AdapterState::Uninitialized);
                        Err(e)
                    }
                }
            })
            .await?;
        self.set_state(AdapterState::Ready);
        Ok(Arc::clone(collection))
    }

    /// Rank by cosine similarity, filter, and keep the best `limit`.
    pub async fn semantic_search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        require_query(&query.text)?;
        let compiled = self.schema.compile_filters(&query.filters)?;
        let results = self.candidates(&query.text, &compiled.predicates, query.limit).await?;
        Ok(SearchResponse::new(&query.text, SearchType::Semantic, results, compiled.echo))
    }

    /// Semantic candidates at twice the limit, re-ranked by the keyword blend.
    pub async fn hybrid_search(&self, query: &SearchQuery, semantic_weight: f32) -> Result<SearchResponse> {
        require_query(&query.text)?;
        require_weight(semantic_weight)?;
        let compiled = self.schema.compile_filters(&query.filters)?;
        let candidates = self
            .candidates(&query.text, &compiled.predicates, query.limit.saturating_mul(2))
            .await?;
        let results = scoring::blend(&query.text, candidates, semantic_weight, query.limit);
        Ok(SearchResponse::new(&query.text, SearchType::Hybrid, results, compiled.echo)
            .with_weights(Weights::from_semantic(semantic_weight)))
    }

    /// Ask the engine for `2 * limit` hits, keep those passing every predicate, cut to `limit`.
    async fn candidates(&self, text: &str, predicates: &[Predicate], limit: usize) -> Result<Vec<RankedResult>> {
        let collection = self.collection().await?;
        let query_vector = self.embedder.embed_query(text).await?;
        let hits = rank(&query_vector, &collection, limit.saturating_mul(2))?;
        let scanned = hits.len();
        let results: Vec<RankedResult> = hits
            .iter()
            .filter(|hit| matches_all(predicates, &hit.record.metadata))
            .take(limit)
            .map(|hit| RankedResult::from_scored(self.name(), hit))
            .collect();
        debug!(source = self.name(), scanned, kept = results.len(), "semantic candidates");
        Ok(results)
    }

    fn set_state(&self, state: AdapterState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for SourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("source", &self.schema.name)
            .field("snapshot_path", &self.snapshot_path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
