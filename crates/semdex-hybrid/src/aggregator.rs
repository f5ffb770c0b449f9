//! Unified search across every registered source.
//!
//! All selected adapters run concurrently and every call settles to a
//! `Result`; a failing source is reported in `errors` and never fails the
//! whole query.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use semdex_core::schema::{FilterParams, SourceSchema};
use semdex_core::{Error, Result};
use semdex_embed::SharedEmbedder;

use crate::adapter::SourceAdapter;
use crate::scoring::sort_by_score;
use crate::types::{
    require_query, require_weight, RankedResult, SearchQuery, SearchResponse, SearchType, Weights, DEFAULT_LIMIT,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Hybrid { semantic_weight: f32 },
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Semantic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedQuery {
    pub text: String,
    /// Source names to query; `None` or empty means every registered source.
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub filters: FilterParams,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub mode: SearchMode,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl UnifiedQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: None,
            filters: FilterParams::new(),
            limit: DEFAULT_LIMIT,
            mode: SearchMode::Semantic,
        }
    }

    #[must_use]
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(param.into(), value.into());
        self
    }

    #[must_use]
    pub fn hybrid(mut self, semantic_weight: f32) -> Self {
        self.mode = SearchMode::Hybrid { semantic_weight };
        self
    }
}

pub struct Aggregator {
    adapters: Vec<Arc<SourceAdapter>>,
}

impl Aggregator {
    /// Adapters are queried and merged in the order given.
    pub fn new(adapters: Vec<Arc<SourceAdapter>>) -> Self {
        Self { adapters }
    }

    /// One adapter per schema, all reading from `index_dir` and sharing `embedder`.
    pub fn from_schemas(schemas: Vec<SourceSchema>, index_dir: &Path, embedder: SharedEmbedder) -> Self {
        let adapters = schemas
            .into_iter()
            .map(|schema| Arc::new(SourceAdapter::new(schema, index_dir, embedder.clone())))
            .collect();
        Self::new(adapters)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.adapters.iter().map(|a| a.name())
    }

    pub fn adapter(&self, name: &str) -> Option<&Arc<SourceAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    pub async fn search(&self, query: &UnifiedQuery) -> Result<SearchResponse> {
        require_query(&query.text)?;
        if let SearchMode::Hybrid { semantic_weight } = query.mode {
            require_weight(semantic_weight)?;
        }

        let mut errors = BTreeMap::new();
        let mut selected = Vec::new();
        for name in self.selected_names(query) {
            match self.adapter(&name) {
                Some(adapter) => selected.push(Arc::clone(adapter)),
                None => {
                    warn!(source = %name, "unknown source requested");
                    errors.insert(name.clone(), unknown_source(&name).to_string());
                }
            }
        }

        let calls = selected.iter().map(|adapter| {
            let single = SearchQuery {
                text: query.text.clone(),
                filters: adapter.schema().retain_declared(&query.filters),
                limit: query.limit,
            };
            let mode = query.mode;
            async move {
                match mode {
                    SearchMode::Semantic => adapter.semantic_search(&single).await,
                    SearchMode::Hybrid { semantic_weight } => adapter.hybrid_search(&single, semantic_weight).await,
                }
            }
        });
        let settled = join_all(calls).await;

        let mut source_counts = BTreeMap::new();
        let mut results: Vec<RankedResult> = Vec::new();
        for (adapter, outcome) in selected.iter().zip(settled) {
            match outcome {
                Ok(response) => {
                    source_counts.insert(adapter.name().to_string(), response.results.len());
                    results.extend(response.results);
                }
                Err(e) => {
                    warn!(source = adapter.name(), error = %e, retryable = e.is_retryable(), "source search failed");
                    source_counts.insert(adapter.name().to_string(), 0);
                    errors.insert(adapter.name().to_string(), e.to_string());
                }
            }
        }
        for name in errors.keys() {
            source_counts.entry(name.clone()).or_insert(0);
        }

        sort_by_score(&mut results);
        results.truncate(query.limit);
        debug!(sources = selected.len(), failed = errors.len(), returned = results.len(), "unified search merged");

        let mut response = SearchResponse::new(&query.text, SearchType::Unified, results, query.filters.clone());
        if let SearchMode::Hybrid { semantic_weight } = query.mode {
            response = response.with_weights(Weights::from_semantic(semantic_weight));
        }
        response.source_counts = Some(source_counts);
        response.errors = Some(errors);
        Ok(response)
    }

    /// Requested names deduplicated in request order, or every registered source.
    fn selected_names(&self, query: &UnifiedQuery) -> Vec<String> {
        match query.sources.as_deref() {
            Some(requested) if !requested.is_empty() => {
                let mut seen = HashSet::new();
                requested
                    .iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && seen.insert(s.clone()))
                    .collect()
            }
            _ => self.sources().map(str::to_string).collect(),
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").field("adapters", &self.adapters).finish()
    }
}

fn unknown_source(name: &str) -> Error {
    Error::invalid_argument(format!("unknown source '{name}'"))
}
