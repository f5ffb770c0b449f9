use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use semdex_core::schema::FilterParams;
use semdex_core::types::Metadata;
use semdex_core::{Error, Result};
use semdex_vector::Scored;

pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;

/// A single-source query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    #[serde(default)]
    pub filters: FilterParams,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), filters: FilterParams::new(), limit: DEFAULT_LIMIT }
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
}

pub(crate) fn require_query(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::invalid_argument("query is required and must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_weight(weight: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(Error::invalid_argument(format!("semantic_weight must lie in [0, 1], got {weight}")));
    }
    Ok(())
}

/// A record projected for callers, without its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub source: String,
    /// The active score: similarity, or the hybrid blend.
    pub score: f32,
    pub similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    pub text: String,
    pub metadata: Metadata,
}

impl RankedResult {
    pub fn from_scored(source: &str, hit: &Scored<'_>) -> Self {
        Self {
            id: hit.record.id.clone(),
            source: source.to_string(),
            score: hit.score,
            similarity: hit.score,
            keyword_score: None,
            text: hit.record.text().to_string(),
            metadata: hit.record.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Semantic,
    Hybrid,
    Unified,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Weights {
    pub fn from_semantic(semantic: f32) -> Self {
        Self { semantic, keyword: 1.0 - semantic }
    }
}

/// Response envelope shared by every search entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<RankedResult>,
    pub search_type: SearchType,
    /// Effective filters; declared but unset filters read `"all"`.
    pub filters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Weights>,
    /// Unified only: results each source returned before the global cut.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_counts: Option<BTreeMap<String, usize>>,
    /// Unified only: failure message per failed source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl SearchResponse {
    pub fn new(query: &str, search_type: SearchType, results: Vec<RankedResult>, filters: BTreeMap<String, String>) -> Self {
        Self {
            query: query.to_string(),
            total_results: results.len(),
            results,
            search_type,
            filters,
            weights: None,
            source_counts: None,
            errors: None,
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = Some(weights);
        self
    }
}
