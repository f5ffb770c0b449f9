//! semdex-hybrid
//!
//! Per-source search adapters (semantic and hybrid), keyword blending, and
//! the aggregator that fans one query out across sources and merges the
//! results.

pub mod adapter;
pub mod aggregator;
pub mod scoring;
pub mod types;

pub use adapter::{AdapterState, SourceAdapter};
pub use aggregator::{Aggregator, SearchMode, UnifiedQuery};
pub use types::{RankedResult, SearchQuery, SearchResponse, SearchType, Weights};
