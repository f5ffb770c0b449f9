//! Domain types shared by the indexing and search crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

pub type RecordId = String;
pub type Metadata = BTreeMap<String, MetaValue>;

/// Metadata key holding the chunk text of a record.
pub const TEXT_KEY: &str = "text";
/// Metadata key holding the id of the document a chunk came from.
pub const DOC_ID_KEY: &str = "doc_id";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
pub const TOTAL_CHUNKS_KEY: &str = "total_chunks";

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<usize> for MetaValue {
    fn from(i: usize) -> Self {
        Self::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A raw document handed to the indexing pipeline.
///
/// - `id`: optional stable identity; derived from the text when absent
/// - `text`: the full text payload, chunked before embedding
/// - `metadata`: source-specific fields, validated against the source schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: Some(id.into()), text: text.into(), metadata: Metadata::new() }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded text segment of a document, positioned among its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub total: usize,
}

/// One embedded chunk. Immutable once built by the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: RecordId,
    /// Older snapshots named this field `vector`.
    #[serde(alias = "vector")]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    pub fn text(&self) -> &str {
        self.metadata.get(TEXT_KEY).and_then(MetaValue::as_str).unwrap_or("")
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.metadata.get(DOC_ID_KEY).and_then(MetaValue::as_str)
    }
}

/// A named, homogeneous set of vector records.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    name: String,
    dimension: usize,
    records: Vec<VectorRecord>,
}

impl Collection {
    /// Build a collection, rejecting records whose embedding length differs
    /// from the first record's or that hold a NaN or infinite component.
    pub fn new(name: impl Into<String>, records: Vec<VectorRecord>) -> Result<Self> {
        let dimension = records.first().map_or(0, |r| r.embedding.len());
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(Error::DimensionMismatch { expected: dimension, actual: bad.embedding.len() });
        }
        if let Some(bad) = records.iter().find(|r| r.embedding.iter().any(|x| !x.is_finite())) {
            return Err(Error::invalid_argument(format!("record '{}' has a non-finite embedding component", bad.id)));
        }
        Ok(Self { name: name.into(), dimension, records })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Embedding length shared by every record; 0 for an empty collection.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<VectorRecord> {
        self.records
    }
}
