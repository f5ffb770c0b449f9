//! Per-source metadata schemas and declarative filter predicates.
//!
//! A [`SourceSchema`] names the metadata fields a source may carry and the
//! ordered filter vocabulary its queries accept. Query parameters compile
//! into a list of [`Predicate`]s that are evaluated in declared order with
//! AND semantics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{MetaValue, Metadata};

/// Filter parameters as received from a caller: parameter name to raw value.
pub type FilterParams = BTreeMap<String, String>;

/// Echo value for a declared filter the caller left unset.
pub const UNSET_FILTER: &str = "all";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Exact,
    Substring,
    DateFrom,
    DateUntil,
}

/// Binds a query parameter to a metadata field with a comparator kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterField {
    pub param: String,
    pub field: String,
    pub kind: FilterKind,
}

impl FilterField {
    pub fn new(param: &str, field: &str, kind: FilterKind) -> Self {
        Self { param: param.to_string(), field: field.to_string(), kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Equals(String),
    Contains(String),
    OnOrAfter(NaiveDate),
    OnOrBefore(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub comparator: Comparator,
}

impl Predicate {
    /// A record lacking the field never matches.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(value) = metadata.get(&self.field) else { return false };
        match &self.comparator {
            Comparator::Equals(expected) => value.to_string() == *expected,
            Comparator::Contains(needle) => value.to_string().contains(needle.as_str()),
            Comparator::OnOrAfter(date) => date_of(value).is_some_and(|d| d >= *date),
            Comparator::OnOrBefore(date) => date_of(value).is_some_and(|d| d <= *date),
        }
    }
}

/// Every predicate must hold.
pub fn matches_all(predicates: &[Predicate], metadata: &Metadata) -> bool {
    predicates.iter().all(|p| p.matches(metadata))
}

/// Compiled query filters plus the echo reported back to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilters {
    pub predicates: Vec<Predicate>,
    pub echo: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub name: String,
    /// Snapshot file name inside the index directory.
    pub snapshot_file: String,
    /// Metadata keys a document of this source may carry.
    pub fields: Vec<String>,
    pub filters: Vec<FilterField>,
}

impl SourceSchema {
    /// Chat messages synchronised from the team chat platform.
    pub fn messages() -> Self {
        Self {
            name: "messages".into(),
            snapshot_file: "messages.json".into(),
            fields: to_strings(&["server_id", "channel_id", "author", "timestamp", "message_id"]),
            filters: vec![
                FilterField::new("server", "server_id", FilterKind::Exact),
                FilterField::new("channel", "channel_id", FilterKind::Exact),
                FilterField::new("author", "author", FilterKind::Exact),
                FilterField::new("start_date", "timestamp", FilterKind::DateFrom),
                FilterField::new("end_date", "timestamp", FilterKind::DateUntil),
            ],
        }
    }

    /// Files on disk (notes, docs, source).
    pub fn files() -> Self {
        Self {
            name: "files".into(),
            snapshot_file: "files.json".into(),
            fields: to_strings(&["file_path", "doc_type", "category", "title"]),
            filters: vec![
                FilterField::new("path", "file_path", FilterKind::Substring),
                FilterField::new("doc_type", "doc_type", FilterKind::Exact),
                FilterField::new("category", "category", FilterKind::Exact),
            ],
        }
    }

    /// Curated knowledge entries grouped into clusters.
    pub fn knowledge() -> Self {
        Self {
            name: "knowledge".into(),
            snapshot_file: "knowledge.json".into(),
            fields: to_strings(&["cluster", "category", "title", "updated_at"]),
            filters: vec![
                FilterField::new("cluster", "cluster", FilterKind::Exact),
                FilterField::new("category", "category", FilterKind::Exact),
                FilterField::new("start_date", "updated_at", FilterKind::DateFrom),
                FilterField::new("end_date", "updated_at", FilterKind::DateUntil),
            ],
        }
    }

    pub fn builtin_sources() -> Vec<Self> {
        vec![Self::messages(), Self::files(), Self::knowledge()]
    }

    pub fn builtin(name: &str) -> Option<Self> {
        Self::builtin_sources().into_iter().find(|s| s.name == name)
    }

    pub fn declares_param(&self, param: &str) -> bool {
        self.filters.iter().any(|f| f.param == param)
    }

    /// Keep only the parameters this source declares.
    pub fn retain_declared(&self, params: &FilterParams) -> FilterParams {
        params
            .iter()
            .filter(|(k, _)| self.declares_param(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Check caller metadata against the closed field set of this source.
    pub fn validate_metadata(&self, metadata: &Metadata) -> Result<()> {
        for (key, value) in metadata {
            if !self.fields.iter().any(|f| f == key) {
                return Err(Error::invalid_argument(format!(
                    "metadata field '{key}' is not part of the '{}' schema (allowed: {})",
                    self.name,
                    self.fields.join(", ")
                )));
            }
            let is_date_field = self
                .filters
                .iter()
                .any(|f| f.field == *key && matches!(f.kind, FilterKind::DateFrom | FilterKind::DateUntil));
            if is_date_field && date_of(value).is_none() {
                return Err(Error::invalid_argument(format!(
                    "metadata field '{key}' must start with a YYYY-MM-DD date, got '{value}'"
                )));
            }
        }
        Ok(())
    }

    /// Compile caller parameters into ordered predicates and a filter echo.
    ///
    /// Empty values count as unset. Unknown parameters and malformed dates
    /// are argument errors.
    pub fn compile_filters(&self, params: &FilterParams) -> Result<CompiledFilters> {
        if let Some(unknown) = params.keys().find(|k| !self.declares_param(k)) {
            return Err(Error::invalid_argument(format!(
                "unknown filter '{unknown}' for source '{}'",
                self.name
            )));
        }
        let mut compiled = CompiledFilters::default();
        for filter in &self.filters {
            let value = params.get(&filter.param).map(|v| v.trim()).filter(|v| !v.is_empty());
            let Some(value) = value else {
                compiled.echo.insert(filter.param.clone(), UNSET_FILTER.to_string());
                continue;
            };
            let comparator = match filter.kind {
                FilterKind::Exact => Comparator::Equals(value.to_string()),
                FilterKind::Substring => Comparator::Contains(value.to_string()),
                FilterKind::DateFrom => Comparator::OnOrAfter(parse_date(&filter.param, value)?),
                FilterKind::DateUntil => Comparator::OnOrBefore(parse_date(&filter.param, value)?),
            };
            compiled.predicates.push(Predicate { field: filter.field.clone(), comparator });
            compiled.echo.insert(filter.param.clone(), value.to_string());
        }
        Ok(compiled)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn parse_date(param: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| Error::invalid_argument(format!("filter '{param}' expects YYYY-MM-DD, got '{value}'")))
}

/// Date part of a metadata value (`2024-05-01` or `2024-05-01T10:00:00Z`).
fn date_of(value: &MetaValue) -> Option<NaiveDate> {
    let s = value.as_str()?;
    NaiveDate::parse_from_str(s.get(..10)?, DATE_FORMAT).ok()
}
