//! Batch indexing: documents -> chunks -> embeddings -> collection.
//!
//! Documents are validated against the source schema up front, then embedded
//! in batches of `batch_size` documents with one provider call per batch.
//! Any failure aborts the run before anything is persisted.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use semdex_core::chunker::Chunker;
use semdex_core::schema::SourceSchema;
use semdex_core::types::{
    Chunk, Collection, Document, MetaValue, VectorRecord, CHUNK_INDEX_KEY, DOC_ID_KEY, TEXT_KEY, TOTAL_CHUNKS_KEY,
};
use semdex_core::{Error, Result};
use semdex_embed::SharedEmbedder;

use crate::store::{self, SnapshotDescriptor};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Reported once per embedded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexProgress {
    /// 1-based number of the batch just completed.
    pub batch: usize,
    pub total_batches: usize,
    pub documents_done: usize,
    pub total_documents: usize,
    /// Records produced so far.
    pub records: usize,
}

pub struct IndexingPipeline {
    embedder: SharedEmbedder,
    chunker: Chunker,
    schema: SourceSchema,
    batch_size: usize,
}

impl IndexingPipeline {
    pub fn new(embedder: SharedEmbedder, chunker: Chunker, schema: SourceSchema) -> Self {
        Self { embedder, chunker, schema, batch_size: DEFAULT_BATCH_SIZE }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    /// Chunk and embed `documents` into a new collection named after the source.
    pub async fn index_documents<F>(&self, documents: &[Document], mut on_progress: F) -> Result<Collection>
    where
        F: FnMut(IndexProgress),
    {
        let prepared = self.prepare(documents)?;
        let total_documents = prepared.len();
        let total_batches = total_documents.div_ceil(self.batch_size);
        info!(source = %self.schema.name, documents = total_documents, batches = total_batches, "indexing started");

        let mut records = Vec::new();
        let mut documents_done = 0;
        for (batch_no, batch) in prepared.chunks(self.batch_size).enumerate() {
            let mut pending: Vec<(&str, &Document, Chunk)> = Vec::new();
            for (doc_id, doc) in batch {
                for chunk in self.chunker.chunk_document(&doc.text) {
                    pending.push((doc_id.as_str(), *doc, chunk));
                }
            }
            let texts: Vec<String> = pending.iter().map(|(_, _, c)| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for ((doc_id, doc, chunk), embedding) in pending.into_iter().zip(vectors) {
                records.push(build_record(doc_id, doc, chunk, embedding));
            }

            documents_done += batch.len();
            let progress = IndexProgress {
                batch: batch_no + 1,
                total_batches,
                documents_done,
                total_documents,
                records: records.len(),
            };
            debug!(source = %self.schema.name, batch = progress.batch, chunks = texts.len(), "embedded batch");
            on_progress(progress);
        }

        let collection = Collection::new(self.schema.name.clone(), records)?;
        info!(source = %self.schema.name, records = collection.len(), dim = collection.dimension(), "indexing finished");
        Ok(collection)
    }

    /// Embed only `documents` and merge them into `existing`.
    ///
    /// Existing records whose `doc_id` belongs to a newly indexed document are
    /// dropped; the remaining ones keep their order and the new records are
    /// appended.
    pub async fn incremental_index<F>(&self, existing: Collection, documents: &[Document], on_progress: F) -> Result<Collection>
    where
        F: FnMut(IndexProgress),
    {
        let fresh = self.index_documents(documents, on_progress).await?;
        if !existing.is_empty() && !fresh.is_empty() && existing.dimension() != fresh.dimension() {
            return Err(Error::DimensionMismatch { expected: existing.dimension(), actual: fresh.dimension() });
        }
        let replaced: HashSet<String> = fresh.records().iter().filter_map(|r| r.doc_id().map(str::to_string)).collect();
        let name = existing.name().to_string();
        let before = existing.len();
        let mut merged: Vec<VectorRecord> = existing
            .into_records()
            .into_iter()
            .filter(|r| r.doc_id().map_or(true, |id| !replaced.contains(id)))
            .collect();
        let superseded = before - merged.len();
        merged.extend(fresh.into_records());
        info!(source = %name, superseded, total = merged.len(), "incremental index merged");
        Collection::new(name, merged)
    }

    /// Index `documents` and persist the result at `path` only if the whole run succeeded.
    pub async fn index_and_save<F>(&self, documents: &[Document], path: &Path, on_progress: F) -> Result<(Collection, SnapshotDescriptor)>
    where
        F: FnMut(IndexProgress),
    {
        let collection = self.index_documents(documents, on_progress).await?;
        let descriptor = self.save(&collection, path).await?;
        Ok((collection, descriptor))
    }

    /// Persist `collection` tagged with the current provider's id.
    pub async fn save(&self, collection: &Collection, path: &Path) -> Result<SnapshotDescriptor> {
        let provider = self.embedder.provider().await?;
        store::save(collection, path, provider.id())
    }

    /// Validate every document and assign ids before any embedding happens.
    fn prepare<'a>(&self, documents: &'a [Document]) -> Result<Vec<(String, &'a Document)>> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(documents.len());
        for (position, doc) in documents.iter().enumerate() {
            if doc.text.trim().is_empty() {
                return Err(Error::invalid_argument(format!("document #{position} has empty text")));
            }
            self.schema.validate_metadata(&doc.metadata)?;
            let (doc_id, explicit) = match doc.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
                Some(id) => (id.to_string(), true),
                None => (content_id(&doc.text), false),
            };
            if !seen.insert(doc_id.clone()) {
                if explicit {
                    return Err(Error::invalid_argument(format!("duplicate document id '{doc_id}'")));
                }
                debug!(doc_id = %doc_id, "skipping document with identical content");
                continue;
            }
            prepared.push((doc_id, doc));
        }
        Ok(prepared)
    }
}

/// Stable id for documents submitted without one.
fn content_id(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes()).to_hex();
    hash.as_str()[..16].to_string()
}

fn build_record(doc_id: &str, doc: &Document, chunk: Chunk, embedding: Vec<f32>) -> VectorRecord {
    let mut metadata = doc.metadata.clone();
    metadata.insert(DOC_ID_KEY.to_string(), MetaValue::from(doc_id));
    metadata.insert(CHUNK_INDEX_KEY.to_string(), MetaValue::from(chunk.index));
    metadata.insert(TOTAL_CHUNKS_KEY.to_string(), MetaValue::from(chunk.total));
    metadata.insert(TEXT_KEY.to_string(), MetaValue::from(chunk.text));
    VectorRecord { id: format!("{doc_id}:{}", chunk.index), embedding, metadata }
}
