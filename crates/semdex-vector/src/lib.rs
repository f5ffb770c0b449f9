//! semdex-vector
//!
//! Snapshot persistence for vector collections, brute-force cosine ranking,
//! and the batch indexing pipeline that produces collections from documents.

pub mod pipeline;
pub mod similarity;
pub mod store;

pub use pipeline::{IndexProgress, IndexingPipeline};
pub use similarity::{cosine_similarity, rank, Scored};
pub use store::SnapshotDescriptor;
