//! semdex-core
//!
//! Shared domain types, error taxonomy, configuration, chunking, and the
//! per-source schemas used by the indexing and search crates.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
