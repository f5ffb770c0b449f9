//! semdex-embed
//!
//! Embedding providers and the shared, lazily initialised provider handle used
//! by both the indexing pipeline and the search adapters.

mod hashing;
mod shared;

pub use hashing::HashingEmbedder;
pub use shared::SharedEmbedder;

use std::sync::Arc;

use semdex_core::config::EmbeddingSettings;
use semdex_core::traits::EmbeddingProvider;
use semdex_core::{Error, Result};

/// Build a shared handle for the provider named in `settings`.
///
/// Nothing is loaded until the first embedding request.
pub fn from_settings(settings: &EmbeddingSettings) -> Result<SharedEmbedder> {
    match settings.provider.as_str() {
        "hashing" => {
            let dim = settings.dimensions;
            Ok(SharedEmbedder::new(move || async move {
                let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(dim)?);
                Ok(provider)
            }))
        }
        other => Err(Error::InvalidConfig(format!("unknown embedding provider '{other}' (expected: hashing)"))),
    }
}
