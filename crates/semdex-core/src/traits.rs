use async_trait::async_trait;

use crate::error::Result;

/// Maps text to fixed-length vectors.
///
/// Implementations must return exactly one vector per input, all of length
/// [`EmbeddingProvider::dim`]. Calls may suspend (remote inference, model
/// warm-up) and must not block the runtime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model, recorded in snapshot descriptors.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
