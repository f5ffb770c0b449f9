use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use semdex_core::traits::EmbeddingProvider;
use semdex_core::{Error, Result};

type Loader = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn EmbeddingProvider>>> + Send + Sync>;

struct Inner {
    cell: OnceCell<Arc<dyn EmbeddingProvider>>,
    loader: Loader,
}

/// Cloneable handle to one lazily loaded embedding provider.
///
/// The loader runs on first use. Concurrent first callers wait on the same
/// initialisation and the loader runs once; a failed load leaves the handle
/// empty so a later call can try again.
#[derive(Clone)]
pub struct SharedEmbedder {
    inner: Arc<Inner>,
}

impl SharedEmbedder {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn EmbeddingProvider>>> + Send + 'static,
    {
        let loader: Loader = Arc::new(move || loader().boxed());
        Self { inner: Arc::new(Inner { cell: OnceCell::new(), loader }) }
    }

    /// Wrap an already constructed provider.
    pub fn from_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(move || futures::future::ready(Ok(Arc::clone(&provider))))
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.cell.initialized()
    }

    pub async fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider = self
            .inner
            .cell
            .get_or_try_init(|| async {
                let provider = (self.inner.loader)().await?;
                info!(provider = provider.id(), dim = provider.dim(), "embedding provider loaded");
                Ok::<_, Error>(provider)
            })
            .await?;
        Ok(Arc::clone(provider))
    }

    /// Embed `texts` in one provider call, checking count and dimension.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let provider = self.provider().await?;
        let vectors = provider.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Provider(format!(
                "provider {} returned {} vectors for {} texts",
                provider.id(),
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dim()) {
            return Err(Error::DimensionMismatch { expected: provider.dim(), actual: bad.len() });
        }
        debug!(provider = provider.id(), texts = texts.len(), "embedded batch");
        Ok(vectors)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::Provider("provider returned no vector for query".into()))
    }
}

impl std::fmt::Debug for SharedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEmbedder").field("loaded", &self.is_loaded()).finish()
    }
}
