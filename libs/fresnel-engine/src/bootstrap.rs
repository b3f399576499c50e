use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fresnel_api::index::SearchIndex;
use fresnel_api::store::DocumentStore;
use fresnel_index::ElasticIndex;
use fresnel_store::FileStore;

use crate::config::FresnelConfig;
use crate::error::EngineError;
use crate::intercept::{Interceptor, MirrorSet};
use crate::propagate::Propagator;

/// The running engine — primary store, write interceptor and the
/// propagation worker behind it.
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    interceptor: Arc<Interceptor>,
    worker: JoinHandle<()>,
    token: CancellationToken,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Bootstrap from configuration: file-backed primary store, HTTP
    /// search index client. Must run inside a tokio runtime.
    pub fn bootstrap(config: &FresnelConfig) -> Result<Self, EngineError> {
        let store = FileStore::open(&config.data_file)
            .map_err(|e| e.with_context("primary store"))?;
        tracing::info!(
            data_file = %config.data_file,
            collections = ?store.collections(),
            "opened primary store"
        );

        let index = ElasticIndex::new(
            &config.index.url,
            Duration::from_secs(config.index.timeout_secs),
        )
        .map_err(|e| e.with_context("search index"))?;
        tracing::info!(url = %config.index.url, "search index client ready");

        Ok(Self::with_backends(config, Arc::new(store), Arc::new(index)))
    }

    /// Assemble the engine from explicit backends. The constructed index
    /// client is process-scoped: built once, shared by every propagation,
    /// injected here rather than reached through a global. Tests inject
    /// doubles through the same seam.
    pub fn with_backends(
        config: &FresnelConfig,
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        let token = CancellationToken::new();
        let (propagator, worker) = Propagator::spawn(index, &config.propagation, token.clone());

        let mirrors = MirrorSet::from_config(&config.mirrors);
        for (collection, index_name) in mirrors.iter() {
            tracing::info!(collection = %collection, index = %index_name, "mirroring collection");
        }

        Self {
            store,
            interceptor: Arc::new(Interceptor::new(mirrors, propagator)),
            worker,
            token,
        }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn interceptor(&self) -> Arc<Interceptor> {
        self.interceptor.clone()
    }

    /// Token cancelled on shutdown; the API server shares it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Graceful shutdown: drain already-queued propagation jobs, then
    /// flush the primary store.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.worker.await;
        if let Err(e) = self.store.flush().await {
            tracing::error!(error = %e, "store flush error");
        }
        tracing::info!("engine shut down");
    }
}
