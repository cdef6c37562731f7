use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::ConfigError;
use crate::llm::ReasoningModel;

pub type ProviderFactory =
    dyn Fn() -> Result<Arc<dyn ReasoningModel>, ConfigError> + Send + Sync;

/// Lazily built, process-lifetime handle for one upstream provider.
///
/// Concurrent first callers race on the same cell: exactly one runs the
/// factory and every caller observes the handle it produced. A failed
/// construction is handed back to the caller and not cached.
pub struct ProviderCache {
    name: String,
    cell: OnceCell<Arc<dyn ReasoningModel>>,
    factory: Option<Box<ProviderFactory>>,
}

impl std::fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCache")
            .field("name", &self.name)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}

impl ProviderCache {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ReasoningModel>, ConfigError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
            factory: Some(Box::new(factory)),
        }
    }

    /// Wraps an already constructed model. The cell starts initialized, so
    /// no factory is kept.
    pub fn ready(model: Arc<dyn ReasoningModel>) -> Self {
        Self {
            name: model.provider().to_string(),
            cell: OnceCell::new_with(Some(model)),
            factory: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn client(&self) -> Result<Arc<dyn ReasoningModel>, ConfigError> {
        self.cell
            .get_or_try_init(|| async {
                let factory = self.factory.as_ref().ok_or_else(|| ConfigError::Client {
                    provider: self.name.clone(),
                    message: "no client factory configured".to_string(),
                })?;
                let model = factory()?;
                info!(provider = %self.name, "provider client constructed");
                Ok::<_, ConfigError>(model)
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ProviderError;
    use crate::invocation::InvocationRequest;
    use crate::llm::InvocationResult;

    struct EchoModel;

    #[async_trait]
    impl ReasoningModel for EchoModel {
        fn provider(&self) -> &str {
            "Echo"
        }

        async fn invoke(
            &self,
            request: &InvocationRequest,
        ) -> Result<InvocationResult, ProviderError> {
            Ok(InvocationResult::text(request.question.clone()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_constructs_once() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = constructions.clone();
        let cache = Arc::new(ProviderCache::new("echo", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(EchoModel) as Arc<dyn ReasoningModel>)
        }));

        let handles = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.client().await.expect("client builds") })
            })
            .collect::<Vec<_>>();

        let mut clients = Vec::new();
        for handle in handles {
            clients.push(handle.await.expect("task joins"));
        }

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(clients.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn failed_construction_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let cache = ProviderCache::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ConfigError::MissingCredential("FLAKY_API_KEY"))
            } else {
                Ok(Arc::new(EchoModel) as Arc<dyn ReasoningModel>)
            }
        });

        let err = cache.client().await.err().expect("first attempt fails");
        assert!(err.to_string().contains("FLAKY_API_KEY"));
        assert!(!cache.is_initialized());

        cache.client().await.expect("second attempt succeeds");
        assert!(cache.is_initialized());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ready_cache_starts_initialized() {
        let cache = ProviderCache::ready(Arc::new(EchoModel));

        assert_eq!(cache.name(), "Echo");
        assert!(cache.is_initialized());
        cache.client().await.expect("prebuilt client");
    }
}
