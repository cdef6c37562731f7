use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::invocation::{InvocationOutcome, InvocationRequest};
use crate::llm::ProviderCache;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Runs one upstream call under a deadline and folds every upstream error
/// into an [`InvocationOutcome`].
#[derive(Clone, Copy, Debug)]
pub struct Executor {
    timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(
        &self,
        provider: &ProviderCache,
        request: &InvocationRequest,
    ) -> InvocationOutcome {
        let model = match provider.client().await {
            Ok(model) => model,
            Err(err) => {
                warn!(provider = %provider.name(), error = %err, "provider unavailable");
                return InvocationOutcome::config(&err);
            }
        };

        // Dropping the upstream future on expiry cancels the in-flight request.
        let result = match timeout(self.timeout, model.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                after: self.timeout,
            }),
        };

        match result {
            Ok(result) => {
                debug!(
                    provider = %model.provider(),
                    sources = result.sources.len(),
                    "upstream call succeeded"
                );
                InvocationOutcome::Success(result)
            }
            Err(err) => {
                warn!(provider = %model.provider(), error = %err, "upstream call failed");
                InvocationOutcome::provider(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ConfigError;
    use crate::invocation::FailureKind;
    use crate::llm::{InvocationResult, ReasoningModel};

    enum Behavior {
        Answer(&'static str),
        Fail,
        Empty,
        Hang,
    }

    struct ScriptedModel(Behavior);

    #[async_trait]
    impl ReasoningModel for ScriptedModel {
        fn provider(&self) -> &str {
            "Scripted"
        }

        async fn invoke(
            &self,
            _request: &InvocationRequest,
        ) -> Result<InvocationResult, ProviderError> {
            match self.0 {
                Behavior::Answer(text) => Ok(InvocationResult::text(text)),
                Behavior::Fail => Err(ProviderError::Request("connection refused".to_string())),
                Behavior::Empty => Err(ProviderError::EmptyResponse {
                    provider: "Scripted".to_string(),
                }),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn cache(behavior: Behavior) -> ProviderCache {
        ProviderCache::ready(Arc::new(ScriptedModel(behavior)))
    }

    #[tokio::test]
    async fn success_is_wrapped() {
        let outcome = Executor::default()
            .execute(&cache(Behavior::Answer("4")), &InvocationRequest::default())
            .await;

        assert_eq!(outcome, InvocationOutcome::Success(InvocationResult::text("4")));
    }

    #[tokio::test]
    async fn upstream_error_becomes_provider_failure() {
        let outcome = Executor::default()
            .execute(&cache(Behavior::Fail), &InvocationRequest::default())
            .await;

        match outcome {
            InvocationOutcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Provider);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_response_names_provider() {
        let outcome = Executor::default()
            .execute(&cache(Behavior::Empty), &InvocationRequest::default())
            .await;

        assert_eq!(
            outcome,
            InvocationOutcome::Failure {
                kind: FailureKind::EmptyResponse,
                message: "no response from Scripted".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn hanging_upstream_is_cancelled_at_deadline() {
        let outcome = Executor::new(Duration::from_millis(20))
            .execute(&cache(Behavior::Hang), &InvocationRequest::default())
            .await;

        match outcome {
            InvocationOutcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::Provider);
                assert!(message.contains("deadline exceeded"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_credential_is_a_config_failure() {
        let provider = ProviderCache::new("Gemini", || {
            Err(ConfigError::MissingCredential("GOOGLE_AI_API_KEY"))
        });

        let outcome = Executor::default()
            .execute(&provider, &InvocationRequest::default())
            .await;

        assert_eq!(
            outcome,
            InvocationOutcome::Failure {
                kind: FailureKind::Config,
                message: "provider unavailable: GOOGLE_AI_API_KEY environment variable must be set"
                    .to_string(),
            }
        );
    }

    #[test]
    fn default_deadline_is_five_minutes() {
        assert_eq!(Executor::default().timeout(), Duration::from_secs(300));
    }
}
