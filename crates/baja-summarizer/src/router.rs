use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Configuration for a single provider slot inside the ProviderRouter.
pub struct ProviderSlot {
    /// The LLM provider to try.
    pub provider: Box<dyn LlmProvider>,
    /// Maximum number of retries before moving to the next provider.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
        }
    }
}

/// Routes requests across multiple providers with automatic failover.
///
/// Slots are tried in priority order (index 0 first). The usual setup is one
/// slot per configured model: a fast primary model, then `openrouter/auto`.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    /// Returns `None` when `slots` is empty.
    pub fn new(slots: Vec<ProviderSlot>) -> Option<Self> {
        if slots.is_empty() {
            return None;
        }
        Some(Self { slots })
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            let provider_name = slot.provider.name();

            for attempt in 0..=slot.max_retries {
                match slot.provider.send(req).await {
                    Ok(resp) => {
                        if attempt > 0 {
                            info!(provider = %provider_name, attempt, "request succeeded after retry");
                        }
                        return Ok(resp);
                    }
                    Err(e) => {
                        warn!(provider = %provider_name, attempt, err = %e, "provider send failed");

                        // Rate limits are not retried on the same provider.
                        if matches!(e, ProviderError::RateLimited { .. }) {
                            last_err = Some(e);
                            break;
                        }

                        last_err = Some(e);

                        if attempt < slot.max_retries {
                            tokio::time::sleep(tokio::time::Duration::from_millis(
                                200 * (attempt as u64 + 1),
                            ))
                            .await;
                        }
                    }
                }
            }

            info!(provider = %provider_name, "provider exhausted, trying next provider");
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Unavailable("all providers failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ContentBlock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AlwaysFail {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
    }

    struct RateLimited;

    #[async_trait]
    impl LlmProvider for RateLimited {
        fn name(&self) -> &str {
            "rate-limited"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::RateLimited {
                retry_after_ms: 1000,
            })
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: "always-ok".to_string(),
                tokens_in: 1,
                tokens_out: 1,
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest {
            system: "You are a test.".to_string(),
            content: vec![ContentBlock::text("hello")],
            max_tokens: 64,
        }
    }

    #[test]
    fn empty_router_is_rejected() {
        assert!(ProviderRouter::new(Vec::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn router_falls_back_to_second_provider() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { calls: calls.clone() }), 1),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ])
        .unwrap();

        let result = router.send(&dummy_request()).await.unwrap();
        assert_eq!(result.content, "ok");
        // One attempt plus one retry on the failing slot.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_skips_straight_to_next_slot() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(RateLimited), 5),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ])
        .unwrap();
        assert!(router.send(&dummy_request()).await.is_ok());
    }

    #[tokio::test]
    async fn router_errors_when_all_fail() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { calls: calls.clone() }), 0),
            ProviderSlot::new(Box::new(AlwaysFail { calls }), 0),
        ])
        .unwrap();

        assert!(router.send(&dummy_request()).await.is_err());
    }
}
