use crate::config::RateLimitPolicy;
use crate::error::{ServiceError, ServiceResult};
use crate::services::transient::TransientStore;
use crate::utils::sha256_hex;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Fixed-window request counter per client address and scope.
///
/// Over-limit callers get a terminal refusal; nothing is queued or retried.
pub struct RateLimiter {
    store: Arc<dyn TransientStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn TransientStore>) -> Self {
        Self { store }
    }

    fn key(scope: &str, client: &str) -> String {
        format!("{}_rate_limit_{}", scope, &sha256_hex(client)[..32])
    }

    pub async fn check(&self, scope: &str, client: &str, policy: &RateLimitPolicy) -> ServiceResult<()> {
        let key = Self::key(scope, client);
        let window = Duration::from_secs(policy.window_seconds.max(1));
        let count = self.store.increment(&key, window).await?;

        if count > policy.max_requests {
            warn!(scope = %scope, client = %client, count, "rate limit exceeded");
            return Err(ServiceError::RateLimited);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transient::MemoryTransients;

    #[tokio::test]
    async fn test_limit_per_client_and_scope() {
        let limiter = RateLimiter::new(Arc::new(MemoryTransients::new()));
        let policy = RateLimitPolicy {
            max_requests: 2,
            window_seconds: 60,
        };

        assert!(limiter.check("invoice", "10.0.0.1", &policy).await.is_ok());
        assert!(limiter.check("invoice", "10.0.0.1", &policy).await.is_ok());
        assert!(matches!(
            limiter.check("invoice", "10.0.0.1", &policy).await,
            Err(ServiceError::RateLimited)
        ));

        assert!(limiter.check("invoice", "10.0.0.2", &policy).await.is_ok());
        assert!(limiter.check("warranty", "10.0.0.1", &policy).await.is_ok());
    }
}
