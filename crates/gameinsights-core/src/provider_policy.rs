use std::time::Duration;

use crate::retry::RetryConfig;
use crate::SourceId;

/// Default quota shared by every provider: 60 calls per 60 seconds.
pub const DEFAULT_QUOTA_LIMIT: u32 = 60;
pub const DEFAULT_QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Quota, timeout and retry policy for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub source: SourceId,
    pub quota_limit: u32,
    pub quota_window: Duration,
    /// Longest a caller may block waiting for quota before `rate_limited`.
    pub max_wait: Duration,
    /// Bound on one adapter call, transport retries included.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl ProviderPolicy {
    pub fn default_for(source: SourceId) -> Self {
        Self {
            source,
            quota_limit: DEFAULT_QUOTA_LIMIT,
            quota_window: DEFAULT_QUOTA_WINDOW,
            max_wait: DEFAULT_QUOTA_WINDOW,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_quota(mut self, quota_limit: u32, quota_window: Duration) -> Self {
        self.quota_limit = quota_limit;
        self.quota_window = quota_window;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_defaults_to_sixty_calls_per_minute() {
        for source in SourceId::ALL {
            let policy = ProviderPolicy::default_for(source);

            assert_eq!(policy.source, source);
            assert_eq!(policy.quota_limit, 60);
            assert_eq!(policy.quota_window, Duration::from_secs(60));
            assert_eq!(policy.retry.max_retries, 3);
        }
    }

    #[test]
    fn builders_override_defaults() {
        let policy = ProviderPolicy::default_for(SourceId::SteamSpy)
            .with_quota(5, Duration::from_secs(1))
            .with_max_wait(Duration::from_millis(250))
            .with_request_timeout(Duration::from_secs(2));

        assert_eq!(policy.quota_limit, 5);
        assert_eq!(policy.quota_window, Duration::from_secs(1));
        assert_eq!(policy.max_wait, Duration::from_millis(250));
        assert_eq!(policy.request_timeout, Duration::from_secs(2));
    }
}
