//! Sliding-window rate governor.
//!
//! A [`RateGovernor`] keeps the grant instants of the last window and admits
//! a caller only while fewer than `calls` grants fall inside the trailing
//! `period`. Callers over budget sleep until the oldest grant leaves the
//! window, up to the governor's `max_wait`; a wait that would exceed it is
//! refused with [`RateLimitExceeded`] instead of queueing forever.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::provider_policy::ProviderPolicy;
use crate::{SourceId, ValidationError};

/// Identity a governor is accounted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GovernorScope {
    Source(SourceId),
    /// Wraps a whole batch operation across all sources.
    Aggregate,
}

impl Display for GovernorScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(source) => write!(f, "source:{source}"),
            Self::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// `calls` operations per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    calls: u32,
    period: Duration,
}

impl RateLimit {
    pub fn new(calls: u32, period: Duration) -> Result<Self, ValidationError> {
        if calls == 0 {
            return Err(ValidationError::ZeroRateLimitCalls);
        }
        if period.is_zero() {
            return Err(ValidationError::ZeroRateLimitPeriod);
        }
        Ok(Self { calls, period })
    }

    pub const fn calls(self) -> u32 {
        self.calls
    }

    pub const fn period(self) -> Duration {
        self.period
    }
}

/// Returned when the wait for capacity would exceed the governor's cap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{scope} exceeded {calls} calls per {period:?}; next slot in {retry_after:?}")]
pub struct RateLimitExceeded {
    pub scope: GovernorScope,
    pub calls: u32,
    pub period: Duration,
    pub retry_after: Duration,
}

/// Proof of an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    pub granted_at: Instant,
    pub waited: Duration,
}

/// Shared, clonable sliding-window limiter for one scope.
#[derive(Debug, Clone)]
pub struct RateGovernor {
    scope: GovernorScope,
    limit: RateLimit,
    max_wait: Duration,
    grants: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateGovernor {
    pub fn new(scope: GovernorScope, limit: RateLimit, max_wait: Duration) -> Self {
        Self {
            scope,
            limit,
            max_wait,
            grants: Arc::new(Mutex::new(VecDeque::with_capacity(limit.calls as usize))),
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Result<Self, ValidationError> {
        let limit = RateLimit::new(policy.quota_limit, policy.quota_window)?;
        Ok(Self::new(
            GovernorScope::Source(policy.source),
            limit,
            policy.max_wait,
        ))
    }

    pub const fn scope(&self) -> GovernorScope {
        self.scope
    }

    pub const fn limit(&self) -> RateLimit {
        self.limit
    }

    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Waits for window capacity and records a grant.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] without recording a grant when capacity
    /// would not free up within `max_wait` of the call.
    pub async fn acquire(&self) -> Result<Permit, RateLimitExceeded> {
        let started = Instant::now();
        let deadline = started + self.max_wait;

        loop {
            let next_slot = match self.try_grant(Instant::now()) {
                Ok(granted_at) => {
                    return Ok(Permit {
                        granted_at,
                        waited: granted_at.saturating_duration_since(started),
                    });
                }
                Err(next_slot) => next_slot,
            };

            if next_slot > deadline {
                return Err(RateLimitExceeded {
                    scope: self.scope,
                    calls: self.limit.calls,
                    period: self.limit.period,
                    retry_after: next_slot.saturating_duration_since(Instant::now()),
                });
            }

            let wait = next_slot.saturating_duration_since(Instant::now());
            debug!(
                scope = %self.scope,
                wait_ms = wait.as_millis() as u64,
                "rate governor waiting for capacity"
            );
            tokio::time::sleep_until(next_slot).await;
        }
    }

    /// Number of grants inside the trailing window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut grants, now);
        grants.len()
    }

    fn try_grant(&self, now: Instant) -> Result<Instant, Instant> {
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut grants, now);

        if grants.len() < self.limit.calls as usize {
            grants.push_back(now);
            return Ok(now);
        }

        // Full window: the oldest grant leaves it one period after it was made.
        let oldest = grants.front().copied().unwrap_or(now);
        Err(oldest + self.limit.period)
    }

    fn prune(&self, grants: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = grants.front() {
            if now.saturating_duration_since(*oldest) >= self.limit.period {
                grants.pop_front();
            } else {
                break;
            }
        }
    }
}
