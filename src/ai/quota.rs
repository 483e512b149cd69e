//! Per-minute request budgets for AI calls.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;

use super::AiError;
use crate::config::QuotaConfig;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Kind of AI request being budgeted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Embeddings,
    Completions,
}

impl RequestKind {
    fn name(&self) -> &'static str {
        match self {
            RequestKind::Embeddings => "embeddings",
            RequestKind::Completions => "completions",
        }
    }
}

/// Tracks per-minute AI request budgets.
///
/// Each request kind has its own budget. When a budget is exhausted the
/// request is denied rather than queued, so callers can fall back or skip.
#[derive(Debug)]
pub struct QuotaTracker {
    embeddings: DirectLimiter,
    completions: DirectLimiter,
}

impl QuotaTracker {
    /// Create a tracker from configured per-minute budgets
    pub fn new(config: &QuotaConfig) -> Self {
        Self {
            embeddings: RateLimiter::direct(Quota::per_minute(
                NonZeroU32::new(config.embeddings_per_minute).unwrap_or(nonzero!(1u32)),
            )),
            completions: RateLimiter::direct(Quota::per_minute(
                NonZeroU32::new(config.completions_per_minute).unwrap_or(nonzero!(1u32)),
            )),
        }
    }

    /// Try to consume one unit of the budget for the given kind
    pub fn try_acquire(&self, kind: RequestKind) -> Result<(), AiError> {
        let limiter = match kind {
            RequestKind::Embeddings => &self.embeddings,
            RequestKind::Completions => &self.completions,
        };

        limiter.check().map_err(|_| {
            tracing::warn!("AI quota exhausted for {}", kind.name());
            AiError::QuotaExceeded(kind.name().to_string())
        })
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(&QuotaConfig::default())
    }
}
