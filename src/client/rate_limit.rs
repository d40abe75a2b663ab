//! Reactive rate limiting for the Zoho APIs
//!
//! Requests go out unthrottled until the service answers HTTP 429 for a
//! category. From then on that category is paced by a `governor` quota for
//! the lifetime of the client.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, warn};

/// Groups of endpoints that share a pace once throttled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// `POST {oauth_base}/token`
    Token,
    /// `GET {sheets_base}/workbooks`
    Workbooks,
    /// `POST {sheets_base}/{workbook_id}`
    Records,
}

impl EndpointCategory {
    pub const ALL: [EndpointCategory; 3] = [
        EndpointCategory::Token,
        EndpointCategory::Workbooks,
        EndpointCategory::Records,
    ];

    /// Requests per minute allowed after throttling kicks in
    pub fn per_minute(&self) -> u32 {
        match self {
            EndpointCategory::Token => 10,
            EndpointCategory::Workbooks => 30,
            EndpointCategory::Records => 300,
        }
    }

    fn index(&self) -> usize {
        match self {
            EndpointCategory::Token => 0,
            EndpointCategory::Workbooks => 1,
            EndpointCategory::Records => 2,
        }
    }
}

/// Limiter for one category, dormant until activated
struct ReactiveLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    active: AtomicBool,
}

impl ReactiveLimiter {
    fn new(category: EndpointCategory) -> Self {
        let per_minute = NonZeroU32::new(category.per_minute()).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            active: AtomicBool::new(false),
        }
    }
}

/// One reactive limiter per endpoint category
pub struct RateLimiterSet {
    limiters: [ReactiveLimiter; 3],
}

impl Default for RateLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterSet {
    pub fn new() -> Self {
        Self {
            limiters: EndpointCategory::ALL.map(ReactiveLimiter::new),
        }
    }

    fn get(&self, category: EndpointCategory) -> &ReactiveLimiter {
        &self.limiters[category.index()]
    }

    pub fn is_active(&self, category: EndpointCategory) -> bool {
        self.get(category).active.load(Ordering::SeqCst)
    }

    /// Start pacing a category (called on HTTP 429)
    pub fn activate(&self, category: EndpointCategory) {
        if !self.get(category).active.swap(true, Ordering::SeqCst) {
            warn!(
                "Zoho API throttled {:?} requests, limiting to {}/min",
                category,
                category.per_minute()
            );
        }
    }

    /// Wait for a permit if the category is being paced
    pub async fn wait_for(&self, category: EndpointCategory) {
        let limiter = self.get(category);
        if limiter.active.load(Ordering::SeqCst) {
            debug!("Waiting for rate limiter {:?}", category);
            limiter.limiter.until_ready().await;
        }
    }
}
