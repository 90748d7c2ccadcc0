//! Read-only pass-through to the upstream time-series endpoint.
//!
//! Lets browsers read the feed without talking to the upstream host. The body
//! is relayed untouched; only the local request budget is enforced here.

use crate::domain::{FeedError, Timeframe};
use crate::infrastructure::{HttpFeedClient, RateLimiter};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("upstream request budget exhausted")]
    Throttled,
    #[error(transparent)]
    Upstream(#[from] FeedError),
}

#[derive(Clone)]
pub struct ProxyService {
    client: Arc<HttpFeedClient>,
    rate_limiter: Arc<RateLimiter>,
}

impl ProxyService {
    pub fn new(client: Arc<HttpFeedClient>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Forward one time-series request and return the upstream JSON body.
    pub async fn relay(&self, timeframe: &Timeframe) -> Result<Value, ProxyError> {
        if !self.rate_limiter.check_and_record().await {
            warn!(days = %timeframe, "Proxy request refused, upstream budget exhausted");
            return Err(ProxyError::Throttled);
        }

        let body = self.client.fetch_raw(timeframe).await?;
        info!(days = %timeframe, "Relayed upstream market data");
        Ok(body)
    }
}
