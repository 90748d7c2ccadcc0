pub mod feed_client;
pub mod rate_limiter;

pub use feed_client::{FeedMode, HttpFeedClient};
pub use rate_limiter::{RateLimitStats, RateLimiter};
