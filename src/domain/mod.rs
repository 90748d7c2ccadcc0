//! Domain layer - Core price entities and the feed source trait.
//!
//! This module defines the domain model for the price pulse pipeline,
//! following clean architecture principles. It contains:
//! - The `FeedSource` trait that defines how normalized series are obtained
//! - Price, chart and metric entities shared by every layer
//! - The `Timeframe` selector and `ReferencePolicy` value objects
//! - Wire models for the two upstream response shapes

pub mod feed_models;
pub mod pulse_models;

pub use feed_models::*;
pub use pulse_models::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure of a single feed read.
///
/// Both variants are recoverable: the scheduler records them and keeps polling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Request rejected or transport failure (timeouts and non-2xx included)
    #[error("network error: {0}")]
    Network(String),
    /// A response arrived but matches no recognized shape
    #[error("schema error: {0}")]
    Schema(String),
}

impl FeedError {
    /// Short machine-readable kind used in logs, metrics and JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Network(_) => "network",
            FeedError::Schema(_) => "schema",
        }
    }
}

/// Rejected timeframe input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid timeframe '{0}': expected a positive day count or one of 1d, 3d, 1w, 1m, 6m, 1y, max")]
pub struct TimeframeError(pub String);

/// Requested observation window for the feed.
///
/// Parsed from duration codes (`1d`, `3d`, `1w`, `1m`, `6m`, `1y`, `max`) or an
/// explicit day count (`"30"`). Renders as the upstream `days` parameter.
///
/// # Examples
///
/// ```
/// use pricepulse_gateway::domain::Timeframe;
///
/// assert_eq!("1w".parse::<Timeframe>().unwrap(), Timeframe::Days(7));
/// assert_eq!("max".parse::<Timeframe>().unwrap(), Timeframe::Max);
/// assert_eq!(Timeframe::Days(30).to_string(), "30");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    /// A fixed number of days (always >= 1)
    Days(u32),
    /// The full available history
    Max,
}

impl Timeframe {
    /// Duration codes accepted besides plain day counts.
    pub const CODES: [&'static str; 7] = ["1d", "3d", "1w", "1m", "6m", "1y", "max"];

    /// Value sent upstream as the `days` query parameter.
    pub fn as_query_value(&self) -> String {
        self.to_string()
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Days(30)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Days(days) => write!(f, "{}", days),
            Timeframe::Max => f.write_str("max"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let parsed = match trimmed.as_str() {
            "1d" => Some(Timeframe::Days(1)),
            "3d" => Some(Timeframe::Days(3)),
            "1w" => Some(Timeframe::Days(7)),
            "1m" => Some(Timeframe::Days(30)),
            "6m" => Some(Timeframe::Days(180)),
            "1y" => Some(Timeframe::Days(365)),
            "max" => Some(Timeframe::Max),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|days| *days > 0)
                .map(Timeframe::Days),
        };
        parsed.ok_or_else(|| TimeframeError(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}

/// Which sample a change is measured against.
///
/// The chosen policy applies to the headline metrics and to tooltips alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// Compare against the sample immediately before the one of interest
    #[default]
    PreviousSample,
    /// Compare against the first sample of the current window
    FirstInWindow,
}

/// Source of normalized price series.
///
/// Implementations perform exactly one upstream read per call and never retry;
/// retry cadence belongs to the poll scheduler. Implementations must be
/// thread-safe (`Send + Sync`) for use in async contexts.
///
/// # Implementations
///
/// See `infrastructure::feed_client::HttpFeedClient` for the HTTP implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and normalize the series for a timeframe.
    ///
    /// # Errors
    ///
    /// - `FeedError::Network` if the request fails or the upstream rejects it
    /// - `FeedError::Schema` if the body matches no recognized response shape
    async fn fetch(&self, timeframe: &Timeframe) -> Result<Vec<PricePoint>, FeedError>;
}
