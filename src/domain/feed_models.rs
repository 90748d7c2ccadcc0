//! Wire models for the upstream price feed.
//!
//! Two incompatible shapes are accepted. They are modeled as one untagged
//! union so the feed client can normalize them with an exhaustive match;
//! none of these types leave the infrastructure layer.

use serde::Deserialize;
use std::collections::HashMap;

/// Raw upstream body, either a time series or a current-rate snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFeedResponse {
    TimeSeries(MarketChartResponse),
    Snapshot(CurrentPriceResponse),
}

/// Time-series shape from `/coins/{asset}/market_chart`.
///
/// Each entry is `[timestamp_millis, value]`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChartResponse {
    pub prices: Vec<[f64; 2]>,
    pub total_volumes: Vec<[f64; 2]>,
    #[serde(default)]
    pub market_caps: Vec<[f64; 2]>,
}

/// Current-rate snapshot shape (`/bpi/currentprice.json` style).
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPriceResponse {
    pub time: SnapshotTime,
    /// Rates keyed by upper-case currency code
    pub bpi: HashMap<String, SnapshotRate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotTime {
    /// RFC 3339 update timestamp
    #[serde(rename = "updatedISO")]
    pub updated_iso: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRate {
    pub rate_float: f64,
}
