//! Price, chart and metric models shared by the pipeline and the HTTP layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One normalized sample of the feed.
///
/// Produced only by the feed client; never mutated afterwards. Series keep
/// upstream order (ascending by date) and duplicate dates are not merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricePoint {
    /// UTC calendar day of the sample (`YYYY-MM-DD`)
    #[schema(value_type = String, example = "2024-01-31")]
    pub date: NaiveDate,
    /// Quote price, never negative
    pub price: f64,
    /// Traded volume, never negative (0 when the feed has none)
    pub volume: f64,
}

/// A point of the chart-ready series.
///
/// Real entries carry the source sample; each is followed by a gap entry with
/// the same index, date and price but zero volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    #[schema(value_type = String, example = "2024-01-31")]
    pub date: NaiveDate,
    pub price: f64,
    pub volume: f64,
    /// Position of the source sample in the normalized series
    pub index: usize,
    pub is_gap: bool,
}

/// Headline numbers for the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub current_price: f64,
    pub absolute_change: f64,
    /// Percent change; 0 whenever the reference price is 0
    pub percent_change: f64,
}

/// Change of a hovered sample against its reference sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointChange {
    pub price: f64,
    pub absolute_change: f64,
    pub percent_change: f64,
}
