//! Chart-ready series with gap entries between bar marks.

use crate::domain::{ChartPoint, PricePoint};

/// Expand a normalized series into a chart series.
///
/// Every sample is emitted as a real entry followed by a gap entry that
/// repeats its index, date and price with zero volume, so a bar renderer
/// draws discrete bars while the price line stays unchanged. Output is
/// exactly twice the input length and keeps input order.
pub fn to_chart_series(series: &[PricePoint]) -> Vec<ChartPoint> {
    series
        .iter()
        .enumerate()
        .flat_map(|(index, point)| {
            let real = ChartPoint {
                date: point.date,
                price: point.price,
                volume: point.volume,
                index,
                is_gap: false,
            };
            let gap = ChartPoint {
                volume: 0.0,
                is_gap: true,
                ..real.clone()
            };
            [real, gap]
        })
        .collect()
}
