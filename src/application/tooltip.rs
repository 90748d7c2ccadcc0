//! Per-hover change metrics over a chart series.

use crate::application::metrics_deriver::{percent_change, reference_position};
use crate::domain::{ChartPoint, PointChange, ReferencePolicy};

/// Change of the hovered sample against its reference sample.
///
/// `index` is the `index` field of a chart point, not its array position.
/// Only real entries are considered; gap entries never act as the hovered
/// value or the reference. Returns `None` for an index with no real entry.
pub fn tooltip_metrics(
    chart: &[ChartPoint],
    index: usize,
    policy: ReferencePolicy,
) -> Option<PointChange> {
    let real_at = |i: usize| chart.iter().find(|p| !p.is_gap && p.index == i);

    let hovered = real_at(index)?;
    let reference_price = reference_position(index, policy)
        .and_then(real_at)
        .map(|p| p.price)
        .unwrap_or(hovered.price);

    let absolute_change = hovered.price - reference_price;
    Some(PointChange {
        price: hovered.price,
        absolute_change,
        percent_change: percent_change(absolute_change, reference_price),
    })
}
