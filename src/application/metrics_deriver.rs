//! Headline metrics derived from a normalized series snapshot.

use crate::domain::{DerivedMetrics, PricePoint, ReferencePolicy};

/// Percent change guarded against undefined division.
///
/// Returns 0 when the reference is 0 or the result is not finite, so no
/// `NaN`/`Infinity` ever reaches a consumer.
pub fn percent_change(absolute_change: f64, reference_price: f64) -> f64 {
    if reference_price == 0.0 {
        return 0.0;
    }
    let pct = absolute_change / reference_price * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Position of the reference sample for the sample at `position`.
///
/// `None` when the sample has no earlier sample to compare with.
pub fn reference_position(position: usize, policy: ReferencePolicy) -> Option<usize> {
    if position == 0 {
        return None;
    }
    match policy {
        ReferencePolicy::PreviousSample => Some(position - 1),
        ReferencePolicy::FirstInWindow => Some(0),
    }
}

/// Compute current price and change metrics for the latest sample.
///
/// Empty series yield all zeros; a single sample yields its price with zero
/// change.
pub fn derive_metrics(series: &[PricePoint], policy: ReferencePolicy) -> DerivedMetrics {
    let Some(last) = series.last() else {
        return DerivedMetrics::default();
    };
    let current_price = last.price;

    let Some(reference) = reference_position(series.len() - 1, policy).map(|i| &series[i]) else {
        return DerivedMetrics {
            current_price,
            ..DerivedMetrics::default()
        };
    };

    let absolute_change = current_price - reference.price;
    DerivedMetrics {
        current_price,
        absolute_change,
        percent_change: percent_change(absolute_change, reference.price),
    }
}
