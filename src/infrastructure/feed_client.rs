//! HTTP client for the upstream market-data feed.
//!
//! Performs one read per call and translates the raw body into a normalized
//! price series. It never retries; the poll scheduler owns the retry cadence.

use crate::domain::{
    CurrentPriceResponse, FeedError, FeedSource, MarketChartResponse, PricePoint, RawFeedResponse,
    Timeframe,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base URL for the CoinGecko v3 API
const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Current-price snapshot endpoint
const SNAPSHOT_URL: &str = "https://api.coindesk.com/v1/bpi/currentprice.json";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which upstream shape the client requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// `[timestamp, price]` / `[timestamp, volume]` series for a day window
    #[default]
    MarketChart,
    /// Single current rate; the timeframe is ignored
    Snapshot,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::MarketChart => "market_chart",
            FeedMode::Snapshot => "snapshot",
        }
    }
}

/// Market-data feed client
#[derive(Clone)]
pub struct HttpFeedClient {
    client: Client,
    base_url: String,
    snapshot_url: String,
    asset: String,
    vs_currency: String,
    mode: FeedMode,
}

impl HttpFeedClient {
    /// Create a client against the public endpoints
    pub fn new(asset: &str, vs_currency: &str) -> anyhow::Result<Self> {
        Self::with_base_url(BASE_URL, asset, vs_currency)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(base_url: &str, asset: &str, vs_currency: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("PricePulseGateway/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            snapshot_url: SNAPSHOT_URL.to_string(),
            asset: asset.to_lowercase(),
            vs_currency: vs_currency.to_lowercase(),
            mode: FeedMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: FeedMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_snapshot_url(mut self, url: &str) -> Self {
        self.snapshot_url = url.to_string();
        self
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// GET {base}/coins/{asset}/market_chart?vs_currency=usd&days=30
    pub fn market_chart_url(&self, timeframe: &Timeframe) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}",
            self.base_url,
            self.asset,
            self.vs_currency,
            timeframe.as_query_value()
        )
    }

    /// Internal method to make a single GET and parse the JSON body
    async fn get(&self, url: &str) -> Result<Value, FeedError> {
        debug!("Fetching from feed: {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FeedError::Network(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(FeedError::Network(format!(
                "upstream responded with status {}: {}",
                status, error_body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Network(format!("failed to read body from {}: {}", url, e)))?;

        serde_json::from_str(&body)
            .map_err(|e| FeedError::Schema(format!("body from {} is not JSON: {}", url, e)))
    }

    /// Fetch the upstream time-series body untouched (proxy pass-through)
    pub async fn fetch_raw(&self, timeframe: &Timeframe) -> Result<Value, FeedError> {
        let url = self.market_chart_url(timeframe);
        info!("Relaying market chart: days={}", timeframe);
        self.get(&url).await
    }

    /// Translate a raw upstream body into a normalized series.
    ///
    /// A time series yields one point per price sample; a snapshot yields a
    /// length-1 series.
    pub fn normalize(raw: RawFeedResponse, vs_currency: &str) -> Result<Vec<PricePoint>, FeedError> {
        match raw {
            RawFeedResponse::TimeSeries(chart) => Self::normalize_time_series(chart),
            RawFeedResponse::Snapshot(snapshot) => Self::normalize_snapshot(snapshot, vs_currency),
        }
    }

    fn normalize_time_series(chart: MarketChartResponse) -> Result<Vec<PricePoint>, FeedError> {
        if chart.prices.is_empty() {
            return Err(FeedError::Schema("time series has no price samples".to_string()));
        }

        // Exact timestamp match; first volume sample per timestamp wins
        let mut volumes: HashMap<u64, f64> = HashMap::with_capacity(chart.total_volumes.len());
        for [ts, volume] in &chart.total_volumes {
            volumes.entry(ts.to_bits()).or_insert(*volume);
        }

        chart
            .prices
            .iter()
            .map(|[ts, price]| {
                let date = day_of_millis(*ts)?;
                let volume = volumes.get(&ts.to_bits()).copied().unwrap_or(0.0);
                Ok(PricePoint {
                    date,
                    price: non_negative("price", *price)?,
                    volume: non_negative("volume", volume)?,
                })
            })
            .collect()
    }

    fn normalize_snapshot(
        snapshot: CurrentPriceResponse,
        vs_currency: &str,
    ) -> Result<Vec<PricePoint>, FeedError> {
        let code = vs_currency.to_uppercase();
        let rate = snapshot.bpi.get(&code).ok_or_else(|| {
            FeedError::Schema(format!("snapshot has no rate for currency {}", code))
        })?;
        let updated = DateTime::parse_from_rfc3339(&snapshot.time.updated_iso).map_err(|e| {
            FeedError::Schema(format!(
                "invalid snapshot timestamp '{}': {}",
                snapshot.time.updated_iso, e
            ))
        })?;

        Ok(vec![PricePoint {
            date: updated.with_timezone(&Utc).date_naive(),
            price: non_negative("price", rate.rate_float)?,
            volume: 0.0,
        }])
    }

    async fn fetch_series(&self, timeframe: &Timeframe) -> Result<Vec<PricePoint>, FeedError> {
        let url = match self.mode {
            FeedMode::MarketChart => self.market_chart_url(timeframe),
            FeedMode::Snapshot => self.snapshot_url.clone(),
        };
        let body = self.get(&url).await?;
        let raw: RawFeedResponse = serde_json::from_value(body).map_err(|_| {
            FeedError::Schema(format!("response from {} matches no known feed shape", url))
        })?;
        Self::normalize(raw, &self.vs_currency)
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch(&self, timeframe: &Timeframe) -> Result<Vec<PricePoint>, FeedError> {
        let result = self.fetch_series(timeframe).await;
        let outcome = match &result {
            Ok(points) => {
                debug!(points = points.len(), days = %timeframe, "Feed fetch succeeded");
                "ok"
            }
            Err(e) => {
                warn!(kind = e.kind(), days = %timeframe, "Feed fetch failed: {}", e);
                e.kind()
            }
        };
        metrics::counter!("feed_requests_total", "mode" => self.mode.as_str(), "outcome" => outcome)
            .increment(1);
        result
    }
}

fn day_of_millis(ts: f64) -> Result<NaiveDate, FeedError> {
    if !ts.is_finite() {
        return Err(FeedError::Schema(format!("invalid timestamp {}", ts)));
    }
    DateTime::from_timestamp_millis(ts as i64)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| FeedError::Schema(format!("timestamp {} out of range", ts)))
}

fn non_negative(field: &str, value: f64) -> Result<f64, FeedError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FeedError::Schema(format!("{} must be a non-negative number, got {}", field, value)))
    }
}
