//! Repeating-fetch lifecycle for the live price feed.
//!
//! The scheduler owns the current normalized series and the
//! `Idle → Loading → {Ready, Failed}` state machine. Every fetch, whether it
//! comes from the timer, a manual refetch or a timeframe change, runs through
//! the same token-guarded path:
//!
//! 1. `begin_fetch` issues a new token and enters `Loading`
//! 2. the feed is read with the ticket's timeframe
//! 3. `complete_fetch` applies the result only if the ticket still holds the
//!    latest token; anything older is dropped
//!
//! State lives in a `tokio::sync::watch` channel: the whole value is replaced
//! under the channel lock, readers get consistent snapshots and can subscribe
//! to changes.

use crate::application::metrics_deriver::derive_metrics;
use crate::application::series_transformer::to_chart_series;
use crate::application::tooltip::tooltip_metrics;
use crate::domain::{
    ChartPoint, DerivedMetrics, FeedError, FeedSource, PointChange, PricePoint, ReferencePolicy,
    Timeframe,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

/// Default timer period between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Lifecycle phase of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// No fetch issued yet
    Idle,
    Loading,
    Ready,
    /// Last accepted fetch failed; the previous series is kept
    Failed,
}

/// What happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// Series replaced, error cleared
    Applied,
    /// Error recorded, series retained
    Failed,
    /// A newer fetch was issued meanwhile; result dropped
    Discarded,
}

/// Scheduler state, replaced as a whole on every transition.
#[derive(Debug, Clone)]
pub struct PollState {
    pub phase: PollPhase,
    /// Last-known-good series; empty until the first successful fetch
    pub series: Arc<[PricePoint]>,
    pub error: Option<FeedError>,
    /// Active timeframe; the next fetch uses it
    pub timeframe: Timeframe,
    /// Timeframe the held series was fetched for
    pub series_timeframe: Option<Timeframe>,
    /// Latest issued request token
    pub token: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PollState {
    fn new(timeframe: Timeframe) -> Self {
        Self {
            phase: PollPhase::Idle,
            series: Arc::from(Vec::new()),
            error: None,
            timeframe,
            series_timeframe: None,
            token: 0,
            updated_at: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == PollPhase::Loading
    }
}

/// Identity of one in-flight fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub token: u64,
    pub timeframe: Timeframe,
}

/// Error as exposed to the presentation layer
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollError {
    /// `network` or `schema`
    pub kind: String,
    pub message: String,
}

impl From<&FeedError> for PollError {
    fn from(e: &FeedError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

/// Everything a renderer needs, derived from one consistent state value.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PulseSnapshot {
    pub series: Vec<PricePoint>,
    pub chart_series: Vec<ChartPoint>,
    pub metrics: DerivedMetrics,
    pub is_loading: bool,
    pub error: Option<PollError>,
    pub phase: PollPhase,
    #[schema(value_type = String, example = "30")]
    pub timeframe: Timeframe,
    /// Window of `series`; differs from `timeframe` while a switch is pending or failed
    #[schema(value_type = Option<String>, example = "30")]
    pub series_timeframe: Option<Timeframe>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PulseSnapshot {
    pub fn from_state(state: &PollState, policy: ReferencePolicy) -> Self {
        Self {
            series: state.series.to_vec(),
            chart_series: to_chart_series(&state.series),
            metrics: derive_metrics(&state.series, policy),
            is_loading: state.is_loading(),
            error: state.error.as_ref().map(PollError::from),
            phase: state.phase,
            timeframe: state.timeframe,
            series_timeframe: state.series_timeframe,
            updated_at: state.updated_at,
        }
    }
}

/// Drives the feed on a timer and on demand
pub struct PollScheduler {
    feed: Arc<dyn FeedSource>,
    policy: ReferencePolicy,
    state: watch::Sender<PollState>,
}

impl PollScheduler {
    pub fn new(feed: Arc<dyn FeedSource>, timeframe: Timeframe, policy: ReferencePolicy) -> Self {
        let (state, _) = watch::channel(PollState::new(timeframe));
        Self {
            feed,
            policy,
            state,
        }
    }

    pub fn policy(&self) -> ReferencePolicy {
        self.policy
    }

    /// Copy of the current state
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Presentation view of the current state
    pub fn snapshot(&self) -> PulseSnapshot {
        PulseSnapshot::from_state(&self.state.borrow(), self.policy)
    }

    /// Tooltip change for a hovered chart index, under the scheduler's policy
    pub fn tooltip(&self, index: usize) -> Option<PointChange> {
        let series = self.state.borrow().series.clone();
        tooltip_metrics(&to_chart_series(&series), index, self.policy)
    }

    /// Issue a new token and enter `Loading`.
    ///
    /// A timeframe switch happens under the same lock as the token bump, so
    /// any fetch issued for the old timeframe is invalidated at once.
    pub fn begin_fetch(&self, timeframe: Option<Timeframe>) -> FetchTicket {
        let mut token = 0;
        let mut active = Timeframe::default();
        self.state.send_modify(|state| {
            if let Some(tf) = timeframe {
                state.timeframe = tf;
            }
            state.token += 1;
            state.phase = PollPhase::Loading;
            token = state.token;
            active = state.timeframe;
        });
        debug!(token, timeframe = %active, "Fetch issued");
        FetchTicket {
            token,
            timeframe: active,
        }
    }

    /// Apply a fetch result if its ticket is still current.
    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<PricePoint>, FeedError>,
    ) -> PollOutcome {
        let mut outcome = PollOutcome::Discarded;
        self.state.send_if_modified(|state| {
            if state.token != ticket.token {
                return false;
            }
            match result {
                Ok(points) => {
                    state.series = Arc::from(points);
                    state.series_timeframe = Some(ticket.timeframe);
                    state.error = None;
                    state.phase = PollPhase::Ready;
                    state.updated_at = Some(Utc::now());
                    outcome = PollOutcome::Applied;
                }
                Err(e) => {
                    state.error = Some(e);
                    state.phase = PollPhase::Failed;
                    outcome = PollOutcome::Failed;
                }
            }
            true
        });

        match outcome {
            PollOutcome::Applied => {
                info!(token = ticket.token, timeframe = %ticket.timeframe, "Feed update applied")
            }
            PollOutcome::Failed => {
                warn!(token = ticket.token, timeframe = %ticket.timeframe, "Feed update failed, keeping last-known-good series")
            }
            PollOutcome::Discarded => {
                debug!(token = ticket.token, timeframe = %ticket.timeframe, "Stale feed response discarded")
            }
        }
        let label = match outcome {
            PollOutcome::Applied => "applied",
            PollOutcome::Failed => "failed",
            PollOutcome::Discarded => "discarded",
        };
        metrics::counter!("poll_results_total", "outcome" => label).increment(1);

        outcome
    }

    async fn poll(&self, timeframe: Option<Timeframe>) -> PollOutcome {
        let ticket = self.begin_fetch(timeframe);
        let result = self.feed.fetch(&ticket.timeframe).await;
        self.complete_fetch(ticket, result)
    }

    /// Fetch now for the active timeframe
    pub async fn refetch(&self) -> PollOutcome {
        self.poll(None).await
    }

    /// Switch timeframe and fetch for it; in-flight fetches become stale
    pub async fn set_timeframe(&self, timeframe: Timeframe) -> PollOutcome {
        info!(timeframe = %timeframe, "Timeframe changed");
        self.poll(Some(timeframe)).await
    }

    /// Start the polling timer. The first tick fires immediately.
    ///
    /// The timer runs until the returned handle is dropped or shut down.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> PollHandle {
        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(every_secs = period.as_secs(), "Feed poller started");

            loop {
                ticker.tick().await;
                scheduler.refetch().await;
            }
        });

        PollHandle { task: Some(task) }
    }
}

/// Owns the polling timer; the timer stops when this is dropped
pub struct PollHandle {
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the timer. Fetches already in flight may still complete.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Feed poller stopped");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
