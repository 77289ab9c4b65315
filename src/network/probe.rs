//! The Probe - polling loop of quality-probe
//!
//! Runs the async loop (tick rate: 500ms by default):
//! - Poll the subscriber for cumulative counters
//! - Turn counters into deltas and keep a sliding window of them
//! - Classify the window rates and report them live
//! - Settle on a final rating when the test times out or is ended

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::structs::ProbeConfig;
use crate::error::ProbeError;
use crate::network::classifier::{classify, QualityRating};
use crate::network::rates::{aggregate, PerSecondStats};
use crate::network::source::Subscriber;
use crate::network::stats::{CounterDeltaTracker, CumulativeStats};
use crate::network::window::SlidingWindowBuffer;

/// Counter deltas over a sliding window, reduced to per-second rates
pub struct BandwidthCalculator {
    tracker: CounterDeltaTracker,
    buffer: SlidingWindowBuffer,
    window_size_ms: u64,
}

impl BandwidthCalculator {
    pub fn new(window_size_ms: u64) -> Self {
        Self {
            tracker: CounterDeltaTracker::new(),
            buffer: SlidingWindowBuffer::new(),
            window_size_ms,
        }
    }

    /// Feed one poll result.
    /// Returns `None` until the window spans a non-zero amount of time.
    pub fn ingest(&mut self, stats: &CumulativeStats) -> Option<PerSecondStats> {
        let snapshot = self.tracker.compute_delta(stats);
        self.buffer.append(snapshot);
        self.buffer.prune(stats.timestamp, self.window_size_ms);

        let window_seconds = self.buffer.effective_window_seconds();
        if window_seconds > 0.0 {
            Some(aggregate(self.buffer.snapshots(), window_seconds))
        } else {
            debug!("Window has {} sample(s), skipping rates", self.buffer.len());
            None
        }
    }
}

/// Lifecycle of a quality test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Running,
    Finalized,
}

/// Rates and rating for one poll tick
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LiveReport {
    pub stats: PerSecondStats,
    pub rating: QualityRating,
}

/// Outcome of a finished quality test
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub rating: QualityRating,
    /// Last window, with `elapsed_time_ms` set
    pub stats: PerSecondStats,
}

/// Cloneable stop switch for a running test
#[derive(Clone)]
pub struct ProbeHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl ProbeHandle {
    /// Ask the test to finalize. Safe to call any number of times.
    pub fn end(&self) {
        if !self.stop_tx.send_replace(true) {
            debug!("End requested");
        }
    }

    pub fn is_ended(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// Polls a subscriber and settles on a quality rating
pub struct QualityProbe<S: Subscriber> {
    subscriber: S,
    config: ProbeConfig,
    calculator: BandwidthCalculator,
    state: ProbeState,
    stop_tx: Arc<watch::Sender<bool>>,
    outcome: Option<QualityReport>,
}

impl<S: Subscriber> QualityProbe<S> {
    pub fn new(subscriber: S, config: ProbeConfig) -> Result<Self, ProbeError> {
        config.validate()?;
        let (stop_tx, _) = watch::channel(false);

        Ok(Self {
            subscriber,
            calculator: BandwidthCalculator::new(config.window_size_ms),
            config,
            state: ProbeState::Idle,
            stop_tx: Arc::new(stop_tx),
            outcome: None,
        })
    }

    pub fn handle(&self) -> ProbeHandle {
        ProbeHandle {
            stop_tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Stop polling. A later `run` settles immediately.
    pub fn end(&mut self) {
        self.handle().end();
        if self.state == ProbeState::Running {
            self.state = ProbeState::Finalized;
        }
    }

    /// Run the test until the timeout elapses or the test is ended.
    ///
    /// `on_report` is called on every tick that produced a window. Fails
    /// with [`ProbeError::NoStatistics`] if no tick ever did.
    pub async fn run<F>(&mut self, mut on_report: F) -> Result<QualityReport, ProbeError>
    where
        F: FnMut(&LiveReport),
    {
        if self.state != ProbeState::Idle {
            debug!("Probe already {:?}, returning previous outcome", self.state);
            return self.outcome.ok_or(ProbeError::NoStatistics);
        }

        let metadata = self.subscriber.stream();
        let period = Duration::from_millis(self.config.polling_interval_ms);
        let started = Instant::now();

        info!(
            "Quality test starting (poll: {}ms, window: {}ms, timeout: {}ms)",
            self.config.polling_interval_ms, self.config.window_size_ms, self.config.test_timeout_ms
        );
        self.state = ProbeState::Running;

        let deadline = time::sleep(Duration::from_millis(self.config.test_timeout_ms));
        tokio::pin!(deadline);

        // First poll one period after start, next tick only after the previous poll returned
        let mut interval = time::interval_at(started + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stop_rx = self.stop_tx.subscribe();
        let subscriber = &mut self.subscriber;
        let calculator = &mut self.calculator;
        let mut latest: Option<PerSecondStats> = None;
        let mut polling = true;

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("Quality test timed out after {}ms", self.config.test_timeout_ms);
                    break;
                }
                _ = stop_rx.wait_for(|stopped| *stopped) => {
                    info!("Quality test ended by caller");
                    break;
                }
                fetched = async {
                    interval.tick().await;
                    subscriber.get_stats().await
                }, if polling => {
                    match fetched {
                        Ok(Some(stats)) => {
                            if let Some(window) = calculator.ingest(&stats) {
                                let rating = classify(&window, &metadata);
                                debug!(
                                    "Tick: video {:.0}kbps loss {:.3}, audio {:.0}kbps loss {:.3} -> {}",
                                    window.video.kbps(),
                                    window.video.packet_loss_ratio_per_second,
                                    window.audio.kbps(),
                                    window.audio.packet_loss_ratio_per_second,
                                    rating
                                );
                                on_report(&LiveReport { stats: window, rating });
                                latest = Some(window);
                            }
                        }
                        Ok(None) => {
                            info!("Subscriber has no more stats, polling stopped");
                            polling = false;
                        }
                        Err(e) => {
                            warn!("Failed to fetch stats: {:#}. Polling stopped", e);
                            polling = false;
                        }
                    }
                }
            }
        }

        self.finalize(started, latest)
    }

    fn finalize(&mut self, started: Instant, latest: Option<PerSecondStats>) -> Result<QualityReport, ProbeError> {
        self.state = ProbeState::Finalized;
        self.stop_tx.send_replace(true);

        let Some(mut stats) = latest else {
            warn!("Quality test finished without usable statistics");
            return Err(ProbeError::NoStatistics);
        };

        stats.elapsed_time_ms = Some(started.elapsed().as_millis() as u64);
        let rating = classify(&stats, &self.subscriber.stream());
        info!("Quality test finished: {} after {}ms", rating, stats.elapsed_time_ms.unwrap_or(0));

        let report = QualityReport { rating, stats };
        self.outcome = Some(report);
        Ok(report)
    }
}

/// Run a full quality test and return only the final rating
pub async fn perform_quality_test<S: Subscriber>(subscriber: S, config: ProbeConfig) -> Result<QualityRating, ProbeError> {
    let mut probe = QualityProbe::new(subscriber, config)?;
    probe.run(|_| {}).await.map(|report| report.rating)
}
