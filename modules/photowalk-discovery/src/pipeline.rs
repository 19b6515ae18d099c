//! Discovery pipeline: one worker task per session.
//!
//! Position reports go into a bounded queue and are processed strictly one at
//! a time by the worker, which is the only owner of the session state. Each
//! report runs gate → search → rank → select → accumulate → publish. Snapshots
//! fan out over a broadcast channel; a subscriber that falls behind skips the
//! snapshots it missed instead of slowing the worker down.
//!
//! The worker stops on `close` (after draining queued reports) or on
//! `shutdown` (immediately, dropping any search in flight).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use photowalk_common::{Config, PhotoCandidate, PhotoReference, Position, Snapshot};

use crate::accumulator::Accumulator;
use crate::gate::{self, DEFAULT_THRESHOLD_M};
use crate::ranker;
use crate::selector;
use crate::traits::PhotoSearcher;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, TypedBuilder)]
pub struct PipelineConfig {
    /// Minimum movement in metres since the last accepted trigger.
    #[builder(default = DEFAULT_THRESHOLD_M)]
    pub threshold_m: f64,
    /// Upper bound on a single search; a timeout counts as a failed search.
    #[builder(default = Duration::from_secs(15))]
    pub search_timeout: Duration,
    /// Pending position reports. When full, new reports are dropped.
    #[builder(default = 8)]
    pub queue_capacity: usize,
    /// Snapshots buffered per subscriber before it starts missing some.
    #[builder(default = 16)]
    pub snapshot_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self::builder()
            .threshold_m(config.threshold_m)
            .search_timeout(config.search_timeout)
            .queue_capacity(config.queue_capacity)
            .snapshot_buffer(config.snapshot_buffer)
            .build()
    }
}

// ---------------------------------------------------------------------------
// Session state and stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No position has triggered a search yet.
    Idle,
    Active,
}

/// State owned by exactly one pipeline for the lifetime of a session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Position of the last gate-open trigger, whatever the search returned.
    pub last_trigger: Option<Position>,
    pub accumulated: Accumulator,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        if self.last_trigger.is_some() {
            Phase::Active
        } else {
            Phase::Idle
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub reports: u64,
    pub rejected: u64,
    pub gate_closed: u64,
    pub queries: u64,
    pub search_failures: u64,
    pub accepted: u64,
    pub exhausted: u64,
    pub published: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reports={} rejected={} gate_closed={} queries={} search_failures={} accepted={} exhausted={} published={}",
            self.reports,
            self.rejected,
            self.gate_closed,
            self.queries,
            self.search_failures,
            self.accepted,
            self.exhausted,
            self.published,
        )
    }
}

/// What a single position report led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Coordinates were not finite or out of range; nothing happened.
    Rejected,
    /// Too close to the last trigger; no search, no snapshot.
    GateClosed,
    /// A new photo was prepended and a snapshot published.
    Accepted(PhotoReference),
    /// The search succeeded but every candidate was already shown. Snapshot published.
    NothingNew,
    /// The search failed or timed out. Snapshot published.
    SearchFailed,
}

// ---------------------------------------------------------------------------
// DiscoveryPipeline
// ---------------------------------------------------------------------------

pub struct DiscoveryPipeline {
    session_id: Uuid,
    searcher: Arc<dyn PhotoSearcher>,
    config: PipelineConfig,
    state: SessionState,
    stats: SessionStats,
    snapshots: broadcast::Sender<Snapshot>,
    seq: u64,
}

impl DiscoveryPipeline {
    pub fn new(searcher: Arc<dyn PhotoSearcher>, config: PipelineConfig) -> Self {
        let (snapshots, _) = broadcast::channel(config.snapshot_buffer.max(1));
        Self {
            session_id: Uuid::new_v4(),
            searcher,
            config,
            state: SessionState::default(),
            stats: SessionStats::default(),
            snapshots,
            seq: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Receive snapshots published from now on.
    pub fn subscribe(&self) -> SnapshotSubscriber {
        SnapshotSubscriber::new(self.snapshots.subscribe())
    }

    /// Process one position report to completion.
    pub async fn step(&mut self, position: Position) -> StepOutcome {
        self.stats.reports += 1;

        if !position.is_valid() {
            self.stats.rejected += 1;
            warn!(lat = position.lat, lon = position.lon, "Ignoring invalid position");
            return StepOutcome::Rejected;
        }

        if !gate::should_query(
            &position,
            self.state.last_trigger.as_ref(),
            self.config.threshold_m,
        ) {
            self.stats.gate_closed += 1;
            debug!(%position, "Not far enough from last trigger, skipping search");
            return StepOutcome::GateClosed;
        }

        // Recorded before the search: a failed or empty search still counts
        // as a trigger at this position.
        self.state.last_trigger = Some(position);
        self.stats.queries += 1;

        let outcome = match self.search(position).await {
            Some(candidates) => self.accept_nearest_unseen(candidates, &position),
            None => {
                self.stats.search_failures += 1;
                StepOutcome::SearchFailed
            }
        };

        self.publish();
        outcome
    }

    async fn search(&self, position: Position) -> Option<Vec<PhotoCandidate>> {
        match tokio::time::timeout(self.config.search_timeout, self.searcher.search(position)).await
        {
            Ok(Ok(candidates)) => {
                debug!(%position, count = candidates.len(), "Photo search returned");
                Some(candidates)
            }
            Ok(Err(e)) => {
                warn!(%position, error = %e, "Photo search failed");
                None
            }
            Err(_) => {
                warn!(
                    %position,
                    timeout_secs = self.config.search_timeout.as_secs_f64(),
                    "Photo search timed out"
                );
                None
            }
        }
    }

    fn accept_nearest_unseen(
        &mut self,
        candidates: Vec<PhotoCandidate>,
        position: &Position,
    ) -> StepOutcome {
        let returned = candidates.len();
        let ranked = ranker::rank(candidates, position);
        if ranked.len() < returned {
            debug!(dropped = returned - ranked.len(), "Dropped candidates without geo data");
        }

        match selector::select_next(&ranked, self.state.accumulated.seen()) {
            Some(reference) => {
                info!(photo = %reference, %position, "Discovered new photo");
                self.state.accumulated.prepend(reference.clone());
                self.stats.accepted += 1;
                StepOutcome::Accepted(reference)
            }
            None => {
                debug!(%position, candidates = ranked.len(), "No unseen photo near position");
                self.stats.exhausted += 1;
                StepOutcome::NothingNew
            }
        }
    }

    fn publish(&mut self) {
        self.seq += 1;
        let snapshot = Snapshot {
            seq: self.seq,
            published_at: Utc::now(),
            photos: self.state.accumulated.snapshot(),
        };
        self.stats.published += 1;

        // Err only means nobody is listening right now.
        match self.snapshots.send(snapshot) {
            Ok(receivers) => debug!(seq = self.seq, receivers, "Published snapshot"),
            Err(_) => debug!(seq = self.seq, "Published snapshot with no subscribers"),
        }
    }

    /// Move the pipeline onto its own worker task.
    pub fn spawn(self) -> PipelineHandle {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let subscriptions = self.snapshots.subscribe();
        let span = tracing::info_span!("discovery", session_id = %self.session_id);

        let worker = tokio::spawn(self.run(rx, shutdown_rx).instrument(span));

        PipelineHandle {
            reporter: PositionReporter { tx },
            subscriptions,
            shutdown: shutdown_tx,
            worker,
        }
    }

    async fn run(
        mut self,
        mut positions: mpsc::Receiver<Position>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionStats {
        info!(threshold_m = self.config.threshold_m, "Discovery pipeline started");

        loop {
            let position = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = positions.recv() => match next {
                    Some(position) => position,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!(%position, "Shutdown while processing, abandoning step");
                    break;
                }
                _ = self.step(position) => {}
            }
        }

        info!(
            photos = self.state.accumulated.len(),
            "Discovery pipeline stopped. {}", self.stats
        );
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    #[error("position queue is full, report dropped")]
    QueueFull,

    #[error("discovery pipeline has stopped")]
    Closed,
}

/// Cloneable, non-blocking entry point for position reports.
#[derive(Clone)]
pub struct PositionReporter {
    tx: mpsc::Sender<Position>,
}

impl PositionReporter {
    /// Queue a report without waiting. When the queue is full the report is
    /// dropped: the next one supersedes it anyway.
    pub fn report(&self, position: Position) -> Result<(), ReportError> {
        match self.tx.try_send(position) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%position, "Position queue full, dropping report");
                Err(ReportError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ReportError::Closed),
        }
    }

    /// Queue a report, waiting for room. Fails only once the pipeline has
    /// stopped.
    pub async fn send(&self, position: Position) -> Result<(), ReportError> {
        self.tx
            .send(position)
            .await
            .map_err(|_| ReportError::Closed)
    }
}

/// Owner's handle on a running pipeline. Dropping it cancels the worker.
pub struct PipelineHandle {
    reporter: PositionReporter,
    subscriptions: broadcast::Receiver<Snapshot>,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<SessionStats>,
}

impl PipelineHandle {
    pub fn report(&self, position: Position) -> Result<(), ReportError> {
        self.reporter.report(position)
    }

    pub fn reporter(&self) -> PositionReporter {
        self.reporter.clone()
    }

    /// Receive snapshots published from now on. No history is replayed.
    pub fn subscribe(&self) -> SnapshotSubscriber {
        SnapshotSubscriber::new(self.subscriptions.resubscribe())
    }

    /// Stop accepting reports from this handle, let the worker finish what is
    /// queued, and return the session stats. Other reporters keep the queue
    /// open until they are dropped.
    pub async fn close(self) -> SessionStats {
        let Self {
            reporter,
            subscriptions,
            shutdown,
            worker,
        } = self;
        drop(reporter);
        drop(subscriptions);

        let stats = join_worker(worker).await;
        drop(shutdown);
        stats
    }

    /// Stop immediately. Queued reports are discarded and a search in flight
    /// is cancelled.
    pub async fn shutdown(self) -> SessionStats {
        let _ = self.shutdown.send(true);
        join_worker(self.worker).await
    }
}

async fn join_worker(worker: JoinHandle<SessionStats>) -> SessionStats {
    match worker.await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "Discovery worker did not finish cleanly");
            SessionStats::default()
        }
    }
}

// ---------------------------------------------------------------------------
// SnapshotSubscriber
// ---------------------------------------------------------------------------

pub struct SnapshotSubscriber {
    rx: broadcast::Receiver<Snapshot>,
}

impl SnapshotSubscriber {
    fn new(rx: broadcast::Receiver<Snapshot>) -> Self {
        Self { rx }
    }

    /// Next snapshot, or `None` once the pipeline has stopped. Snapshots
    /// missed while lagging are skipped; the next one supersedes them.
    pub async fn next(&mut self) -> Option<Snapshot> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "Subscriber lagged, skipping to latest snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`SnapshotSubscriber::next`]. `None` if no
    /// snapshot is ready or the pipeline has stopped.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
