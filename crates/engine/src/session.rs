use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use common::{
    InstrumentSnapshot, OutcomeRecorder, Position, Result, SessionCommand, SessionState,
    SnapshotBatch, SnapshotSource, SourceMode, TradeOutcome, Universe,
};
use positions::{PnlSummary, PositionManager};
use scanner::{Ranker, SignalDetector};

use crate::clock::SessionClock;
use crate::config::ScanConfig;
use crate::outbox::Outbox;

/// Cloneable handle for stopping the session and reading its state.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    state: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
    pub async fn send(&self, cmd: SessionCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    /// Ask the session to stop. Honoured between ticks.
    pub async fn stop(&self) {
        self.send(SessionCommand::Stop).await;
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MarketClosed,
    MaxTicks,
    Stopped,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::MarketClosed => write!(f, "market closed"),
            StopReason::MaxTicks => write!(f, "max ticks reached"),
            StopReason::Stopped => write!(f, "stop requested"),
        }
    }
}

/// What happened on one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub mode: SourceMode,
    pub instruments: usize,
    pub candidates: usize,
    pub entries: usize,
    pub exits: usize,
    /// Records still waiting for the recorder after this tick's flush.
    pub pending_records: usize,
    pub summary: PnlSummary,
}

/// Final state of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub ticks: u64,
    pub stop_reason: StopReason,
    pub entries: usize,
    pub outcomes: Vec<TradeOutcome>,
    pub open_positions: Vec<Position>,
    pub summary: PnlSummary,
    /// Records the recorder never accepted.
    pub unrecorded: usize,
}

/// Drives the scan → rank → enter → evaluate-exits loop over one trading
/// session. One task owns it, so the position manager is never shared.
pub struct Session {
    universe: Universe,
    detector: SignalDetector,
    ranker: Ranker,
    manager: PositionManager,
    source: Arc<dyn SnapshotSource>,
    recorder: Arc<dyn OutcomeRecorder>,
    clock: Arc<dyn SessionClock>,
    outbox: Outbox,
    interval: Duration,
    max_ticks: Option<u64>,
    ticks: u64,
    entries: usize,
    /// Latest non-empty snapshots, used to mark open positions.
    last_snapshots: Vec<InstrumentSnapshot>,
    state: Arc<RwLock<SessionState>>,
    command_rx: mpsc::Receiver<SessionCommand>,
    #[allow(dead_code)] // kept to prevent channel close
    command_tx: mpsc::Sender<SessionCommand>,
}

impl Session {
    /// Validate the configuration and build the session. An invalid
    /// configuration means the session never starts.
    pub fn new(
        config: &ScanConfig,
        universe: Universe,
        source: Arc<dyn SnapshotSource>,
        recorder: Arc<dyn OutcomeRecorder>,
        clock: Arc<dyn SessionClock>,
    ) -> Result<(Self, SessionHandle)> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(8);
        let state = Arc::new(RwLock::new(SessionState::Idle));
        let handle = SessionHandle {
            command_tx: command_tx.clone(),
            state: state.clone(),
        };

        info!(
            instruments = universe.len(),
            source = %source.mode(),
            interval_secs = config.session.scan_interval_secs,
            max_ticks = ?config.session.max_ticks,
            "Session configured"
        );

        let session = Session {
            universe,
            detector: SignalDetector::new(config.signal.clone()),
            ranker: Ranker::new(config.signal.top_n),
            manager: PositionManager::new(config.positions.clone()),
            source,
            recorder,
            clock,
            outbox: Outbox::new(),
            interval: Duration::from_secs(config.session.scan_interval_secs),
            max_ticks: config.session.max_ticks,
            ticks: 0,
            entries: 0,
            last_snapshots: Vec::new(),
            state,
            command_rx,
            command_tx,
        };
        Ok((session, handle))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn pending_records(&self) -> usize {
        self.outbox.len()
    }

    /// Send queued records to the recorder. On error the unsent records stay
    /// queued; position state is already final either way.
    pub async fn flush(&mut self) -> Result<usize> {
        self.outbox.flush(self.recorder.as_ref()).await
    }

    /// Run one complete tick. A failed fetch is an empty tick: nothing is
    /// entered and every open position is carried forward.
    pub async fn run_tick(&mut self) -> TickReport {
        self.ticks += 1;
        let tick = self.ticks;
        let tick_time = self.clock.now();

        let batch = match self.source.fetch(&self.universe).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(tick, error = %e, "Snapshot fetch failed, no data this tick");
                SnapshotBatch::empty(tick_time, self.source.mode())
            }
        };

        let candidates = self.detector.scan(&batch);
        let ranked = self.ranker.rank(&candidates);
        let entries = self.manager.on_candidates(&ranked, tick_time);
        let exits = self.manager.on_tick(&batch.snapshots, tick_time);

        let report_counts = (batch.mode, batch.len(), candidates.len(), entries.len(), exits.len());
        self.entries += entries.len();
        for entry in entries {
            self.outbox.push(entry);
        }
        for exit in exits {
            self.outbox.push(exit);
        }
        if !batch.is_empty() {
            self.last_snapshots = batch.snapshots;
        }

        if let Err(e) = self.flush().await {
            error!(
                tick,
                pending = self.outbox.len(),
                error = %e,
                "Recorder failed, will retry next tick"
            );
        }

        let (mode, instruments, candidates, entries, exits) = report_counts;
        let summary = self.manager.summary(&self.last_snapshots);
        info!(
            tick,
            mode = %mode,
            instruments,
            candidates,
            shortlisted = ranked.len(),
            entries,
            exits,
            open = summary.open_positions(),
            realized = summary.realized_amount,
            unrealized = summary.unrealized_amount,
            "Tick complete"
        );

        TickReport {
            tick,
            mode,
            instruments,
            candidates,
            entries,
            exits,
            pending_records: self.outbox.len(),
            summary,
        }
    }

    /// Run until the market closes, `max_ticks` is reached or a stop arrives.
    /// Call from `tokio::spawn`.
    pub async fn run(mut self) -> SessionReport {
        info!("Session running");
        *self.state.write().await = SessionState::Running;

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => match cmd {
                    Some(SessionCommand::Stop) => {
                        info!(ticks = self.ticks, "Stop requested");
                        break StopReason::Stopped;
                    }
                    None => {
                        warn!("Session command channel closed");
                        break StopReason::Stopped;
                    }
                },

                _ = interval.tick() => {
                    if !self.clock.is_open(self.clock.now()) {
                        info!(ticks = self.ticks, "Market closed");
                        break StopReason::MarketClosed;
                    }
                    self.run_tick().await;
                    if self.max_ticks.is_some_and(|max| self.ticks >= max) {
                        break StopReason::MaxTicks;
                    }
                }
            }
        };

        self.finish(reason).await
    }

    async fn finish(mut self, reason: StopReason) -> SessionReport {
        if let Err(e) = self.flush().await {
            error!(
                pending = self.outbox.len(),
                error = %e,
                "Final flush failed, records not persisted"
            );
        }

        let summary = self.manager.summary(&self.last_snapshots);
        *self.state.write().await = SessionState::Stopped;
        info!(
            reason = %reason,
            ticks = self.ticks,
            entries = self.entries,
            closed = summary.closed_trades,
            open = summary.open_positions(),
            realized = summary.realized_amount,
            unrealized = summary.unrealized_amount,
            total = summary.total_amount(),
            unrecorded = self.outbox.len(),
            "Session finished"
        );

        SessionReport {
            ticks: self.ticks,
            stop_reason: reason,
            entries: self.entries,
            outcomes: self.manager.history().to_vec(),
            open_positions: self.manager.open_positions().cloned().collect(),
            summary,
            unrecorded: self.outbox.len(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
