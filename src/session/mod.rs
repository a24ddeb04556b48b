use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::debug;

use crate::simulation::report::TurnReport;
use crate::simulation::scoring::Outcome;
use crate::simulation::snapshot::WorldSnapshot;
use crate::simulation::Engine;

/// Shared handle around one running game. Ticks are serialized behind the
/// engine lock; the published snapshot and report only change once a whole
/// tick has finished.
pub struct GameSession {
    engine: Mutex<Engine>,
    /// State after the most recent completed tick.
    snapshot: RwLock<Arc<WorldSnapshot>>,
    last_report: RwLock<Option<Arc<TurnReport>>>,
    /// Broadcast channel for turn reports.
    report_sender: broadcast::Sender<Arc<TurnReport>>,
}

impl GameSession {
    pub fn new(engine: Engine) -> Self {
        let (tx, _) = broadcast::channel(64);
        let snapshot = Arc::new(engine.snapshot());
        let last_report = engine.last_report().cloned().map(Arc::new);
        GameSession {
            engine: Mutex::new(engine),
            snapshot: RwLock::new(snapshot),
            last_report: RwLock::new(last_report),
            report_sender: tx,
        }
    }

    /// Run one tick and publish its results.
    pub async fn step(&self) -> Arc<TurnReport> {
        let mut engine = self.engine.lock().await;
        let report = Arc::new(engine.run_turn());
        let snapshot = Arc::new(engine.snapshot());

        *self.snapshot.write().await = snapshot;
        *self.last_report.write().await = Some(Arc::clone(&report));
        drop(engine);

        // No receivers is fine
        let receivers = self.report_sender.send(Arc::clone(&report)).unwrap_or(0);
        debug!(turn = report.turn, receivers, "Published turn report");
        report
    }

    pub async fn snapshot(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    pub async fn last_report(&self) -> Option<Arc<TurnReport>> {
        self.last_report.read().await.clone()
    }

    pub async fn scores(&self) -> BTreeMap<String, u64> {
        self.snapshot.read().await.scores.clone()
    }

    pub async fn winner(&self) -> Option<Outcome> {
        self.snapshot.read().await.winner.clone()
    }

    /// Receive every report published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TurnReport>> {
        self.report_sender.subscribe()
    }
}
