//! Host-side driver: owns one [`GazeSession`] on a task and accepts
//! restart and abort commands while it runs.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{CancelSignal, GazeSession, SessionError, SessionObserver};
use crate::analysis::{analyze, GazeAnalysis};
use crate::overlay::{OverlayPublisher, OverlaySnapshot};
use crate::types::{GazeDataPoint, SessionPhase};

const COMMAND_BUFFER: usize = 16;

/// What a completed session leaves behind for the host.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub completed_at: DateTime<Utc>,
    pub points: Vec<GazeDataPoint>,
    pub analysis: Option<GazeAnalysis>,
    pub analysis_error: Option<String>,
}

#[derive(Clone, Default)]
pub struct ReportStore {
    inner: Arc<RwLock<Option<SessionReport>>>,
}

impl ReportStore {
    pub fn get(&self) -> Option<SessionReport> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, report: SessionReport) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(report);
    }
}

/// Observer that keeps the finished gaze stream and its SPI analysis.
pub struct ReportSink {
    stimulus_secs: f64,
    pending: Mutex<Vec<GazeDataPoint>>,
    store: ReportStore,
}

impl ReportSink {
    pub fn new(stimulus_secs: f64) -> Self {
        Self {
            stimulus_secs,
            pending: Mutex::new(Vec::new()),
            store: ReportStore::default(),
        }
    }

    pub fn store(&self) -> ReportStore {
        self.store.clone()
    }
}

impl SessionObserver for ReportSink {
    fn on_gaze_data(&self, points: &[GazeDataPoint]) {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = points.to_vec();
    }

    fn on_complete(&self) {
        let points = std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()));
        let (analysis, analysis_error) = match analyze(&points, self.stimulus_secs) {
            Ok(a) => {
                tracing::info!(spi = a.spi, risk = ?a.risk_category, "Gaze analysis ready");
                (Some(a), None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gaze analysis unavailable");
                (None, Some(e.to_string()))
            }
        };
        self.store.set(SessionReport {
            completed_at: Utc::now(),
            points,
            analysis,
            analysis_error,
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("session runner has stopped")]
    Closed,
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug)]
enum SessionCommand {
    Restart {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Abort,
}

#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    commands: mpsc::Sender<SessionCommand>,
    overlay: OverlayPublisher,
    reports: ReportStore,
}

impl SessionHandle {
    /// Starts `session` on a new task. The task ends once every handle
    /// is dropped, tearing the session down.
    pub fn spawn(session: GazeSession, reports: ReportStore) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = Self {
            session_id: session.id(),
            commands: tx,
            overlay: session.overlay().clone(),
            reports,
        };
        let task = tokio::spawn(drive_session(session, rx));
        (handle, task)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.overlay.snapshot().phase
    }

    /// Whether the runner task still accepts commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        self.overlay.snapshot()
    }

    pub fn overlay(&self) -> &OverlayPublisher {
        &self.overlay
    }

    pub fn report(&self) -> Option<SessionReport> {
        self.reports.get()
    }

    /// Debug rendering only; never affects what gets recorded.
    pub fn toggle_debug(&self) -> bool {
        self.overlay.toggle_debug()
    }

    pub async fn restart(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Restart { reply })
            .await
            .map_err(|_| CommandError::Closed)?;
        rx.await.map_err(|_| CommandError::Closed)??;
        Ok(())
    }

    pub async fn abort(&self) -> Result<(), CommandError> {
        self.commands
            .send(SessionCommand::Abort)
            .await
            .map_err(|_| CommandError::Closed)
    }
}

async fn drive_session(mut session: GazeSession, mut commands: mpsc::Receiver<SessionCommand>) {
    let overlay = session.overlay().clone();
    let mut run_requested = true;
    let mut closed = false;

    while !closed {
        if std::mem::take(&mut run_requested) {
            let (cancel_handle, cancel) = CancelSignal::pair();
            let restart = matches!(session.phase(), SessionPhase::Error(_));
            let run = async {
                if restart {
                    session.restart(cancel).await
                } else {
                    session.run(cancel).await
                }
            };
            tokio::pin!(run);

            let result = loop {
                tokio::select! {
                    result = &mut run => break result,
                    command = commands.recv(), if !closed => match command {
                        Some(SessionCommand::Abort) => cancel_handle.cancel(),
                        Some(SessionCommand::Restart { reply }) => {
                            let _ = reply.send(Err(SessionError::InvalidTransition {
                                from: overlay.snapshot().phase,
                                to: SessionPhase::Calibration,
                            }));
                        }
                        None => {
                            closed = true;
                            cancel_handle.cancel();
                        }
                    },
                }
            };
            match result {
                Ok(summary) => tracing::info!(points = summary.points.len(), "Session run finished"),
                Err(e) => tracing::warn!(error = %e, "Session run ended in error"),
            }
            continue;
        }

        match commands.recv().await {
            Some(SessionCommand::Abort) => session.abort(),
            Some(SessionCommand::Restart { reply }) => {
                let phase = session.phase();
                if matches!(phase, SessionPhase::Error(_)) {
                    run_requested = true;
                    let _ = reply.send(Ok(()));
                } else {
                    let _ = reply.send(Err(SessionError::InvalidTransition {
                        from: phase,
                        to: SessionPhase::Calibration,
                    }));
                }
            }
            None => closed = true,
        }
    }

    session.teardown();
    tracing::info!(session_id = %session.id(), "Session runner stopped");
}
