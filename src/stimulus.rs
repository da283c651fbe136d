//! Stimulus playback. The player's ended notification is the only
//! authoritative end-of-session trigger.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("autoplay was blocked")]
    AutoplayBlocked,
    #[error("stimulus source unavailable: {0}")]
    Source(String),
}

#[async_trait]
pub trait StimulusPlayer: Send + Sync {
    /// Starts (or resumes) muted inline playback.
    async fn play(&self) -> Result<(), PlaybackError>;

    fn subscribe(&self) -> watch::Receiver<PlaybackState>;

    /// Halts playback without signalling `Ended`.
    fn stop(&self);
}

/// Plays a fixed-duration asset against the runtime clock and fires `Ended`
/// when the duration runs out.
pub struct ClockPlayer {
    src: String,
    duration: Duration,
    state: Arc<watch::Sender<PlaybackState>>,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl ClockPlayer {
    pub fn new(src: impl Into<String>, duration: Duration) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            src: src.into(),
            duration,
            state: Arc::new(state),
            clock: Mutex::new(None),
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }
}

#[async_trait]
impl StimulusPlayer for ClockPlayer {
    async fn play(&self) -> Result<(), PlaybackError> {
        if self.src.trim().is_empty() {
            return Err(PlaybackError::Source("empty stimulus source".to_string()));
        }

        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        match self.state() {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Idle | PlaybackState::Paused | PlaybackState::Ended => {}
        }

        if let Some(previous) = clock.take() {
            previous.abort();
        }
        self.state.send_replace(PlaybackState::Playing);
        *clock = Some(tokio::spawn(run_clock(self.state.clone(), self.duration)));
        tracing::info!(src = %self.src, duration_secs = self.duration.as_secs_f64(), "Stimulus playing");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    fn stop(&self) {
        if let Some(clock) = self.clock.lock().unwrap_or_else(|e| e.into_inner()).take() {
            clock.abort();
        }
        self.state.send_if_modified(|s| {
            if matches!(s, PlaybackState::Playing | PlaybackState::Paused) {
                *s = PlaybackState::Idle;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for ClockPlayer {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.lock().unwrap_or_else(|e| e.into_inner()).take() {
            clock.abort();
        }
    }
}

async fn run_clock(state: Arc<watch::Sender<PlaybackState>>, duration: Duration) {
    let mut rx = state.subscribe();
    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            state.send_replace(PlaybackState::Ended);
            tracing::info!("Stimulus ended");
        }
        _ = rx.wait_for(|s| *s != PlaybackState::Playing) => {}
    };
}
