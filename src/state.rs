use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::session::runner::SessionHandle;
use crate::types::Viewport;

#[derive(Clone)]
pub struct AppState {
    session: SessionHandle,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(session: SessionHandle, config: &Config, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            session,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn viewport(&self) -> Viewport {
        self.config.viewport
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
