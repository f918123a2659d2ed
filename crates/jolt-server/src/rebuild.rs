//! Rebuild-and-notify loop driven by watch events.

use std::sync::Arc;

use jolt_build::{BuildConfiguration, BuildError, BuildReport, Bundler};
use tokio::sync::mpsc;

use crate::watcher::WatchEvent;
use crate::websocket::ReloadChannel;

/// Whether a build is running, and whether another one has been asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    Idle,
    Building {
        pending: bool,
    },
}

impl BuildState {
    /// Record a watch event. Returns `true` if a build should start now.
    pub fn on_event(&mut self) -> bool {
        match self {
            BuildState::Idle => {
                *self = BuildState::Building { pending: false };
                true
            }
            BuildState::Building { pending } => {
                *pending = true;
                false
            }
        }
    }

    /// Record a finished build. Returns `true` if a follow-up build should
    /// start now.
    pub fn on_build_finished(&mut self) -> bool {
        match self {
            BuildState::Building { pending: true } => {
                *self = BuildState::Building { pending: false };
                true
            }
            _ => {
                *self = BuildState::Idle;
                false
            }
        }
    }

    /// Whether no build is running.
    pub fn is_idle(&self) -> bool {
        matches!(self, BuildState::Idle)
    }
}

/// Runs the bundler on source changes and tells the browser to reload.
pub struct Rebuilder {
    bundler: Arc<dyn Bundler>,
    config: Arc<BuildConfiguration>,
    channel: ReloadChannel,
}

impl Rebuilder {
    /// Create a rebuilder that pushes reload signals through `channel`.
    pub fn new(
        bundler: Arc<dyn Bundler>,
        config: Arc<BuildConfiguration>,
        channel: ReloadChannel,
    ) -> Self {
        Self {
            bundler,
            config,
            channel,
        }
    }

    /// Run a single build and log the outcome. Returns whether it succeeded.
    pub async fn build_once(&self) -> bool {
        log_build(&self.bundler.bundle(&self.config).await)
    }

    /// Consume watch events until the stream closes.
    ///
    /// One build runs at a time. Events that arrive mid-build collapse into a
    /// single follow-up build. Every finished build, successful or not, pushes
    /// a reload signal if a browser is connected.
    pub async fn run(self, mut events: mpsc::Receiver<WatchEvent>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut state = BuildState::Idle;
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;

                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        tracing::info!("Detected {:?} on {}", event.kind, event.path.display());
                        if state.on_event() {
                            self.spawn_build(done_tx.clone());
                        } else {
                            tracing::debug!("Build in progress, queued a rebuild");
                        }
                    }
                    None => {
                        events_open = false;
                        if state.is_idle() {
                            break;
                        }
                    }
                },

                Some(()) = done_rx.recv() => {
                    self.notify();
                    if state.on_build_finished() {
                        self.spawn_build(done_tx.clone());
                    } else if !events_open {
                        break;
                    }
                }

                else => break,
            }
        }
    }

    fn spawn_build(&self, done: mpsc::UnboundedSender<()>) {
        let bundler = Arc::clone(&self.bundler);
        let config = Arc::clone(&self.config);

        tokio::spawn(async move {
            let build = tokio::spawn(async move { bundler.bundle(&config).await });
            match build.await {
                Ok(result) => {
                    log_build(&result);
                }
                Err(e) => tracing::error!("Build task failed: {}", e),
            }
            let _ = done.send(());
        });
    }

    fn notify(&self) {
        if self.channel.push() {
            tracing::info!("Sent reload signal");
        } else {
            tracing::debug!("No reload client connected");
        }
    }
}

fn log_build(result: &Result<BuildReport, BuildError>) -> bool {
    match result {
        Ok(report) => {
            tracing::info!(
                "Built {} in {}ms",
                report.output_dir.display(),
                report.duration_ms
            );
            true
        }
        Err(e) => {
            tracing::warn!("Build failed, serving previous output: {}", e);
            false
        }
    }
}
