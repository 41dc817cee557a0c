//! Event loop that runs a [`LogSession`] against real time.
//!
//! The driver owns the session and reacts to four event sources: view
//! commands, deliveries on either channel, the batch deadline, and
//! cancellation. Everything happens on one task, so ordering between a
//! delivery and a toggle is exactly the order in which they are observed.
//! Rendered state goes out on a [`watch`] channel.

use std::future;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::SubscriptionKey;
use crate::error::{LiveLogsError, Result};
use crate::session::{LiveView, LogSession};
use crate::view::SessionWindow;

/// A user action applied by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    /// Freeze presentation
    Pause,
    /// Unfreeze presentation
    Resume,
    /// Show or hide infra records
    SetShowInfra(bool),
    /// Show or hide records older than the session window
    SetShowPrevious(bool),
    /// Flip the infra feature toggle
    SetInfraEnabled(bool),
    /// Point the session at a new key; the window reopens now
    Retarget(Option<SubscriptionKey>),
    /// Buffer waiting deliveries and recompute without waiting for a tick
    Flush,
}

/// Runs one session until cancelled or every handle is dropped.
#[derive(Debug)]
pub struct SessionDriver {
    session: LogSession,
    commands: mpsc::Receiver<ViewCommand>,
    output: watch::Sender<LiveView>,
    cancel: CancellationToken,
}

impl SessionDriver {
    /// Wraps a session and returns the handle used to control it.
    #[must_use]
    pub fn new(session: LogSession) -> (Self, DriverHandle) {
        let (command_tx, command_rx) = mpsc::channel(session.config().command_buffer);
        let (output, view) = watch::channel(session.snapshot());
        let cancel = CancellationToken::new();

        let handle = DriverHandle {
            commands: command_tx,
            view,
            cancel: cancel.clone(),
        };
        let driver = Self {
            session,
            commands: command_rx,
            output,
            cancel,
        };
        (driver, handle)
    }

    /// Spawns the driver on the current runtime.
    #[must_use]
    pub fn spawn(session: LogSession) -> (DriverHandle, JoinHandle<()>) {
        let (driver, handle) = Self::new(session);
        (handle, tokio::spawn(driver.run()))
    }

    /// Runs the event loop, then closes the session.
    pub async fn run(mut self) {
        let session_id = self.session.id();
        info!(%session_id, "session driver started");

        loop {
            let deadline = self.session.next_deadline();

            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(%session_id, "session driver cancelled");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!(%session_id, "all driver handles dropped");
                        break;
                    };
                    self.apply(command);
                }
                (kind, record) = self.session.next_delivery() => {
                    self.session.deliver(kind, record, Instant::now());
                }
                () = sleep_until(deadline) => {
                    if self.session.tick(Instant::now()).is_some() {
                        self.publish();
                    }
                }
            }
        }

        self.session.close();
        info!(%session_id, "session driver stopped");
    }

    fn apply(&mut self, command: ViewCommand) {
        debug!(session_id = %self.session.id(), ?command, "applying view command");
        match command {
            ViewCommand::Pause => self.session.pause(),
            ViewCommand::Resume => {
                self.session.resume();
            }
            ViewCommand::SetShowInfra(show) => self.session.set_show_infra(show),
            ViewCommand::SetShowPrevious(show) => self.session.set_show_previous(show),
            ViewCommand::SetInfraEnabled(enabled) => {
                self.session.set_infra_enabled(enabled);
            }
            ViewCommand::Retarget(key) => {
                self.session.retarget(key, SessionWindow::now());
            }
            ViewCommand::Flush => {
                self.session.flush(Instant::now());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        self.output.send_if_modified(|current| {
            if current.differs(&snapshot) {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Controls a running [`SessionDriver`] and observes its output.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<ViewCommand>,
    view: watch::Receiver<LiveView>,
    cancel: CancellationToken,
}

impl DriverHandle {
    /// Sends a command to the driver.
    ///
    /// # Errors
    ///
    /// Returns [`LiveLogsError::SessionClosed`] if the driver has stopped.
    pub async fn send(&self, command: ViewCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LiveLogsError::SessionClosed)
    }

    /// Freezes presentation.
    pub async fn pause(&self) -> Result<()> {
        self.send(ViewCommand::Pause).await
    }

    /// Unfreezes presentation.
    pub async fn resume(&self) -> Result<()> {
        self.send(ViewCommand::Resume).await
    }

    /// Shows or hides infra records.
    pub async fn set_show_infra(&self, show: bool) -> Result<()> {
        self.send(ViewCommand::SetShowInfra(show)).await
    }

    /// Shows or hides records older than the session window.
    pub async fn set_show_previous(&self, show: bool) -> Result<()> {
        self.send(ViewCommand::SetShowPrevious(show)).await
    }

    /// Flips the infra feature toggle.
    pub async fn set_infra_enabled(&self, enabled: bool) -> Result<()> {
        self.send(ViewCommand::SetInfraEnabled(enabled)).await
    }

    /// Points the session at a new key.
    pub async fn retarget(&self, key: Option<SubscriptionKey>) -> Result<()> {
        self.send(ViewCommand::Retarget(key)).await
    }

    /// Forces an immediate recompute.
    pub async fn flush(&self) -> Result<()> {
        self.send(ViewCommand::Flush).await
    }

    /// A receiver that observes every published view.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LiveView> {
        self.view.clone()
    }

    /// The most recently published view.
    #[must_use]
    pub fn current(&self) -> LiveView {
        self.view.borrow().clone()
    }

    /// Stops the driver.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the driver has stopped or been told to.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }
}
