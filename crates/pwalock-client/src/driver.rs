//! Event loop around the controller
//!
//! Host events arrive on an mpsc channel, the idle check runs on a tokio
//! interval and sync messages come from the bus. Verification runs in a
//! spawned task so the loop keeps handling events while it is pending;
//! a second submit during that time is dropped by the controller.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::controller::{LockController, Submission, SubmitResult};
use crate::error::Result;
use crate::sync::BusReceiver;
use crate::verifier::Outcome;

/// Idle check period
pub const TICK_RATE: Duration = Duration::from_secs(1);

/// Events fed in by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Pointer move, key press, pointer down or click
    Activity,
    /// Page visibility changed
    Visibility { visible: bool },
    /// PIN form submitted
    Submit,
    /// Explicit lock
    LockNow,
    /// Stop the loop and hand the controller back
    Shutdown,
}

/// Runs a [`LockController`] until shutdown
pub struct Driver {
    controller: LockController,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    sync: Option<BusReceiver>,
    results_tx: mpsc::UnboundedSender<Result<Outcome>>,
    results_rx: mpsc::UnboundedReceiver<Result<Outcome>>,
    submit_results: Option<mpsc::UnboundedSender<SubmitResult>>,
    tick_rate: Duration,
}

impl Driver {
    /// Create a driver and the sender used to feed it events
    pub fn new(controller: LockController) -> (Self, mpsc::UnboundedSender<ClientEvent>) {
        let (tx, events) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        (
            Self {
                controller,
                events,
                sync: None,
                results_tx,
                results_rx,
                submit_results: None,
                tick_rate: TICK_RATE,
            },
            tx,
        )
    }

    /// Listen for other instances on `receiver`
    pub fn with_sync(mut self, receiver: BusReceiver) -> Self {
        self.sync = Some(receiver);
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: Duration) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Report the result of each finished submission
    pub fn subscribe_results(&mut self) -> mpsc::UnboundedReceiver<SubmitResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.submit_results = Some(tx);
        rx
    }

    /// Run until `Shutdown` or until every event sender is dropped
    pub async fn run(mut self) -> LockController {
        let mut interval = tokio::time::interval(self.tick_rate);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.controller.tick();
                }
                event = self.events.recv() => {
                    match event {
                        Some(ClientEvent::Shutdown) | None => break,
                        Some(event) => self.handle(event),
                    }
                }
                result = self.results_rx.recv() => {
                    if let Some(result) = result {
                        let submitted = self.controller.finish_submit(result).await;
                        self.report(submitted);
                    }
                }
                kind = recv_sync(&mut self.sync) => {
                    match kind {
                        Some(kind) => {
                            self.controller.on_sync(kind);
                        }
                        None => {
                            debug!("Sync bus closed");
                            self.sync = None;
                        }
                    }
                }
            }
        }

        info!("Lock driver stopped");
        self.controller
    }

    fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Activity => self.controller.record_activity(),
            ClientEvent::Visibility { visible } => {
                self.controller.visibility_changed(visible);
            }
            ClientEvent::LockNow => {
                self.controller.lock_now();
            }
            ClientEvent::Submit => match self.controller.begin_submit() {
                Submission::Done(result) => self.report(result),
                Submission::Pending(attempt) => match self.controller.verifier().cloned() {
                    Some(verifier) => {
                        let results = self.results_tx.clone();
                        tokio::spawn(async move {
                            let result = verifier.verify(attempt.into_pin()).await;
                            let _ = results.send(result);
                        });
                    }
                    None => {
                        let _ = self.results_tx.send(Ok(Outcome::NotConfigured));
                    }
                },
            },
            ClientEvent::Shutdown => {}
        }
    }

    fn report(&self, result: SubmitResult) {
        if let Some(tx) = &self.submit_results {
            let _ = tx.send(result);
        }
    }
}

async fn recv_sync(sync: &mut Option<BusReceiver>) -> Option<crate::sync::SyncKind> {
    match sync {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
