//! Background text resolution
//!
//! Each request is tagged with the epoch and balloon generation it was
//! issued for. Outcomes come back over a channel in completion order;
//! deciding whether one is still current is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::collaborators::{PixelPoint, TextResolver};
use crate::document::{DocumentHandle, Epoch};
use crate::error::{BalloonError, Operation};
use crate::store::{BalloonId, Generation};

/// What a resolution request was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTicket {
    pub epoch: Epoch,
    pub balloon_id: BalloonId,
    pub generation: Generation,
}

#[derive(Debug)]
pub struct ResolutionOutcome {
    pub ticket: ResolutionTicket,
    pub result: Result<Vec<String>, BalloonError>,
}

pub struct ResolutionOrchestrator {
    resolver: Arc<dyn TextResolver>,
    timeout: Duration,
    tx: mpsc::UnboundedSender<ResolutionOutcome>,
    rx: mpsc::UnboundedReceiver<ResolutionOutcome>,
    /// Outcomes submitted but not yet received
    in_flight: usize,
}

impl ResolutionOrchestrator {
    pub fn new(resolver: Arc<dyn TextResolver>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            resolver,
            timeout,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Start resolving `point` in the background. Must be called inside a
    /// tokio runtime. Failures are reported once and never retried.
    pub fn submit(&mut self, ticket: ResolutionTicket, document: DocumentHandle, point: PixelPoint) {
        let resolver = Arc::clone(&self.resolver);
        let tx = self.tx.clone();
        let timeout = self.timeout;
        self.in_flight += 1;
        debug!(
            balloon_id = ticket.balloon_id,
            generation = ticket.generation,
            epoch = ticket.epoch,
            x = point.x,
            y = point.y,
            "Resolution submitted"
        );

        tokio::spawn(async move {
            // A panicking resolver still has to produce an outcome
            let work = tokio::spawn(async move {
                tokio::time::timeout(timeout, resolver.resolve(&document, point)).await
            });
            let result = match work.await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(BalloonError::Timeout {
                    operation: Operation::Resolve,
                    ms: timeout.as_millis() as u64,
                }),
                Err(e) => Err(BalloonError::Transport(format!("resolver task failed: {}", e))),
            };
            if let Err(e) = &result {
                warn!(balloon_id = ticket.balloon_id, error = %e, "Resolution failed");
            }
            // Receiver gone means the engine was dropped
            let _ = tx.send(ResolutionOutcome { ticket, result });
        });
    }

    /// Next finished outcome, if one is already waiting
    pub fn try_next(&mut self) -> Option<ResolutionOutcome> {
        let outcome = self.rx.try_recv().ok()?;
        self.in_flight -= 1;
        Some(outcome)
    }

    /// Wait for the next outcome; `None` when nothing is in flight or queued
    pub async fn next(&mut self) -> Option<ResolutionOutcome> {
        // Every submitted task sends exactly one outcome
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(outcome)
    }

    /// Requests whose outcome has not been received yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
