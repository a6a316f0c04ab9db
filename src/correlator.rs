//! Outcome event correlation
//!
//! A background task reads the contract's outcome stream and routes each
//! event to the waiter registered for its nonce. Events for nonces nobody is
//! waiting on (stale sessions, other players) are dropped. Once the owning
//! session has its event, [`settle`] reconciles the board with it.

use crate::common::types::{OutcomeEvent, SessionNonce};
use crate::errors::{FailureReason, GameError};
use crate::games::grid::TileGrid;
use crate::games::session::BetSession;
use crate::games::tracker::TxStatus;
use crate::metrics::SessionMetrics;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, trace, warn};

/// What a waiter receives: its event, or why it never will
type Delivery = Result<OutcomeEvent, FailureReason>;
type Waiters = DashMap<SessionNonce, oneshot::Sender<Delivery>>;

/// Routes outcome events to the session waiting for them
#[derive(Clone)]
pub struct OutcomeCorrelator {
    /// Pending session waiters (nonce -> oneshot sender)
    waiters: Arc<Waiters>,
    /// Set once the stream has ended; no waiter can be served after that
    closed: Arc<AtomicBool>,
    metrics: SessionMetrics,
}

impl OutcomeCorrelator {
    /// Start correlating events from `events`
    ///
    /// Must be called inside a tokio runtime. The processor stops when the
    /// stream closes or the correlator and all its subscriptions are dropped.
    pub fn new(events: broadcast::Receiver<OutcomeEvent>, metrics: SessionMetrics) -> Self {
        let correlator = Self {
            waiters: Arc::new(DashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
            metrics,
        };

        correlator.spawn_event_processor(events);

        correlator
    }

    fn spawn_event_processor(&self, mut event_rx: broadcast::Receiver<OutcomeEvent>) {
        let waiters: Weak<Waiters> = Arc::downgrade(&self.waiters);
        let closed = self.closed.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            debug!("Outcome event processor started");
            loop {
                let event = match event_rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Outcome correlator lagged; skipped {} events", skipped);
                        if let Some(waiters) = waiters.upgrade() {
                            fail_all(&waiters, FailureReason::OutcomeStreamLagged { skipped });
                        }
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Flag first so late subscribers see it, then wake everyone registered
                        closed.store(true, Ordering::SeqCst);
                        if let Some(waiters) = waiters.upgrade() {
                            fail_all(&waiters, FailureReason::OutcomeStreamClosed);
                        }
                        break;
                    }
                };

                let Some(active) = waiters.upgrade() else {
                    break;
                };

                match active.remove(&event.nonce) {
                    Some((nonce, sender)) => {
                        debug!("Outcome event matched session {}", nonce);
                        if sender.send(Ok(event)).is_err() {
                            trace!("Waiter for session {} already dropped", nonce);
                        }
                    }
                    None => {
                        debug!(
                            "Discarding outcome event for unknown nonce {} ({} results)",
                            event.nonce,
                            event.outcomes.len()
                        );
                        metrics.record_discarded();
                    }
                }
            }
            debug!("Outcome event processor stopped");
        });
    }

    /// Start listening for the event bearing `nonce`
    ///
    /// Listening ends when the event is delivered or the subscription is
    /// dropped, whichever comes first. After the stream has closed the
    /// subscription fails immediately with `OutcomeStreamClosed`.
    pub fn subscribe(&self, nonce: SessionNonce) -> OutcomeSubscription {
        let (tx, rx) = oneshot::channel();
        let subscription = OutcomeSubscription {
            nonce,
            receiver: rx,
            waiters: self.waiters.clone(),
        };

        if self.waiters.insert(nonce, tx).is_some() {
            warn!("Replaced an existing outcome waiter for session {}", nonce);
        }

        // Checked after inserting: a close racing with the insert either
        // drains this entry or is seen here
        if self.is_closed() {
            if let Some((_, sender)) = self.waiters.remove(&nonce) {
                let _ = sender.send(Err(FailureReason::OutcomeStreamClosed));
            }
            debug!("Outcome stream already closed; session {} cannot be served", nonce);
            return subscription;
        }

        trace!("Listening for outcome of session {} ({} waiters)", nonce, self.waiters.len());
        subscription
    }

    /// Stop listening for `nonce`; returns whether a waiter was registered
    pub fn unsubscribe(&self, nonce: &SessionNonce) -> bool {
        self.waiters.remove(nonce).is_some()
    }

    pub fn is_listening(&self, nonce: &SessionNonce) -> bool {
        self.waiters.contains_key(nonce)
    }

    /// Whether the outcome stream has ended
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of sessions still waiting for an outcome
    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }
}

fn fail_all(waiters: &Waiters, reason: FailureReason) {
    let nonces: Vec<SessionNonce> = waiters.iter().map(|entry| *entry.key()).collect();
    for nonce in nonces {
        if let Some((nonce, sender)) = waiters.remove(&nonce) {
            debug!("Failing outcome waiter for session {}: {}", nonce, reason);
            let _ = sender.send(Err(reason.clone()));
        }
    }
}

/// Registration for one session's outcome event
pub struct OutcomeSubscription {
    nonce: SessionNonce,
    receiver: oneshot::Receiver<Delivery>,
    waiters: Arc<Waiters>,
}

impl OutcomeSubscription {
    pub fn nonce(&self) -> SessionNonce {
        self.nonce
    }

    /// Wait for the event, optionally bounded by `timeout`
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<OutcomeEvent, FailureReason> {
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.receiver).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(FailureReason::OutcomeTimeout {
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => (&mut self.receiver).await,
        };

        // A dropped sender means the waiter was unregistered
        received.unwrap_or(Err(FailureReason::OutcomeStreamClosed))
    }
}

impl Drop for OutcomeSubscription {
    fn drop(&mut self) {
        if self.waiters.remove(&self.nonce).is_some() {
            trace!("Stopped listening for outcome of session {}", self.nonce);
        }
    }
}

/// Result of applying an outcome event to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Finalized { gems: usize, mines: usize },
    Failed(FailureReason),
    /// Event is not for this session, or the session is not awaiting one
    Ignored,
}

/// Reconcile the board with the outcome of `session`
pub fn settle(session: &mut BetSession, grid: &mut TileGrid, event: &OutcomeEvent) -> Settlement {
    if event.nonce != session.nonce() {
        debug!("Outcome for {} does not belong to session {}", event.nonce, session.nonce());
        return Settlement::Ignored;
    }
    if session.status() != &TxStatus::AwaitingOutcome {
        warn!(
            "Dropping outcome for session {} in state {}",
            session.nonce(),
            session.status().label()
        );
        return Settlement::Ignored;
    }

    let expected = session.selected_count();
    let actual = event.outcomes.len();
    let rejected = if actual != expected {
        error!(
            "Outcome for session {} carries {} results for {} selected tiles; contract and client disagree on the selection",
            session.nonce(),
            actual,
            expected
        );
        Some(FailureReason::OutcomeMismatch { expected, actual })
    } else {
        match grid.apply_reveal(session.selection(), &event.outcomes) {
            Ok(()) => None,
            Err(err @ GameError::OutcomeMismatch { .. }) => {
                error!("Outcome for session {} cannot be applied: {}", session.nonce(), err);
                Some(FailureReason::OutcomeMismatch { expected, actual })
            }
            Err(err) => {
                error!("Board refused outcome for session {}: {}", session.nonce(), err);
                Some(FailureReason::RevealRejected(err.to_string()))
            }
        }
    };

    if let Some(reason) = rejected {
        return match session.tracker_mut().fail(reason.clone()) {
            Ok(_) => Settlement::Failed(reason),
            Err(e) => {
                warn!("Session {}: {}", session.nonce(), e);
                Settlement::Ignored
            }
        };
    }

    if let Err(e) = session.tracker_mut().advance(TxStatus::Finalized) {
        warn!("Session {}: {}", session.nonce(), e);
        return Settlement::Ignored;
    }

    let mines = event.mines();
    Settlement::Finalized {
        gems: event.outcomes.len() - mines,
        mines,
    }
}
