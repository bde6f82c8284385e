//! Lifecycle state and its single shared cell.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tracing::debug;

use crate::error::BridgeError;

/// The phase governing which operations are currently permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum LifecycleState {
    #[default]
    Unloaded,
    Preparing,
    Ready,
    Generating,
    Error(String),
}

impl LifecycleState {
    /// Whether an engine handle is held.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Generating)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Unloaded => f.write_str("unloaded"),
            LifecycleState::Preparing => f.write_str("preparing"),
            LifecycleState::Ready => f.write_str("ready"),
            LifecycleState::Generating => f.write_str("generating"),
            LifecycleState::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Outcome of admitting a load request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoadAdmission {
    /// State moved to `Preparing`; the caller must enqueue the load.
    Enqueue,
    /// A model is already loaded; nothing to do.
    AlreadyLoaded,
    Rejected(BridgeError),
}

/// The one lifecycle state instance.
///
/// Every transition goes through the watch sender's lock, so admission checks
/// on the caller side and transitions on the worker are totally ordered.
/// Observers only ever see published values through a `watch::Receiver`.
///
/// `pending_unloads` counts unloads admitted but not yet finished by the
/// worker. It is only read or written inside the sender's critical section.
#[derive(Debug)]
pub(crate) struct SharedState {
    tx: watch::Sender<LifecycleState>,
    pending_unloads: AtomicUsize,
}

impl SharedState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Unloaded);
        Self {
            tx,
            pending_unloads: AtomicUsize::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn set(&self, next: LifecycleState) {
        let previous = self.tx.send_replace(next.clone());
        if previous != next {
            debug!(from = %previous, to = %next, "Lifecycle transition");
        }
    }

    /// `Unloaded`/`Error` move to `Preparing` atomically. A loaded model
    /// coalesces the load unless an unload is still queued, in which case the
    /// load is queued behind it. `Preparing` rejects.
    pub fn admit_load(&self) -> LoadAdmission {
        let mut admission = LoadAdmission::Enqueue;
        self.tx.send_if_modified(|state| match state {
            LifecycleState::Unloaded | LifecycleState::Error(_) => {
                debug!(from = %state, to = "preparing", "Lifecycle transition");
                *state = LifecycleState::Preparing;
                true
            }
            LifecycleState::Preparing => {
                admission = LoadAdmission::Rejected(BridgeError::not_ready());
                false
            }
            LifecycleState::Ready | LifecycleState::Generating => {
                if self.pending_unloads.load(Ordering::Relaxed) > 0 {
                    debug!("Load queued behind a pending unload");
                } else {
                    admission = LoadAdmission::AlreadyLoaded;
                }
                false
            }
        });
        admission
    }

    /// Roll back an admitted load that never reached the worker.
    pub fn abandon_preparing(&self, reason: &str) {
        self.tx.send_if_modified(|state| {
            if *state != LifecycleState::Preparing {
                return false;
            }
            debug!(reason, "Abandoning preparation");
            *state = LifecycleState::Error(reason.to_string());
            true
        });
    }

    /// Reject-fast check for generate.
    pub fn admit_loaded_operation(&self) -> Result<(), BridgeError> {
        check_loaded(&self.tx.borrow())
    }

    /// Reject-fast check for unload; an admitted unload is counted as pending
    /// until the worker calls [`SharedState::finish_unload`].
    pub fn admit_unload(&self) -> Result<(), BridgeError> {
        let mut admission = Ok(());
        self.tx.send_if_modified(|state| {
            admission = check_loaded(state);
            if admission.is_ok() {
                self.pending_unloads.fetch_add(1, Ordering::Relaxed);
            }
            false
        });
        admission
    }

    /// Retire one pending unload, publishing `Unloaded` if a handle was released.
    pub fn finish_unload(&self, released: bool) {
        self.tx.send_if_modified(|state| {
            let pending = self.pending_unloads.load(Ordering::Relaxed);
            self.pending_unloads
                .store(pending.saturating_sub(1), Ordering::Relaxed);

            if !released || *state == LifecycleState::Unloaded {
                return false;
            }
            debug!(from = %state, to = "unloaded", "Lifecycle transition");
            *state = LifecycleState::Unloaded;
            true
        });
    }
}

fn check_loaded(state: &LifecycleState) -> Result<(), BridgeError> {
    match state {
        LifecycleState::Ready | LifecycleState::Generating => Ok(()),
        LifecycleState::Preparing => Err(BridgeError::not_ready()),
        LifecycleState::Unloaded | LifecycleState::Error(_) => Err(BridgeError::model_not_loaded()),
    }
}
