//! Communication object lifecycle.
//!
//! ```text
//! Created ──open──▶ Opening ──▶ Opened ──close──▶ Closing ──▶ Closed
//!    │                 │           │                 │
//!    └─────────────────┴───fault───┴─────────────────┴──▶ Faulted
//! ```
//!
//! `Faulted` is sticky: a faulted object can only be aborted into `Closed`.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::event::{FaultEvent, FaultHandler, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationState {
    /// Constructed, not yet opened.
    Created,
    Opening,
    Opened,
    Closing,
    Closed,
    Faulted,
}

/// What a close request has to do, decided from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseAction {
    Close,
    Abort,
    /// Abort, then report the fault the object was in.
    AbortFaulted,
    Nothing,
}

/// Lifecycle state machine shared by every listener.
#[derive(Debug)]
pub struct CommunicationObject {
    name: String,
    state: Mutex<CommunicationState>,
    faulted: FaultEvent,
}

impl CommunicationObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(CommunicationState::Created),
            faulted: FaultEvent::new(),
        }
    }

    pub fn state(&self) -> CommunicationState {
        *self.state.lock()
    }

    pub fn subscribe_faulted(&self, handler: FaultHandler) -> Subscription {
        self.faulted.subscribe(handler)
    }

    pub fn faulted_event(&self) -> &FaultEvent {
        &self.faulted
    }

    /// Fails unless the object is open.
    pub fn ensure_opened(&self) -> Result<()> {
        match self.state() {
            CommunicationState::Opened => Ok(()),
            CommunicationState::Faulted => Err(Error::Faulted),
            CommunicationState::Closing | CommunicationState::Closed => Err(Error::Closed),
            CommunicationState::Created | CommunicationState::Opening => Err(
                Error::invalid_operation(format!("{} has not been opened", self.name)),
            ),
        }
    }

    /// Fails once the object has been opened or is past its open phase.
    pub fn ensure_created(&self) -> Result<()> {
        match self.state() {
            CommunicationState::Created => Ok(()),
            CommunicationState::Faulted => Err(Error::Faulted),
            CommunicationState::Closing | CommunicationState::Closed => Err(Error::Closed),
            _ => Err(Error::invalid_operation(format!(
                "{} can no longer be modified",
                self.name
            ))),
        }
    }

    /// Runs `on_open` under `timeout` and moves to `Opened` on success.
    ///
    /// Any failure, including a timeout, faults the object.
    pub async fn open_with<F>(&self, timeout: Duration, on_open: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        self.transition_to_opening()?;

        let outcome = match tokio::time::timeout(timeout, on_open).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("open", timeout)),
        };

        match outcome {
            Ok(()) => {
                let mut state = self.state.lock();
                match *state {
                    CommunicationState::Opening => {
                        *state = CommunicationState::Opened;
                        debug!("{} opened", self.name);
                        Ok(())
                    }
                    CommunicationState::Faulted => Err(Error::Faulted),
                    _ => Err(Error::Closed),
                }
            }
            Err(e) => {
                warn!("{} failed to open: {}", self.name, e);
                self.fault();
                Err(e)
            }
        }
    }

    /// Closes gracefully from `Opened`, or degrades to `on_abort` otherwise.
    ///
    /// If `on_close` fails or times out, `on_abort` runs and the error is
    /// returned. Closing a faulted object aborts it and fails with
    /// [`Error::Faulted`]. The object ends `Closed` in every case.
    pub async fn close_with<F, A>(&self, timeout: Duration, on_close: F, on_abort: A) -> Result<()>
    where
        F: Future<Output = Result<()>>,
        A: FnOnce(),
    {
        match self.transition_to_closing() {
            CloseAction::Nothing => Ok(()),
            CloseAction::Abort => {
                on_abort();
                debug!("{} aborted on close", self.name);
                Ok(())
            }
            CloseAction::AbortFaulted => {
                on_abort();
                debug!("{} was faulted, aborted on close", self.name);
                Err(Error::Faulted)
            }
            CloseAction::Close => {
                let outcome = match tokio::time::timeout(timeout, on_close).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout("close", timeout)),
                };
                if let Err(e) = &outcome {
                    warn!("{} failed to close, aborting: {}", self.name, e);
                    on_abort();
                }
                *self.state.lock() = CommunicationState::Closed;
                debug!("{} closed", self.name);
                outcome
            }
        }
    }

    /// Moves to `Closed`. Returns `false` if the object was already closed.
    pub fn abort(&self) -> bool {
        let mut state = self.state.lock();
        if *state == CommunicationState::Closed {
            return false;
        }
        *state = CommunicationState::Closed;
        debug!("{} aborted", self.name);
        true
    }

    /// Moves to `Faulted` and fires the faulted event.
    ///
    /// Closed and already faulted objects are left alone.
    pub fn fault(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                CommunicationState::Closed | CommunicationState::Faulted => return,
                _ => *state = CommunicationState::Faulted,
            }
        }
        warn!("{} faulted", self.name);
        self.faulted.fire();
    }

    fn transition_to_opening(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            CommunicationState::Created => {
                *state = CommunicationState::Opening;
                Ok(())
            }
            CommunicationState::Faulted => Err(Error::Faulted),
            CommunicationState::Closing | CommunicationState::Closed => Err(Error::Closed),
            CommunicationState::Opening | CommunicationState::Opened => Err(
                Error::invalid_operation(format!("{} is already open", self.name)),
            ),
        }
    }

    fn transition_to_closing(&self) -> CloseAction {
        let mut state = self.state.lock();
        match *state {
            CommunicationState::Opened => {
                *state = CommunicationState::Closing;
                CloseAction::Close
            }
            CommunicationState::Created | CommunicationState::Opening => {
                *state = CommunicationState::Closed;
                CloseAction::Abort
            }
            CommunicationState::Faulted => {
                *state = CommunicationState::Closed;
                CloseAction::AbortFaulted
            }
            CommunicationState::Closing | CommunicationState::Closed => CloseAction::Nothing,
        }
    }
}
