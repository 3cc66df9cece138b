//! Runs one sequence of addons against a request/response.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::debug;

use super::{Addon, BoxError, Next};
use crate::{Request, Response};

/// Bookkeeping shared by every continuation of one run.
pub(crate) struct RunState {
    invoked: Box<[AtomicBool]>,
    ran: AtomicUsize,
    reached: AtomicBool,
}

impl RunState {
    fn new(len: usize) -> Self {
        Self {
            invoked: (0..=len).map(|_| AtomicBool::new(false)).collect(),
            ran: AtomicUsize::new(0),
            reached: AtomicBool::new(false),
        }
    }

    pub(crate) fn mark_invoked(&self, position: usize) {
        if let Some(flag) = self.invoked.get(position) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub(crate) fn is_invoked(&self, position: usize) -> bool {
        self.invoked.get(position).is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub(crate) fn record_ran(&self) {
        self.ran.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reach_boundary(&self) {
        self.reached.store(true, Ordering::Relaxed);
    }
}

/// The outcome of one [`run_middleware`] call.
pub struct Diagnostics {
    middleware: usize,
    ran: usize,
    continued: bool,
    error: Option<BoxError>,
}

impl Diagnostics {
    /// Number of addons in the sequence.
    pub fn middleware(&self) -> usize {
        self.middleware
    }

    /// Number of addons that were invoked.
    pub fn ran(&self) -> usize {
        self.ran
    }

    /// Whether the end of the sequence was reached with every step continuing.
    pub fn continued(&self) -> bool {
        self.continued
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&BoxError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<(), BoxError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("middleware", &self.middleware)
            .field("ran", &self.ran)
            .field("continued", &self.continued)
            .field("failed", &self.failed())
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

/// Runs `chain` in order. Never fails: an error raised by any addon ends the run and is
/// stored in the returned [`Diagnostics`].
pub async fn run_middleware(chain: &[Addon], req: &mut Request, res: &mut Response) -> Diagnostics {
    let state = RunState::new(chain.len());
    let result = Next::new(chain, &state).proceed(req, res).await;

    let ran = state.ran.load(Ordering::Relaxed);
    let reached = state.reached.load(Ordering::Relaxed);
    let error = match result {
        Ok(()) => None,
        Err(e) => {
            debug!(cause = %e, ran, "middleware failed");
            Some(e)
        }
    };

    Diagnostics { middleware: chain.len(), ran, continued: reached && error.is_none(), error }
}
