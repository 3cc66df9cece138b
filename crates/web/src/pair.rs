//! The request/response pair and its write-once lifecycle.
//!
//! A [`Request`] and its [`Response`] share one [`PairState`]. The pair starts
//! [`Lifecycle::Idle`], moves to [`Lifecycle::Ending`] when the response starts finalizing,
//! and to [`Lifecycle::Ended`] once the transport write finished, successfully or not.
//! Only an idle pair accepts mutations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;
use texa_http::connection::Responder;

use crate::file::FileResolver;
use crate::{Request, Response};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Idle = 0,
    Ending = 1,
    Ended = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Idle,
            1 => Lifecycle::Ending,
            _ => Lifecycle::Ended,
        }
    }
}

/// Shared lifecycle flag of one pair.
#[derive(Debug, Clone, Default)]
pub struct PairState {
    inner: Arc<AtomicU8>,
}

impl PairState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.lifecycle() == Lifecycle::Idle
    }

    /// `Idle -> Ending`. Returns false if the pair already left `Idle`.
    pub(crate) fn begin_ending(&self) -> bool {
        self.inner
            .compare_exchange(Lifecycle::Idle as u8, Lifecycle::Ending as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.inner.store(Lifecycle::Ended as u8, Ordering::Release);
    }
}

/// One plain exchange.
#[derive(Debug)]
pub struct Pair {
    pub request: Request,
    pub response: Response,
}

impl Pair {
    pub fn new(incoming: http::Request<Bytes>, responder: Responder, resolver: Arc<dyn FileResolver>) -> Self {
        let state = PairState::new();
        let request = Request::new(incoming, state.clone());
        let response = Response::new(state, responder, resolver);
        Self { request, response }
    }

    pub fn state(&self) -> &PairState {
        self.response.state()
    }

    pub fn is_writable(&self) -> bool {
        self.state().is_writable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_ended() {
        let state = PairState::new();
        let shared = state.clone();
        assert_eq!(state.lifecycle(), Lifecycle::Idle);
        assert!(state.is_writable());

        assert!(state.begin_ending());
        assert_eq!(shared.lifecycle(), Lifecycle::Ending);
        assert!(!shared.is_writable());
        assert!(!shared.begin_ending());

        state.finish();
        assert_eq!(shared.lifecycle(), Lifecycle::Ended);
        assert!(!state.begin_ending());
    }
}
