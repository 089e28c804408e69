//! # Deferred Result Slot
//!
//! Purpose: bridge a command completion that happens on the connection
//! task back to the caller that issued the command, with the empty state
//! observable instead of silently reading an unset value.
//!
//! A slot is written at most once, by the continuation that runs when the
//! Connection Handle is ready. The caller reads it through one of three
//! paths: a non-blocking [`Deferred::probe`], an immediate
//! [`Deferred::into_value`], or an awaited [`Deferred::resolve`].

use bkv_proto::Frame;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::{AdapterError, AdapterResult};

/// Observation of a slot at one point in time.
#[derive(Debug)]
pub enum SlotState<T> {
    /// The continuation has not run yet; a value may still arrive.
    Empty,
    /// The value arrived. It is handed out exactly once.
    Ready(T),
    /// The command ran and failed.
    Failed(AdapterError),
    /// No value will ever arrive: the connection never became ready, was
    /// lost before the command ran, or the value was already taken.
    Abandoned,
}

type Decode<T> = fn(Frame) -> AdapterResult<T>;

/// Single-writer result cell for one issued command.
///
/// In synchronous mode the slot is born settled; in deferred mode it is
/// backed by the connection task's completion channel.
pub struct Deferred<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Settled(Option<AdapterResult<T>>),
    Pending {
        rx: oneshot::Receiver<AdapterResult<Frame>>,
        decode: Decode<T>,
    },
}

impl<T> Deferred<T> {
    pub(crate) fn settled(result: AdapterResult<T>) -> Self {
        Deferred {
            inner: Inner::Settled(Some(result)),
        }
    }

    pub(crate) fn pending(rx: oneshot::Receiver<AdapterResult<Frame>>, decode: Decode<T>) -> Self {
        Deferred {
            inner: Inner::Pending { rx, decode },
        }
    }

    /// Non-blocking read of the slot's current state.
    ///
    /// `Empty` can repeat; `Ready` and `Failed` are handed out once and the
    /// slot reads as `Abandoned` afterwards.
    pub fn probe(&mut self) -> SlotState<T> {
        match &mut self.inner {
            Inner::Settled(result) => match result.take() {
                Some(Ok(value)) => SlotState::Ready(value),
                Some(Err(err)) => SlotState::Failed(err),
                None => SlotState::Abandoned,
            },
            Inner::Pending { rx, decode } => match rx.try_recv() {
                Ok(outcome) => match outcome.and_then(*decode) {
                    Ok(value) => SlotState::Ready(value),
                    Err(err) => SlotState::Failed(err),
                },
                Err(TryRecvError::Empty) => SlotState::Empty,
                Err(TryRecvError::Closed) => SlotState::Abandoned,
            },
        }
    }

    /// Immediate read: the settled value, `Pending` when the continuation
    /// has not run yet, or `Disconnected` when it never will.
    pub fn into_value(mut self) -> AdapterResult<T> {
        match self.probe() {
            SlotState::Ready(value) => Ok(value),
            SlotState::Failed(err) => Err(err),
            SlotState::Empty => Err(AdapterError::Pending),
            SlotState::Abandoned => Err(AdapterError::Disconnected),
        }
    }

    /// Waits for the continuation to run and returns its result.
    pub async fn resolve(self) -> AdapterResult<T> {
        match self.inner {
            Inner::Settled(Some(result)) => result,
            Inner::Settled(None) => Err(AdapterError::Disconnected),
            Inner::Pending { rx, decode } => match rx.await {
                Ok(outcome) => outcome.and_then(decode),
                Err(_) => Err(AdapterError::Disconnected),
            },
        }
    }
}
