//! # BridgeKV Adapter
//!
//! Purpose: a uniform command surface over one key-value store connection,
//! hiding whether the backing connection executes commands synchronously
//! or defers them until the connection becomes ready.
//!
//! ## Design Principles
//! 1. **One Dispatcher**: A single [`KvAdapter`] parameterized by an
//!    execution mode, not one adapter type per client flavor.
//! 2. **Explicit Deferral**: Deferred reads return a [`Deferred`] slot
//!    whose empty state is observable, never a silently unset value.
//! 3. **Ordered Queueing**: Commands issued before the connection is ready
//!    run in registration order once it is.
//! 4. **Quiet Failure, Loud Log**: Connection failure is terminal, logged
//!    exactly once through the [`FailureNotifier`], and never crashes
//!    command issuance.

mod adapter;
mod blocking;
mod command;
mod deferred;
mod error;
mod notify;
mod slot;

pub use adapter::{AdapterConfig, KvAdapter, TtlState};
pub use command::{Command, CommandName};
pub use deferred::ConnState;
pub use error::{AdapterError, AdapterResult};
pub use notify::FailureNotifier;
pub use slot::{Deferred, SlotState};

// Raw frames surface through `dispatch`, so re-export the wire type.
pub use bkv_proto::Frame;
