//! # BridgeKV Wire Protocol
//!
//! Purpose: RESP2 framing shared by the blocking and deferred connection
//! drivers in `bkv-adapter`. Nothing here touches a socket; the adapter
//! owns IO, this crate owns bytes.

mod frame;

pub use frame::{encode_command, encode_frame, parse_frame, Frame, FrameError, FrameResult};
