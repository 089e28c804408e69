//! # Command Dispatcher
//!
//! Purpose: present one command API regardless of whether the backing
//! connection executes synchronously or defers work until it is ready.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KvAdapter` hides the wire protocol and the
//!    execution model behind five named commands plus a pass-through.
//! 2. **One Handle Per Adapter**: The Connection Handle is created at
//!    construction, owned exclusively, and never reconnected.
//! 3. **Mode Fixed At Construction**: `connect` builds the synchronous
//!    mode, `connect_deferred` the deferred one; the command surface is
//!    identical.
//! 4. **Borrow-Friendly API**: Keys and values travel as `&[u8]`.

use std::sync::Arc;
use std::time::Duration;

use bkv_proto::Frame;
use bytes::Bytes;
use tokio::runtime::Handle;
use tracing::info;

use crate::blocking::SyncBackend;
use crate::command::Command;
use crate::deferred::{ConnState, DeferredBackend};
use crate::error::{AdapterError, AdapterResult};
use crate::notify::FailureNotifier;
use crate::slot::Deferred;

/// Connection configuration shared by both execution modes.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Store address: `host:port`, `tcp://host:port`, or `redis://host:port`.
    pub uri: String,
    /// Optional TCP connect timeout (synchronous mode only).
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout (synchronous mode only).
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout (synchronous mode only).
    pub write_timeout: Option<Duration>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            uri: "127.0.0.1:6379".to_string(),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl AdapterConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        AdapterConfig {
            uri: uri.into(),
            ..AdapterConfig::default()
        }
    }
}

/// Remaining lifetime of a key, decoded from the store's TTL sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// Key does not exist (store sentinel -2).
    Missing,
    /// Key exists without an expiry (store sentinel -1).
    NoExpiry,
    /// Key expires after this duration.
    ExpiresIn(Duration),
}

enum Backend {
    Sync(SyncBackend),
    Deferred(DeferredBackend),
}

/// Key-value adapter facade with a fixed command surface.
///
/// Reads return a [`Deferred`] slot in every mode; the synchronous mode
/// settles it before returning, so `into_value` reads it immediately.
pub struct KvAdapter {
    backend: Backend,
}

impl KvAdapter {
    /// Synchronous mode: connects before returning. Every command runs to
    /// completion inside the call and failures propagate to the caller.
    pub fn connect(config: AdapterConfig) -> AdapterResult<Self> {
        let addr = normalize_uri(&config.uri);
        let backend = SyncBackend::connect(&addr, &config)?;
        Ok(KvAdapter {
            backend: Backend::Sync(backend),
        })
    }

    /// Deferred mode: returns immediately while the connection task runs
    /// on `runtime`. Commands issued before the connection is ready are
    /// queued in registration order. Establishment failure is terminal,
    /// reported once through `notifier`, and never raised here.
    pub fn connect_deferred(
        config: AdapterConfig,
        runtime: &Handle,
        notifier: FailureNotifier,
    ) -> Self {
        let addr = normalize_uri(&config.uri);
        let backend = DeferredBackend::start(addr, runtime, Arc::new(notifier));
        KvAdapter {
            backend: Backend::Deferred(backend),
        }
    }

    /// Stores `value` under `key`. In deferred mode the write is scheduled,
    /// not necessarily completed, when this returns.
    pub fn set(&self, key: &[u8], value: &[u8]) -> AdapterResult<()> {
        self.submit(Command::set(key, value))
    }

    /// Fetches the value for `key`; the slot settles to `None` when the
    /// key is absent.
    pub fn get(&self, key: &[u8]) -> Deferred<Option<Bytes>> {
        self.fetch(Command::get(key), decode_get)
    }

    /// Removes `key`. Fire-and-forget in deferred mode.
    pub fn del(&self, key: &[u8]) -> AdapterResult<()> {
        self.submit(Command::del(key))
    }

    /// Sets a time-to-live on `key`, announcing it at info level first in
    /// every mode.
    pub fn expire(&self, key: &[u8], seconds: u64) -> AdapterResult<()> {
        info!("Expiring {} in {}", String::from_utf8_lossy(key), seconds);
        self.submit(Command::expire(key, seconds))
    }

    /// Remaining time-to-live of `key`, with the store's -1/-2 sentinels
    /// decoded into [`TtlState`].
    pub fn ttl(&self, key: &[u8]) -> Deferred<TtlState> {
        self.fetch(Command::ttl(key), decode_ttl)
    }

    /// Pass-through for commands without a typed wrapper. Error replies
    /// settle the slot as failed; any other reply is handed back raw.
    pub fn dispatch(&self, name: &str, args: &[&[u8]]) -> Deferred<Frame> {
        self.fetch(Command::other(name, args), decode_raw)
    }

    /// Current lifecycle state of the Connection Handle. The synchronous
    /// mode is ready by construction.
    pub fn connection_state(&self) -> ConnState {
        match &self.backend {
            Backend::Sync(_) => ConnState::Ready,
            Backend::Deferred(backend) => backend.state(),
        }
    }

    /// Waits until the Connection Handle leaves the pending state and
    /// reports where it landed.
    pub async fn settled(&self) -> ConnState {
        match &self.backend {
            Backend::Sync(_) => ConnState::Ready,
            Backend::Deferred(backend) => backend.settled().await,
        }
    }

    fn submit(&self, cmd: Command) -> AdapterResult<()> {
        match &self.backend {
            Backend::Sync(backend) => decode_unit(backend.roundtrip(&cmd)?),
            Backend::Deferred(backend) => {
                backend.submit(cmd);
                Ok(())
            }
        }
    }

    fn fetch<T>(&self, cmd: Command, decode: fn(Frame) -> AdapterResult<T>) -> Deferred<T> {
        match &self.backend {
            Backend::Sync(backend) => {
                Deferred::settled(backend.roundtrip(&cmd).and_then(decode))
            }
            Backend::Deferred(backend) => Deferred::pending(backend.fetch(cmd), decode),
        }
    }
}

fn decode_get(frame: Frame) -> AdapterResult<Option<Bytes>> {
    match frame {
        Frame::Bulk(data) => Ok(Some(data)),
        Frame::Null => Ok(None),
        Frame::Error(message) => Err(AdapterError::Server(message)),
        _ => Err(AdapterError::UnexpectedReply),
    }
}

fn decode_ttl(frame: Frame) -> AdapterResult<TtlState> {
    match frame {
        Frame::Integer(-2) => Ok(TtlState::Missing),
        Frame::Integer(-1) => Ok(TtlState::NoExpiry),
        Frame::Integer(seconds) if seconds >= 0 => {
            Ok(TtlState::ExpiresIn(Duration::from_secs(seconds as u64)))
        }
        Frame::Error(message) => Err(AdapterError::Server(message)),
        _ => Err(AdapterError::UnexpectedReply),
    }
}

fn decode_raw(frame: Frame) -> AdapterResult<Frame> {
    match frame {
        Frame::Error(message) => Err(AdapterError::Server(message)),
        other => Ok(other),
    }
}

fn decode_unit(frame: Frame) -> AdapterResult<()> {
    match frame {
        Frame::Error(message) => Err(AdapterError::Server(message)),
        _ => Ok(()),
    }
}

/// Normalizes the accepted URI forms to `host:port`. The `tcp://` versus
/// `redis://` distinction is cosmetic; resolution happens at connect time.
fn normalize_uri(uri: &str) -> String {
    uri.strip_prefix("redis://")
        .or_else(|| uri.strip_prefix("tcp://"))
        .unwrap_or(uri)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_schemes() {
        assert_eq!(normalize_uri("localhost:6379"), "localhost:6379");
        assert_eq!(normalize_uri("tcp://127.0.0.1:6379"), "127.0.0.1:6379");
        assert_eq!(normalize_uri("redis://127.0.0.1:6379/"), "127.0.0.1:6379");
    }

    #[test]
    fn ttl_sentinels_are_distinguishable() {
        assert_eq!(decode_ttl(Frame::Integer(-2)).unwrap(), TtlState::Missing);
        assert_eq!(decode_ttl(Frame::Integer(-1)).unwrap(), TtlState::NoExpiry);
        assert_eq!(
            decode_ttl(Frame::Integer(9)).unwrap(),
            TtlState::ExpiresIn(Duration::from_secs(9))
        );
    }

    #[test]
    fn absent_key_is_not_an_error() {
        assert_eq!(decode_get(Frame::Null).unwrap(), None);
    }

    #[test]
    fn error_replies_become_server_errors() {
        assert!(matches!(
            decode_get(Frame::Error("ERR boom".to_string())),
            Err(AdapterError::Server(message)) if message == "ERR boom"
        ));
    }
}
