//! # Deferred Execution Backend
//!
//! Purpose: register commands as continuations against a connection that
//! may not be ready yet. One task owns the socket; callers reach it
//! through an ordered queue, so commands issued while the connection is
//! pending run in registration order once it becomes ready.
//!
//! Establishment failure is terminal for the handle: the queue is dropped,
//! already-issued slots read as abandoned, and the Failure Notifier fires
//! exactly once.

use std::sync::Arc;

use bkv_proto::{parse_frame, Frame};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::command::Command;
use crate::error::{AdapterError, AdapterResult};
use crate::notify::FailureNotifier;

/// Lifecycle of the Connection Handle owned by a deferred dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Connection attempt in flight; commands are being queued.
    Pending,
    /// Connection established; queued commands run in order.
    Ready,
    /// Terminal: establishment failed or the connection was lost.
    Failed,
}

struct Dispatch {
    cmd: Command,
    reply: Option<oneshot::Sender<AdapterResult<Frame>>>,
}

pub(crate) struct DeferredBackend {
    queue: mpsc::UnboundedSender<Dispatch>,
    state: watch::Receiver<ConnState>,
}

impl DeferredBackend {
    /// Spawns the connection task on the injected runtime and returns a
    /// handle that queues commands against it.
    pub(crate) fn start(addr: String, runtime: &Handle, notifier: Arc<FailureNotifier>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnState::Pending);
        runtime.spawn(run_connection(addr, queue_rx, state_tx, notifier));
        DeferredBackend {
            queue: queue_tx,
            state: state_rx,
        }
    }

    /// Fire-and-forget registration. Once the handle has failed the
    /// command is dropped, matching the no-completion contract.
    pub(crate) fn submit(&self, cmd: Command) {
        let _ = self.queue.send(Dispatch { cmd, reply: None });
    }

    /// Registers a read command and returns the channel its result will
    /// arrive on. When the connection task is already gone the sender is
    /// dropped here and the slot reads as abandoned.
    pub(crate) fn fetch(&self, cmd: Command) -> oneshot::Receiver<AdapterResult<Frame>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.queue.send(Dispatch {
            cmd,
            reply: Some(tx),
        });
        rx
    }

    pub(crate) fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    /// Waits until the handle leaves the pending state.
    pub(crate) async fn settled(&self) -> ConnState {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if current != ConnState::Pending {
                return current;
            }
            if state.changed().await.is_err() {
                return *state.borrow();
            }
        }
    }
}

async fn run_connection(
    addr: String,
    mut queue: mpsc::UnboundedReceiver<Dispatch>,
    state: watch::Sender<ConnState>,
    notifier: Arc<FailureNotifier>,
) {
    let mut stream = match TcpStream::connect(addr.as_str()).await {
        Ok(stream) => stream,
        Err(err) => {
            // Queued commands are dropped with the receiver; their slots
            // never fill.
            let _ = state.send(ConnState::Failed);
            notifier.fire(&err.to_string());
            return;
        }
    };
    let _ = stream.set_nodelay(true);
    let _ = state.send(ConnState::Ready);

    let mut read_buf = BytesMut::with_capacity(4096);
    let mut write_buf = BytesMut::with_capacity(256);

    while let Some(dispatch) = queue.recv().await {
        match roundtrip(&mut stream, &mut read_buf, &mut write_buf, &dispatch.cmd).await {
            Ok(frame) => match (dispatch.reply, frame) {
                (Some(reply), frame) => {
                    let _ = reply.send(Ok(frame));
                }
                (None, Frame::Error(message)) => {
                    // Fire-and-forget command rejected by the store; there
                    // is no caller to tell.
                    debug!(command = %dispatch.cmd.name(), "store rejected command: {message}");
                }
                (None, _) => {}
            },
            Err(err) => {
                // IO or framing fault desyncs the stream; terminal for
                // this handle.
                let _ = state.send(ConnState::Failed);
                match dispatch.reply {
                    Some(reply) => {
                        let _ = reply.send(Err(err));
                    }
                    None => debug!(command = %dispatch.cmd.name(), "command lost: {err}"),
                }
                return;
            }
        }
    }
}

async fn roundtrip(
    stream: &mut TcpStream,
    read_buf: &mut BytesMut,
    write_buf: &mut BytesMut,
    cmd: &Command,
) -> AdapterResult<Frame> {
    write_buf.clear();
    cmd.encode(write_buf);
    stream.write_all(write_buf).await?;

    loop {
        if let Some((frame, consumed)) = parse_frame(read_buf)? {
            read_buf.advance(consumed);
            return Ok(frame);
        }
        let n = stream.read_buf(read_buf).await?;
        if n == 0 {
            return Err(AdapterError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "store closed the connection",
            )));
        }
    }
}
