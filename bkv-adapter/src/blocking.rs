//! # Blocking Execution Backend
//!
//! Purpose: run every command to completion inside the call. The
//! Connection Handle is ready before the dispatcher is handed out, so a
//! command either returns a fully resolved reply or fails synchronously.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;

use bkv_proto::{parse_frame, Frame};
use bytes::{Buf, BytesMut};

use crate::adapter::AdapterConfig;
use crate::command::Command;
use crate::error::{AdapterError, AdapterResult};

/// Single blocking connection behind a mutex.
///
/// The adapter is not designed for concurrent callers; the mutex only
/// keeps the `&self` command surface sound.
pub(crate) struct SyncBackend {
    conn: Mutex<Conn>,
}

impl SyncBackend {
    pub(crate) fn connect(addr: &str, config: &AdapterConfig) -> AdapterResult<Self> {
        let resolved = addr
            .to_socket_addrs()
            .map_err(|_| AdapterError::InvalidAddress(addr.to_string()))?
            .next()
            .ok_or_else(|| AdapterError::InvalidAddress(addr.to_string()))?;
        let stream = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&resolved, timeout)?,
            None => TcpStream::connect(resolved)?,
        };
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Request/reply traffic in small frames; Nagle only adds latency.
        stream.set_nodelay(true)?;

        Ok(SyncBackend {
            conn: Mutex::new(Conn {
                stream,
                read_buf: BytesMut::with_capacity(4096),
                write_buf: BytesMut::with_capacity(256),
            }),
        })
    }

    pub(crate) fn roundtrip(&self, cmd: &Command) -> AdapterResult<Frame> {
        let mut conn = self.conn.lock().expect("connection mutex poisoned");
        conn.roundtrip(cmd)
    }
}

struct Conn {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl Conn {
    fn roundtrip(&mut self, cmd: &Command) -> AdapterResult<Frame> {
        self.write_buf.clear();
        cmd.encode(&mut self.write_buf);
        self.stream.write_all(&self.write_buf)?;
        self.stream.flush()?;

        let mut chunk = [0u8; 4096];
        loop {
            if let Some((frame, consumed)) = parse_frame(&self.read_buf)? {
                self.read_buf.advance(consumed);
                return Ok(frame);
            }
            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "store closed the connection",
                )
                .into());
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }
}
