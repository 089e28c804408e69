//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode commands and parse store replies incrementally, so one
//! framing implementation serves both blocking reads and async `read_buf`
//! loops.
//!
//! ## Design Principles
//! 1. **Incremental Parsing**: A short buffer yields `Ok(None)`, never an
//!    error; the caller reads more and retries.
//! 2. **Binary-Safe**: Bulk payloads are raw bytes end to end.
//! 3. **Buffer Reuse**: Encoding appends into a caller-owned `BytesMut`.
//! 4. **Fail Fast**: Malformed framing surfaces immediately as `FrameError`.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// A single RESP2 value on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+OK` style replies.
    Simple(String),
    /// `-ERR ...` replies.
    Error(String),
    /// `:123` replies.
    Integer(i64),
    /// `$...` bulk payloads.
    Bulk(Bytes),
    /// `$-1`, the store's "absent" indicator.
    Null,
    /// `*...` aggregates (rare on the reply path).
    Array(Vec<Frame>),
}

/// Framing faults. An incomplete buffer is not a fault; `parse_frame`
/// reports it as `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// First byte of a frame is not a known type marker.
    #[error("unknown frame prefix: {0:#04x}")]
    UnknownPrefix(u8),
    /// Integer or length field holds non-digit bytes.
    #[error("invalid integer field")]
    InvalidInteger,
    /// Simple string or error payload is not UTF-8.
    #[error("invalid utf-8 in textual frame")]
    InvalidUtf8,
    /// Negative length other than the null sentinel.
    #[error("invalid length field: {0}")]
    InvalidLength(i64),
    /// Framing violation such as a missing CRLF.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

/// Result type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;

const CRLF: &[u8] = b"\r\n";

/// Encodes a command as a RESP2 array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut BytesMut) {
    out.extend_from_slice(b"*");
    extend_usize(out, args.len());
    out.extend_from_slice(CRLF);
    for arg in args {
        out.extend_from_slice(b"$");
        extend_usize(out, arg.len());
        out.extend_from_slice(CRLF);
        out.extend_from_slice(arg);
        out.extend_from_slice(CRLF);
    }
}

/// Encodes one frame. Mostly used by mock servers in tests; the adapter
/// only ever encodes commands.
pub fn encode_frame(frame: &Frame, out: &mut BytesMut) {
    match frame {
        Frame::Simple(text) => {
            out.extend_from_slice(b"+");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(CRLF);
        }
        Frame::Error(text) => {
            out.extend_from_slice(b"-");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(CRLF);
        }
        Frame::Integer(value) => {
            out.extend_from_slice(b":");
            out.extend_from_slice(value.to_string().as_bytes());
            out.extend_from_slice(CRLF);
        }
        Frame::Bulk(data) => {
            out.extend_from_slice(b"$");
            extend_usize(out, data.len());
            out.extend_from_slice(CRLF);
            out.extend_from_slice(data);
            out.extend_from_slice(CRLF);
        }
        Frame::Null => out.extend_from_slice(b"$-1\r\n"),
        Frame::Array(items) => {
            out.extend_from_slice(b"*");
            extend_usize(out, items.len());
            out.extend_from_slice(CRLF);
            for item in items {
                encode_frame(item, out);
            }
        }
    }
}

/// Attempts to parse one frame from the front of `buf`.
///
/// Returns the frame together with the number of bytes it consumed, or
/// `Ok(None)` when the buffer does not yet hold a complete frame.
pub fn parse_frame(buf: &[u8]) -> FrameResult<Option<(Frame, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    match buf[0] {
        b'+' => parse_text(buf, Frame::Simple),
        b'-' => parse_text(buf, Frame::Error),
        b':' => parse_integer(buf),
        b'$' => parse_bulk(buf),
        b'*' => parse_array(buf),
        other => Err(FrameError::UnknownPrefix(other)),
    }
}

fn parse_text(buf: &[u8], wrap: fn(String) -> Frame) -> FrameResult<Option<(Frame, usize)>> {
    let line = match find_crlf(&buf[1..]) {
        Some(end) => &buf[1..1 + end],
        None => return Ok(None),
    };
    let text = std::str::from_utf8(line).map_err(|_| FrameError::InvalidUtf8)?;
    Ok(Some((wrap(text.to_string()), 1 + line.len() + 2)))
}

fn parse_integer(buf: &[u8]) -> FrameResult<Option<(Frame, usize)>> {
    let line = match find_crlf(&buf[1..]) {
        Some(end) => &buf[1..1 + end],
        None => return Ok(None),
    };
    let value = parse_i64(line)?;
    Ok(Some((Frame::Integer(value), 1 + line.len() + 2)))
}

fn parse_bulk(buf: &[u8]) -> FrameResult<Option<(Frame, usize)>> {
    let line = match find_crlf(&buf[1..]) {
        Some(end) => &buf[1..1 + end],
        None => return Ok(None),
    };
    let header = 1 + line.len() + 2;

    let len = parse_i64(line)?;
    if len == -1 {
        return Ok(Some((Frame::Null, header)));
    }
    if len < 0 {
        return Err(FrameError::InvalidLength(len));
    }

    let len = len as usize;
    let total = header + len + 2;
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[header + len..total] != CRLF {
        return Err(FrameError::Malformed("bulk payload not CRLF-terminated"));
    }

    let data = Bytes::copy_from_slice(&buf[header..header + len]);
    Ok(Some((Frame::Bulk(data), total)))
}

fn parse_array(buf: &[u8]) -> FrameResult<Option<(Frame, usize)>> {
    let line = match find_crlf(&buf[1..]) {
        Some(end) => &buf[1..1 + end],
        None => return Ok(None),
    };
    let mut consumed = 1 + line.len() + 2;

    let len = parse_i64(line)?;
    if len < 0 {
        return Ok(Some((Frame::Null, consumed)));
    }

    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        match parse_frame(&buf[consumed..])? {
            Some((item, used)) => {
                items.push(item);
                consumed += used;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((Frame::Array(items), consumed)))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == CRLF)
}

fn parse_i64(line: &[u8]) -> FrameResult<i64> {
    if line.is_empty() {
        return Err(FrameError::InvalidInteger);
    }

    let (digits, negative) = match line[0] {
        b'-' => (&line[1..], true),
        _ => (line, false),
    };
    if digits.is_empty() {
        return Err(FrameError::InvalidInteger);
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(FrameError::InvalidInteger);
        }
        value = value
            .saturating_mul(10)
            .saturating_add((b - b'0') as i64);
    }
    Ok(if negative { -value } else { value })
}

fn extend_usize(out: &mut BytesMut, value: usize) {
    // Small stack buffer keeps length fields allocation-free.
    let mut digits = [0u8; 20];
    let mut len = 0;
    let mut value = value;
    if value == 0 {
        digits[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            digits[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    digits[..len].reverse();
    out.extend_from_slice(&digits[..len]);
}
