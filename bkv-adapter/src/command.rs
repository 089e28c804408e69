//! Command values dispatched to the store: a name plus an ordered argument
//! list, immutable once built.

use std::fmt;

use bkv_proto::encode_command;
use bytes::{Bytes, BytesMut};

/// Name of a store command.
///
/// The fixed variants cover the adapter's typed surface; everything else
/// travels as `Other` through [`crate::KvAdapter::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandName {
    Get,
    Set,
    Del,
    Expire,
    Ttl,
    /// Pass-through for commands without a typed wrapper.
    Other(String),
}

impl CommandName {
    /// Wire spelling of the command name.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CommandName::Get => b"GET",
            CommandName::Set => b"SET",
            CommandName::Del => b"DEL",
            CommandName::Expire => b"EXPIRE",
            CommandName::Ttl => b"TTL",
            CommandName::Other(name) => name.as_bytes(),
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandName::Other(name) => f.write_str(name),
            fixed => f.write_str(std::str::from_utf8(fixed.as_bytes()).unwrap_or("?")),
        }
    }
}

/// One command and its arguments.
#[derive(Debug, Clone)]
pub struct Command {
    name: CommandName,
    args: Vec<Bytes>,
}

impl Command {
    pub fn get(key: &[u8]) -> Self {
        Command {
            name: CommandName::Get,
            args: vec![Bytes::copy_from_slice(key)],
        }
    }

    pub fn set(key: &[u8], value: &[u8]) -> Self {
        Command {
            name: CommandName::Set,
            args: vec![Bytes::copy_from_slice(key), Bytes::copy_from_slice(value)],
        }
    }

    pub fn del(key: &[u8]) -> Self {
        Command {
            name: CommandName::Del,
            args: vec![Bytes::copy_from_slice(key)],
        }
    }

    pub fn expire(key: &[u8], seconds: u64) -> Self {
        Command {
            name: CommandName::Expire,
            args: vec![
                Bytes::copy_from_slice(key),
                Bytes::from(seconds.to_string()),
            ],
        }
    }

    pub fn ttl(key: &[u8]) -> Self {
        Command {
            name: CommandName::Ttl,
            args: vec![Bytes::copy_from_slice(key)],
        }
    }

    /// Builds a pass-through command with an arbitrary name.
    pub fn other(name: &str, args: &[&[u8]]) -> Self {
        Command {
            name: CommandName::Other(name.to_string()),
            args: args.iter().map(|arg| Bytes::copy_from_slice(arg)).collect(),
        }
    }

    pub fn name(&self) -> &CommandName {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Encodes the command as a RESP2 array into `out`.
    pub(crate) fn encode(&self, out: &mut BytesMut) {
        let mut wire: Vec<&[u8]> = Vec::with_capacity(1 + self.args.len());
        wire.push(self.name.as_bytes());
        for arg in &self.args {
            wire.push(arg);
        }
        encode_command(&wire, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_name_and_args_in_order() {
        let mut buf = BytesMut::new();
        Command::set(b"k", b"v").encode(&mut buf);
        assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[test]
    fn expire_carries_seconds_as_text() {
        let cmd = Command::expire(b"k", 90);
        assert_eq!(cmd.args()[1], Bytes::from_static(b"90"));
    }

    #[test]
    fn pass_through_keeps_arbitrary_names() {
        let cmd = Command::other("INCR", &[b"counter"]);
        assert_eq!(cmd.name().as_bytes(), b"INCR");
        assert_eq!(cmd.name().to_string(), "INCR");
        assert_eq!(cmd.args().len(), 1);
    }
}
