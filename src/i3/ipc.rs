//! Low-level i3 IPC framing.
//!
//! Communicates directly with i3 (or sway) through the Unix socket named
//! by `$I3SOCK` / `$SWAYSOCK`, avoiding any shell command invocation or
//! third-party crate for socket discovery.
//!
//! Every message is framed as:
//!
//! ```text
//! "i3-ipc" <payload length: u32> <message type: u32> <payload>
//! ```
//!
//! with the integers in the host's native byte order, as the protocol
//! specifies.  Replies use the same framing; events are replies with the
//! high bit of the message type set.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Frame magic preceding every message.
pub const MAGIC: &[u8; 6] = b"i3-ipc";

/// Bit set on the message type of asynchronous events.
pub const EVENT_BIT: u32 = 1 << 31;

pub const RUN_COMMAND: u32 = 0;
pub const GET_WORKSPACES: u32 = 1;
pub const SUBSCRIBE: u32 = 2;
pub const GET_OUTPUTS: u32 = 3;
pub const GET_TREE: u32 = 4;

/// Event type of workspace events (with [`EVENT_BIT`] masked off).
pub const WORKSPACE_EVENT: u32 = 0;

/// Errors that can occur when talking to the i3 socket.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("neither I3SOCK nor SWAYSOCK is set")]
    SocketPathUnset,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed reply: {0}")]
    Protocol(String),
    #[error("reply is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Resolve the window manager's command socket path from the environment.
fn socket_path() -> Result<PathBuf, IpcError> {
    std::env::var("I3SOCK")
        .or_else(|_| std::env::var("SWAYSOCK"))
        .map(PathBuf::from)
        .map_err(|_| IpcError::SocketPathUnset)
}

/// A framed connection to the window manager.
///
/// The stream stays open across requests; the [server](crate::server)
/// keeps one warm for its whole lifetime.
pub struct Connection {
    stream: UnixStream,
}

impl Connection {
    /// Connect to the socket advertised by the environment.
    pub fn connect() -> Result<Self, IpcError> {
        let path = socket_path()?;
        Ok(Self {
            stream: UnixStream::connect(path)?,
        })
    }

    /// Wrap an existing stream (used by tests with a socket pair).
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Write one framed message.
    pub fn send(&mut self, message_type: u32, payload: &str) -> Result<(), IpcError> {
        let mut frame = Vec::with_capacity(MAGIC.len() + 8 + payload.len());
        frame.extend_from_slice(MAGIC);
        frame.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
        frame.extend_from_slice(&message_type.to_ne_bytes());
        frame.extend_from_slice(payload.as_bytes());
        self.stream.write_all(&frame)?;
        Ok(())
    }

    /// Read one framed message, returning its type and payload.
    pub fn recv(&mut self) -> Result<(u32, String), IpcError> {
        let mut header = [0u8; 14];
        self.stream.read_exact(&mut header)?;
        if &header[..6] != MAGIC {
            return Err(IpcError::Protocol("bad frame magic".to_string()));
        }
        let length = u32::from_ne_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let message_type = u32::from_ne_bytes([header[10], header[11], header[12], header[13]]);
        let mut payload = vec![0u8; length];
        self.stream.read_exact(&mut payload)?;
        Ok((message_type, String::from_utf8(payload)?))
    }

    /// Send a request and return the matching reply payload, skipping any
    /// interleaved events.
    pub fn request(&mut self, message_type: u32, payload: &str) -> Result<String, IpcError> {
        self.send(message_type, payload)?;
        loop {
            let (reply_type, body) = self.recv()?;
            if reply_type & EVENT_BIT != 0 {
                continue;
            }
            if reply_type != message_type {
                return Err(IpcError::Protocol(format!(
                    "reply type {} does not match request type {}",
                    reply_type, message_type
                )));
            }
            return Ok(body);
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_over_a_socket_pair() {
        let (a, b) = UnixStream::pair().expect("socket pair");
        let mut sender = Connection::from_stream(a);
        let mut receiver = Connection::from_stream(b);

        sender.send(GET_WORKSPACES, "").unwrap();
        sender.send(RUN_COMMAND, "workspace \"1\"").unwrap();

        assert_eq!(receiver.recv().unwrap(), (GET_WORKSPACES, String::new()));
        assert_eq!(
            receiver.recv().unwrap(),
            (RUN_COMMAND, "workspace \"1\"".to_string())
        );
    }

    #[test]
    fn frame_layout_matches_the_protocol() {
        let (a, mut b) = UnixStream::pair().expect("socket pair");
        let mut sender = Connection::from_stream(a);
        sender.send(SUBSCRIBE, "[\"workspace\"]").unwrap();

        let mut buffer = vec![0u8; 14 + 13];
        b.read_exact(&mut buffer).unwrap();
        assert_eq!(&buffer[..6], MAGIC);
        assert_eq!(u32::from_ne_bytes([buffer[6], buffer[7], buffer[8], buffer[9]]), 13);
        assert_eq!(
            u32::from_ne_bytes([buffer[10], buffer[11], buffer[12], buffer[13]]),
            SUBSCRIBE
        );
        assert_eq!(&buffer[14..], b"[\"workspace\"]");
    }

    #[test]
    fn request_skips_interleaved_events() {
        let (a, b) = UnixStream::pair().expect("socket pair");
        let mut client = Connection::from_stream(a);
        let mut peer = Connection::from_stream(b);

        let handle = std::thread::spawn(move || {
            let (message_type, _) = peer.recv().unwrap();
            assert_eq!(message_type, GET_OUTPUTS);
            // An event arrives before the actual reply.
            peer.send(EVENT_BIT | WORKSPACE_EVENT, "{\"change\":\"focus\"}")
                .unwrap();
            peer.send(GET_OUTPUTS, "[]").unwrap();
        });

        let body = client.request(GET_OUTPUTS, "").unwrap();
        assert_eq!(body, "[]");
        handle.join().unwrap();
    }

    #[test]
    fn bad_magic_is_a_protocol_error() {
        let (a, mut b) = UnixStream::pair().expect("socket pair");
        let mut client = Connection::from_stream(a);
        b.write_all(b"not-i3-ipc-data").unwrap();
        assert!(matches!(client.recv(), Err(IpcError::Protocol(_))));
    }
}
