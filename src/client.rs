//! Built-in client for the [command server](crate::server).
//!
//! The original tool preferred an external socket relay (socat, nc) over
//! its own client because interpreter startup dominated; a compiled client
//! has no such cost, so the strategy selection collapses to this one path.

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Errors produced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach server: {0}")]
    Io(#[from] std::io::Error),
}

/// Send one command (as argv tokens) to the server at `path` and return
/// its textual response.
///
/// A response starting with `error:` signals a failed command; the caller
/// maps it to a non-zero exit.
pub fn send_command(path: &Path, args: &[String]) -> Result<String, ClientError> {
    let mut stream = UnixStream::connect(path)?;
    stream.write_all(args.join("\n").as_bytes())?;
    stream.shutdown(Shutdown::Write)?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}
