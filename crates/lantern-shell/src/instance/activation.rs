//! Activation requests: the payload a second launch forwards to the running
//! instance, and the client side of the channel.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use socket2::{Domain, SockAddr, Socket, Type};

pub(super) const MAX_MESSAGE_BYTES: u64 = 64 * 1024;
pub(super) const ACK_OK: &str = "ok";
pub(super) const ACK_INVALID: &str = "invalid";

/// Intent forwarded by a secondary launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    /// PID of the forwarding process.
    pub pid: u32,
    /// Raw pass-through arguments of the forwarding process.
    pub arguments: Vec<String>,
    /// False when the forwarding process was launched hidden.
    pub show: bool,
}

impl ActivationRequest {
    /// Builds the request for the current process.
    #[must_use]
    pub fn for_current_process(arguments: &[OsString], show: bool) -> Self {
        Self {
            pid: std::process::id(),
            arguments: arguments
                .iter()
                .map(|argument| argument.to_string_lossy().into_owned())
                .collect(),
            show,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ActivationAck {
    pub(super) status: String,
}

/// Consumer of requests received by the primary instance.
pub trait ActivationSink: Send + Sync + 'static {
    /// Hands a received request over. Must not block.
    fn deliver(&self, request: ActivationRequest);
}

/// Result of forwarding a request to a running instance.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// The running instance acknowledged the request.
    Delivered,
    /// Nothing answered within the timeout.
    Unreachable(io::Error),
}

/// Sends `request` over the activation socket, waiting at most `timeout`
/// for each of connect, write and acknowledgement.
#[must_use]
pub fn send_activation(
    socket: &Path,
    request: &ActivationRequest,
    timeout: Duration,
) -> ActivationOutcome {
    match try_send(socket, request, timeout) {
        Ok(()) => ActivationOutcome::Delivered,
        Err(error) => ActivationOutcome::Unreachable(error),
    }
}

fn try_send(path: &Path, request: &ActivationRequest, timeout: Duration) -> io::Result<()> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)?;
    let mut stream: UnixStream = socket.into();
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    stream.write_all(&payload)?;
    stream.flush()?;

    let mut line = String::new();
    BufReader::new((&stream).take(MAX_MESSAGE_BYTES)).read_line(&mut line)?;
    let ack: ActivationAck = serde_json::from_str(line.trim())?;
    if ack.status == ACK_OK {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("activation rejected with status '{}'", ack.status),
        ))
    }
}
