//! Listener accepting activation requests on behalf of the primary instance.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::INSTANCE_TARGET;
use super::activation::{
    ACK_INVALID, ACK_OK, ActivationAck, ActivationRequest, ActivationSink, MAX_MESSAGE_BYTES,
};
use super::errors::ListenerError;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound, not yet running, activation listener.
#[derive(Debug)]
pub struct ActivationListener {
    path: PathBuf,
    listener: UnixListener,
}

impl ActivationListener {
    /// Binds the socket at `path`, replacing a stale socket left by a
    /// crashed owner.
    pub fn bind(path: &Path) -> Result<Self, ListenerError> {
        let listener = bind_unix(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            listener,
        })
    }

    /// Starts accepting connections on a background thread.
    pub fn start(self, sink: Arc<dyn ActivationSink>) -> Result<ActivationListenerHandle, ListenerError> {
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_socket(&self.path);
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || run_accept_loop(&self, &shutdown_flag, &sink));
        Ok(ActivationListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept thread.
#[derive(Debug)]
pub struct ActivationListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ActivationListenerHandle {
    /// Asks the accept loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ActivationListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &ActivationListener,
    shutdown: &AtomicBool,
    sink: &Arc<dyn ActivationSink>,
) {
    info!(
        target: INSTANCE_TARGET,
        socket = %listener.path.display(),
        "activation listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.listener.accept() {
            Ok((stream, _)) => {
                last_error = None;
                let sink = Arc::clone(sink);
                thread::spawn(move || handle_connection(stream, sink.as_ref()));
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: INSTANCE_TARGET,
                        error = %error,
                        "activation accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    cleanup_socket(&listener.path);
}

fn handle_connection(stream: UnixStream, sink: &dyn ActivationSink) {
    if let Err(error) = serve_request(&stream, sink) {
        warn!(
            target: INSTANCE_TARGET,
            error = %error,
            "activation connection error"
        );
    }
}

fn serve_request(stream: &UnixStream, sink: &dyn ActivationSink) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CONNECTION_TIMEOUT))?;
    stream.set_write_timeout(Some(CONNECTION_TIMEOUT))?;

    let Some(line) = read_request_line(stream)? else {
        debug!(target: INSTANCE_TARGET, "activation connection closed without a request");
        return Ok(());
    };

    let status = match serde_json::from_str::<ActivationRequest>(line.trim()) {
        Ok(request) => {
            info!(
                target: INSTANCE_TARGET,
                pid = request.pid,
                show = request.show,
                arguments = request.arguments.len(),
                "activation received"
            );
            sink.deliver(request);
            ACK_OK
        }
        Err(error) => {
            warn!(
                target: INSTANCE_TARGET,
                error = %error,
                "discarding malformed activation request"
            );
            ACK_INVALID
        }
    };

    let mut reply = serde_json::to_vec(&ActivationAck {
        status: status.to_owned(),
    })?;
    reply.push(b'\n');
    let mut writer = stream;
    writer.write_all(&reply)?;
    writer.flush()
}

fn read_request_line(stream: &UnixStream) -> io::Result<Option<String>> {
    let mut line = String::new();
    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_BYTES + 1));
    let read = reader.read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.len() as u64 > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "activation request exceeds maximum size",
        ));
    }
    Ok(Some(line))
}

fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| ListenerError::Metadata {
            path: path.display().to_string(),
            source,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::NotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::InUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::Cleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::Connect {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        path: path.display().to_string(),
        source,
    })
}

fn cleanup_socket(path: &Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: INSTANCE_TARGET,
            error = %error,
            path = %path.display(),
            "failed to remove activation socket"
        );
    }
}
