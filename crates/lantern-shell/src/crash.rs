//! Local crash capture.
//!
//! Installing a [`CrashCapture`] opens `<crash dir>/lantern-<pid>.dmp` and
//! registers handlers for the fatal signals plus a panic hook. The signal
//! handler runs in an async-signal context: it formats a line into a stack
//! buffer, writes it to the descriptor opened at install time, restores the
//! default disposition and re-raises so the operating system's own crash
//! handling still follows. The panic hook records panics of the installing
//! thread only; worker thread panics are logged instead. Uninstalling
//! restores whatever was registered before and removes the dump when nothing
//! was written to it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::panic::{self, PanicHookInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::thread;

use lantern_config::APP_NAME;
use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use thiserror::Error;
use tracing::{info, warn};

const CRASH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::crash");

const FATAL_SIGNALS: [Signal; 5] = [
    Signal::SIGSEGV,
    Signal::SIGILL,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGABRT,
];

static CAPTURE_ACTIVE: AtomicBool = AtomicBool::new(false);
static DUMP_FD: AtomicI32 = AtomicI32::new(-1);
static CAPTURE_PID: AtomicU32 = AtomicU32::new(0);

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Errors raised while installing crash capture.
#[derive(Debug, Error)]
pub enum CrashCaptureError {
    /// Crash capture is already active in this process.
    #[error("crash capture is already installed")]
    AlreadyInstalled,
    /// The crash directory could not be created.
    #[error("failed to create crash directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The dump file could not be opened.
    #[error("failed to open crash dump '{path}': {source}")]
    OpenDump {
        /// Dump file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Registering a signal handler failed.
    #[error("failed to install handler for {signal}: {source}")]
    Signal {
        /// Signal whose handler could not be registered.
        signal: Signal,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

/// Installed crash handlers. Dropping the value uninstalls them.
pub struct CrashCapture {
    dump_path: PathBuf,
    dump: Option<File>,
    previous_actions: Vec<(Signal, SigAction)>,
    previous_hook: Option<Arc<PanicHook>>,
}

impl CrashCapture {
    /// Installs signal handlers and the panic hook, writing dumps into
    /// `crash_dir`.
    pub fn install(crash_dir: &Path) -> Result<Self, CrashCaptureError> {
        if CAPTURE_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(CrashCaptureError::AlreadyInstalled);
        }
        Self::install_handlers(crash_dir).inspect_err(|_| {
            CAPTURE_ACTIVE.store(false, Ordering::SeqCst);
        })
    }

    fn install_handlers(crash_dir: &Path) -> Result<Self, CrashCaptureError> {
        fs::create_dir_all(crash_dir).map_err(|source| CrashCaptureError::CreateDirectory {
            path: crash_dir.to_path_buf(),
            source,
        })?;
        let pid = std::process::id();
        let dump_path = crash_dir.join(format!("{APP_NAME}-{pid}.dmp"));
        let dump = open_dump(&dump_path).map_err(|source| CrashCaptureError::OpenDump {
            path: dump_path.clone(),
            source,
        })?;
        let hook_sink = dump
            .try_clone()
            .map_err(|source| CrashCaptureError::OpenDump {
                path: dump_path.clone(),
                source,
            })?;

        CAPTURE_PID.store(pid, Ordering::SeqCst);
        DUMP_FD.store(dump.as_raw_fd(), Ordering::SeqCst);
        let mut capture = Self {
            dump_path,
            dump: Some(dump),
            previous_actions: Vec::with_capacity(FATAL_SIGNALS.len()),
            previous_hook: None,
        };

        // On failure `capture` drops here and restores the handlers already
        // registered.
        let action = SigAction::new(
            SigHandler::Handler(record_fatal_signal),
            SaFlags::SA_RESETHAND | SaFlags::SA_ONSTACK,
            SigSet::empty(),
        );
        for signal in FATAL_SIGNALS {
            // SAFETY: the handler only touches atomics and async-signal-safe
            // libc calls.
            let previous = unsafe { sigaction(signal, &action) }
                .map_err(|source| CrashCaptureError::Signal { signal, source })?;
            capture.previous_actions.push((signal, previous));
        }

        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let chained = Arc::clone(&previous);
        let owner = thread::current().id();
        panic::set_hook(Box::new(move |info| {
            // Only the bootstrap thread unwinding ends the process; a panic
            // on a worker thread only ends that thread.
            if thread::current().id() == owner {
                let _ = writeln!(&hook_sink, "{APP_NAME} crash: panic: {info}");
                let _ = hook_sink.sync_data();
            } else {
                warn!(
                    target: CRASH_TARGET,
                    thread = thread::current().name().unwrap_or("unnamed"),
                    panic = %info,
                    "worker thread panicked"
                );
            }
            chained(info);
        }));
        capture.previous_hook = Some(previous);

        info!(
            target: CRASH_TARGET,
            dump = %capture.dump_path.display(),
            "crash capture installed"
        );
        Ok(capture)
    }

    /// Path of the dump file for this process.
    #[must_use]
    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    /// Returns whether the handlers are still installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.dump.is_some()
    }

    /// Restores the previous handlers. Calling it again does nothing.
    pub fn uninstall(&mut self) {
        let Some(dump) = self.dump.take() else {
            return;
        };

        for (signal, action) in self.previous_actions.drain(..).rev() {
            // SAFETY: restores a disposition previously returned by the OS.
            if let Err(errno) = unsafe { sigaction(signal, &action) } {
                warn!(
                    target: CRASH_TARGET,
                    %signal,
                    error = %errno,
                    "failed to restore signal disposition"
                );
            }
        }
        if let Some(previous) = self.previous_hook.take() {
            drop(panic::take_hook());
            panic::set_hook(Box::new(move |info| previous(info)));
        }

        DUMP_FD.store(-1, Ordering::SeqCst);
        let written = dump.metadata().map_or(0, |metadata| metadata.len());
        drop(dump);
        if written == 0 {
            if let Err(error) = fs::remove_file(&self.dump_path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: CRASH_TARGET,
                    dump = %self.dump_path.display(),
                    error = %error,
                    "failed to remove empty crash dump"
                );
            }
        } else {
            warn!(
                target: CRASH_TARGET,
                dump = %self.dump_path.display(),
                bytes = written,
                "crash dump retained"
            );
        }
        CAPTURE_ACTIVE.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for CrashCapture {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CrashCapture")
            .field("dump_path", &self.dump_path)
            .field("installed", &self.is_installed())
            .field("previous_actions", &self.previous_actions)
            .finish_non_exhaustive()
    }
}

impl Drop for CrashCapture {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn open_dump(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Install/uninstall seam used by the bootstrap sequence.
pub trait FaultHandler: Send {
    /// Installs crash capture writing into `crash_dir`.
    fn install(&mut self, crash_dir: &Path) -> Result<(), CrashCaptureError>;

    /// Removes crash capture. Must be idempotent.
    fn uninstall(&mut self);
}

/// [`FaultHandler`] backed by [`CrashCapture`].
#[derive(Debug, Default)]
pub struct SystemFaultHandler {
    capture: Option<CrashCapture>,
}

impl FaultHandler for SystemFaultHandler {
    fn install(&mut self, crash_dir: &Path) -> Result<(), CrashCaptureError> {
        self.capture = Some(CrashCapture::install(crash_dir)?);
        Ok(())
    }

    fn uninstall(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.uninstall();
        }
    }
}

extern "C" fn record_fatal_signal(signal: libc::c_int) {
    let fd = DUMP_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let report = signal_report(signal, CAPTURE_PID.load(Ordering::SeqCst));
        let bytes = report.as_bytes();
        // SAFETY: write(2) and fsync(2) are async-signal-safe and the
        // descriptor stays open while the handler is registered.
        unsafe {
            libc::write(fd, bytes.as_ptr().cast(), bytes.len());
            libc::fsync(fd);
        }
    }
    // SAFETY: both calls are async-signal-safe.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        libc::raise(signal);
    }
}

/// Fixed-capacity line assembled without allocating.
struct StackLine {
    buffer: [u8; 128],
    len: usize,
}

impl StackLine {
    const fn new() -> Self {
        Self {
            buffer: [0; 128],
            len: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        for byte in bytes {
            let Some(slot) = self.buffer.get_mut(self.len) else {
                return;
            };
            *slot = *byte;
            self.len += 1;
        }
    }

    fn push_decimal(&mut self, mut value: u64) {
        let mut digits = [0_u8; 20];
        let mut count = 0;
        loop {
            if let Some(slot) = digits.get_mut(count) {
                *slot = b'0' + (value % 10) as u8;
            }
            count += 1;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        for index in (0..count).rev() {
            if let Some(digit) = digits.get(index) {
                self.push(&[*digit]);
            }
        }
    }

    fn as_bytes(&self) -> &[u8] {
        self.buffer.get(..self.len).unwrap_or_default()
    }
}

fn signal_report(signal: libc::c_int, pid: u32) -> StackLine {
    let mut line = StackLine::new();
    line.push(APP_NAME.as_bytes());
    line.push(b" crash: fatal signal ");
    line.push(signal_name(signal));
    line.push(b" (");
    line.push_decimal(u64::try_from(signal).unwrap_or_default());
    line.push(b") in pid ");
    line.push_decimal(u64::from(pid));
    line.push(b"\n");
    line
}

fn signal_name(signal: libc::c_int) -> &'static [u8] {
    match signal {
        libc::SIGSEGV => b"SIGSEGV",
        libc::SIGILL => b"SIGILL",
        libc::SIGBUS => b"SIGBUS",
        libc::SIGFPE => b"SIGFPE",
        libc::SIGABRT => b"SIGABRT",
        _ => b"UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};
    use std::sync::{Mutex, PoisonError};

    // Crash capture is process-wide; tests installing it run one at a time.
    static INSTALL_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn signal_reports_name_number_and_pid() {
        let report = signal_report(libc::SIGSEGV, 4321);
        let text = String::from_utf8_lossy(report.as_bytes()).into_owned();
        assert_eq!(
            text,
            format!("lantern crash: fatal signal SIGSEGV ({}) in pid 4321\n", libc::SIGSEGV)
        );
    }

    #[test]
    fn stack_lines_truncate_instead_of_overflowing() {
        let mut line = StackLine::new();
        for _ in 0..40 {
            line.push(b"abcdef");
        }
        assert_eq!(line.as_bytes().len(), 128);
    }

    #[test]
    fn uninstall_removes_an_empty_dump() {
        let _serial = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().expect("temp dir");

        let mut capture = CrashCapture::install(dir.path()).expect("install crash capture");
        let dump = capture.dump_path().to_path_buf();
        assert!(dump.exists(), "dump file is opened at install time");

        capture.uninstall();
        capture.uninstall();
        assert!(!capture.is_installed());
        assert!(!dump.exists(), "an empty dump should be removed");
    }

    #[test]
    fn a_second_installation_is_rejected() {
        let _serial = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().expect("temp dir");

        let _capture = CrashCapture::install(dir.path()).expect("install crash capture");
        let error = CrashCapture::install(dir.path()).expect_err("second install must fail");

        assert!(matches!(error, CrashCaptureError::AlreadyInstalled));
    }

    fn explode() -> u8 {
        panic!("renderer exploded")
    }

    #[test]
    fn panics_are_written_to_the_dump() {
        let _serial = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().expect("temp dir");

        let mut capture = CrashCapture::install(dir.path()).expect("install crash capture");
        let outcome = panic::catch_unwind(explode);
        assert!(outcome.is_err());
        capture.uninstall();

        let contents = fs::read_to_string(capture.dump_path()).expect("dump retained");
        assert!(contents.contains("panic"), "{contents}");
        assert!(contents.contains("renderer exploded"), "{contents}");
    }

    #[test]
    fn worker_thread_panics_leave_the_dump_empty() {
        let _serial = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().expect("temp dir");

        let mut capture = CrashCapture::install(dir.path()).expect("install crash capture");
        let worker = thread::spawn(explode);
        assert!(worker.join().is_err());
        let dump = capture.dump_path().to_path_buf();
        capture.uninstall();

        assert!(!dump.exists(), "a worker panic is not a crash");
    }

    #[test]
    fn a_fatal_signal_is_recorded_before_the_process_dies() {
        let _serial = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().expect("temp dir");

        // SAFETY: the child only installs the handlers and raises a signal
        // before it terminates.
        let child = match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                let no_core = libc::rlimit {
                    rlim_cur: 0,
                    rlim_max: 0,
                };
                // SAFETY: plain syscalls in the forked child.
                unsafe { libc::setrlimit(libc::RLIMIT_CORE, &no_core) };
                let status = match CrashCapture::install(dir.path()) {
                    Ok(capture) => {
                        // SAFETY: raising a signal in the forked child.
                        unsafe { libc::raise(libc::SIGSEGV) };
                        drop(capture);
                        3
                    }
                    Err(_) => 2,
                };
                // SAFETY: leaves the forked child without running test
                // harness destructors.
                unsafe { libc::_exit(status) }
            }
            ForkResult::Parent { child } => child,
        };

        let status = waitpid(child, None).expect("wait for child");
        assert!(
            matches!(status, WaitStatus::Signaled(pid, Signal::SIGSEGV, _) if pid == child),
            "{status:?}"
        );
        let dump = dir.path().join(format!("{APP_NAME}-{child}.dmp"));
        let contents = fs::read_to_string(&dump).expect("dump retained");
        assert_eq!(
            contents,
            format!(
                "lantern crash: fatal signal SIGSEGV ({}) in pid {child}\n",
                libc::SIGSEGV
            )
        );
    }

    #[test]
    fn missing_crash_directory_parent_is_reported() {
        let _serial = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").expect("write blocker");

        let error = CrashCapture::install(&blocker.join("crashes")).expect_err("must fail");

        assert!(matches!(error, CrashCaptureError::CreateDirectory { .. }));
        let retry = CrashCapture::install(dir.path()).expect("failed install must not linger");
        drop(retry);
    }
}
