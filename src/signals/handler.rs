/*!
 * Signal Handler Bridge
 *
 * Turns asynchronous signal delivery into a channel message.
 *
 * The installed handler runs in signal context, so it only records the
 * first signal number in an atomic and writes one byte to a self-pipe. A
 * relay thread reads the pipe, logs the signal and forwards it on a
 * `flume` channel that the monitor selects on.
 */

use super::TerminationSignal;
use crate::errors::{MonitorError, MonitorResult};
use flume::{Receiver, Sender};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::libc;
use nix::sys::signal::SigHandler;
use nix::unistd::pipe;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Write end of the self-pipe, or -1 while no bridge is open
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

/// First signal number seen since the bridge opened, 0 if none
static FIRST_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_termination_signal(signum: libc::c_int) {
    let saved_errno = Errno::last_raw();

    let _ = FIRST_SIGNAL.compare_exchange(0, signum, Ordering::SeqCst, Ordering::SeqCst);

    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        // SAFETY: the bridge closes this fd only after clearing WAKE_FD and
        // after the handler has been uninstalled
        let wake = unsafe { BorrowedFd::borrow_raw(fd) };
        let _ = nix::unistd::write(wake, &[signum as u8]);
    }

    Errno::set_raw(saved_errno);
}

/// Open self-pipe plus relay thread
pub struct SignalBridge {
    receiver: Receiver<TerminationSignal>,
    wake: Option<OwnedFd>,
    relay: Option<JoinHandle<()>>,
}

impl SignalBridge {
    /// Create the pipe and start the relay thread.
    ///
    /// Must be opened before the handler is installed so no signal finds
    /// the pipe missing.
    pub fn open() -> MonitorResult<Self> {
        let (read_end, write_end) = pipe().map_err(|e| MonitorError::WakeChannel(e.into()))?;
        configure_pipe(&read_end, &write_end).map_err(|e| MonitorError::WakeChannel(e.into()))?;

        let (sender, receiver) = flume::unbounded();
        let reader = File::from(read_end);
        let relay = thread::Builder::new()
            .name("signal-relay".into())
            .spawn(move || relay_loop(reader, sender))
            .map_err(MonitorError::WakeChannel)?;

        FIRST_SIGNAL.store(0, Ordering::SeqCst);
        WAKE_FD.store(write_end.as_raw_fd(), Ordering::SeqCst);

        Ok(Self {
            receiver,
            wake: Some(write_end),
            relay: Some(relay),
        })
    }

    /// Handler to install for the intercepted signals
    pub fn handler() -> SigHandler {
        SigHandler::Handler(on_termination_signal)
    }

    /// Signals relayed out of handler context, in arrival order
    pub fn receiver(&self) -> &Receiver<TerminationSignal> {
        &self.receiver
    }

    /// The first signal caught since the bridge opened
    pub fn first_signal(&self) -> Option<TerminationSignal> {
        TerminationSignal::from_number(FIRST_SIGNAL.load(Ordering::SeqCst))
    }

    /// Close the pipe and wait for the relay thread to drain it
    pub fn shutdown(&mut self) {
        WAKE_FD.store(-1, Ordering::SeqCst);
        // Closing the write end gives the relay EOF
        drop(self.wake.take());

        if let Some(relay) = self.relay.take() {
            if relay.join().is_err() {
                warn!("Signal relay thread panicked");
            }
        }
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        if self.relay.is_some() {
            self.shutdown();
        }
    }
}

fn configure_pipe(read_end: &OwnedFd, write_end: &OwnedFd) -> nix::Result<()> {
    fcntl(read_end.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    fcntl(write_end.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    // A full pipe must never block the handler
    fcntl(write_end.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;
    Ok(())
}

fn relay_loop(mut reader: File, sender: Sender<TerminationSignal>) {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let Some(signal) = TerminationSignal::from_number(buf[0] as i32) else {
                    debug!(signum = buf[0], "Ignoring unexpected wake-up byte");
                    continue;
                };
                warn!(signal = %signal, "Signal received: {}", signal.name());
                if sender.send(signal).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "Signal relay stopped reading");
                break;
            }
        }
    }
    debug!("Signal relay exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    #[serial]
    fn test_handler_wakes_relay() {
        let mut bridge = SignalBridge::open().unwrap();
        assert_eq!(bridge.first_signal(), None);

        // Invoke the handler directly; no disposition change needed
        on_termination_signal(libc::SIGTERM);
        on_termination_signal(libc::SIGINT);

        let first = bridge.receiver().recv_timeout(Duration::from_secs(2)).unwrap();
        let second = bridge.receiver().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, TerminationSignal::Terminate);
        assert_eq!(second, TerminationSignal::Interrupt);

        // Only the first one is remembered as the trigger
        assert_eq!(bridge.first_signal(), Some(TerminationSignal::Terminate));

        bridge.shutdown();
        assert!(bridge.relay.is_none());
    }

    #[test]
    #[serial]
    fn test_handler_without_bridge_is_harmless() {
        WAKE_FD.store(-1, Ordering::SeqCst);
        on_termination_signal(libc::SIGTERM);
        FIRST_SIGNAL.store(0, Ordering::SeqCst);
    }
}
