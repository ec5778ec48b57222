/*!
 * Guarded Execution
 *
 * `run` executes the block on a worker thread so the calling thread can wait
 * on either completion or an intercepted signal. A signal therefore becomes
 * a release trigger without unwinding through the block.
 */

use super::outcome::{MonitorExit, ReleaseTrigger};
use super::TerminationMonitor;
use crate::errors::MonitorError;
use crate::signals::TerminationSignal;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, warn};

/// What the worker thread sends back
enum Completion<T, E> {
    Returned(Result<T, E>),
    Panicked(Box<dyn Any + Send>),
}

/// Result of waiting on the worker and the signal relay together
enum Wake<T, E> {
    Done(Completion<T, E>),
    Signal(TerminationSignal),
    Lost,
}

impl TerminationMonitor {
    /// Run `block` under the monitor.
    ///
    /// - `Ok` value: reported as success and returned
    /// - `Err` value: reported as a crash and returned in [`MonitorExit::Failed`]
    /// - panic: reported as a crash, then the panic resumes on this thread
    /// - SIGINT/SIGTERM: reported, then re-delivered under the restored prior
    ///   disposition; if the process survives that, [`MonitorExit::Signaled`]
    ///
    /// A block cannot be stopped from outside its thread. When the process
    /// survives a re-delivered signal, `run` returns `Signaled` at once and
    /// the block keeps running, detached, until it returns on its own; its
    /// result is then discarded. Blocks that must stop cooperatively should
    /// use [`TerminationMonitor::acquire`] and poll
    /// [`crate::ArmedGuard::pending_signal`] instead.
    pub fn run<F, T, E>(&self, block: F) -> Result<T, MonitorExit<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + fmt::Debug + Send + 'static,
    {
        let guard = self.acquire().map_err(MonitorExit::Setup)?;

        let (done_tx, done_rx) = flume::bounded::<Completion<T, E>>(1);
        let spawned = thread::Builder::new()
            .name("monitored-block".to_string())
            .spawn(move || {
                let completion = match panic::catch_unwind(AssertUnwindSafe(block)) {
                    Ok(result) => Completion::Returned(result),
                    Err(payload) => Completion::Panicked(payload),
                };
                // The caller may have stopped listening after a signal
                let _ = done_tx.send(completion);
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                guard.release(ReleaseTrigger::Failed {
                    description: format!("failed to start guarded block: {e}"),
                });
                return Err(MonitorExit::Setup(MonitorError::Spawn(e)));
            }
        };

        let wake = flume::Selector::new()
            .recv(&done_rx, |completion| match completion {
                Ok(completion) => Wake::Done(completion),
                Err(_) => Wake::Lost,
            })
            .recv(guard.signals(), |signal| match signal {
                Ok(signal) => Wake::Signal(signal),
                // Relay gone: only completion can end the wait now
                Err(_) => match done_rx.recv() {
                    Ok(completion) => Wake::Done(completion),
                    Err(_) => Wake::Lost,
                },
            })
            .wait();

        match wake {
            Wake::Done(completion) => {
                if worker.join().is_err() {
                    debug!("Monitored block thread ended abnormally after reporting");
                }
                match completion {
                    Completion::Returned(Ok(value)) => {
                        guard.release(ReleaseTrigger::Completed);
                        Ok(value)
                    }
                    Completion::Returned(Err(error)) => {
                        guard.release(ReleaseTrigger::failed(&error));
                        Err(MonitorExit::Failed(error))
                    }
                    Completion::Panicked(payload) => {
                        guard.release(ReleaseTrigger::panicked(&*payload));
                        panic::resume_unwind(payload)
                    }
                }
            }
            Wake::Signal(signal) => {
                guard.release(ReleaseTrigger::Signal(signal));
                warn!(signal = %signal, "Process survived re-delivered signal");
                Err(MonitorExit::Signaled(signal))
            }
            Wake::Lost => {
                guard.release(ReleaseTrigger::Failed {
                    description: "guarded block thread exited without a result".to_string(),
                });
                Err(MonitorExit::Setup(MonitorError::WorkerLost))
            }
        }
    }
}
