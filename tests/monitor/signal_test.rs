/*!
 * Signal Tests
 *
 * SIGINT/SIGTERM raised inside the guarded block. Each test installs a
 * counting prior handler so the re-delivered signal is observable instead
 * of ending the test process.
 */

use super::{recording_monitor, PriorHandler};
use nix::sys::signal::{raise, Signal};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use termination_monitor::{current_disposition, MonitorExit, SignalDisposition, TerminationSignal};

/// Block that raises `signal` on its own thread, then keeps working
fn raising(signal: Signal) -> impl FnOnce() -> Result<(), String> + Send + 'static {
    move || {
        raise(signal).map_err(|e| e.to_string())?;
        thread::sleep(Duration::from_secs(2));
        Ok(())
    }
}

#[test]
#[serial]
fn test_sigterm_reports_external_termination() {
    let prior = PriorHandler::counting(Signal::SIGTERM);
    let before = current_disposition(TerminationSignal::Terminate).unwrap();
    let (monitor, recorder) = recording_monitor(false);

    let exit = monitor.run(raising(Signal::SIGTERM)).unwrap_err();

    assert!(matches!(exit, MonitorExit::Signaled(TerminationSignal::Terminate)));
    assert_eq!(prior.hits(), 1, "prior handler sees the signal exactly once");
    assert_eq!(current_disposition(TerminationSignal::Terminate).unwrap(), before);

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[ALERT] Your Program is Terminated: Terminated by SIGTERM");
    assert!(sent[0].body.contains("Process terminated by signal SIGTERM."));
}

#[test]
#[serial]
fn test_sigint_reports_user_interrupt() {
    let prior = PriorHandler::counting(Signal::SIGINT);
    let before = current_disposition(TerminationSignal::Interrupt).unwrap();
    let (monitor, recorder) = recording_monitor(false);

    let exit = monitor.run(raising(Signal::SIGINT)).unwrap_err();

    assert!(matches!(exit, MonitorExit::Signaled(TerminationSignal::Interrupt)));
    assert_eq!(prior.hits(), 1);
    assert_eq!(current_disposition(TerminationSignal::Interrupt).unwrap(), before);

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].subject,
        "[ALERT] Your Program is Terminated: Interrupted by User (Ctrl+C)"
    );
    assert!(sent[0].body.contains("User manually stopped the program."));
}

#[test]
#[serial]
fn test_ignored_prior_disposition_is_kept() {
    let _prior = PriorHandler::ignoring(Signal::SIGTERM);
    let (monitor, recorder) = recording_monitor(false);

    let exit = monitor.run(raising(Signal::SIGTERM)).unwrap_err();

    assert!(matches!(exit, MonitorExit::Signaled(TerminationSignal::Terminate)));
    assert_eq!(
        current_disposition(TerminationSignal::Terminate).unwrap().disposition,
        SignalDisposition::Ignore
    );
    assert_eq!(recorder.count(), 1);
}

#[test]
#[serial]
fn test_handlers_installed_only_while_armed() {
    let (monitor, _recorder) = recording_monitor(false);
    let idle = current_disposition(TerminationSignal::Terminate).unwrap();

    let armed = monitor
        .run(|| current_disposition(TerminationSignal::Terminate).map_err(|e| e.to_string()))
        .unwrap();

    assert_eq!(armed.disposition, SignalDisposition::Handle);
    assert_ne!(armed, idle);
    assert_eq!(current_disposition(TerminationSignal::Terminate).unwrap(), idle);
}

#[test]
#[serial]
fn test_block_keeps_running_after_signaled_return() {
    let _prior = PriorHandler::ignoring(Signal::SIGTERM);
    let (monitor, recorder) = recording_monitor(false);
    let finished = Arc::new(AtomicBool::new(false));

    let flag = finished.clone();
    let exit = monitor
        .run(move || {
            raise(Signal::SIGTERM).map_err(|e| e.to_string())?;
            thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .unwrap_err();

    assert!(matches!(exit, MonitorExit::Signaled(TerminationSignal::Terminate)));
    assert!(!finished.load(Ordering::SeqCst), "run returns before the block does");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !finished.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(finished.load(Ordering::SeqCst), "detached block runs to completion");
    assert_eq!(recorder.count(), 1, "the block's late result is not reported");
}
