/*!
 * Manual Guard Tests
 * Driving `acquire` and `ArmedGuard::release` directly
 */

use super::{recording_monitor, PriorHandler};
use nix::sys::signal::{kill, raise, Signal};
use nix::unistd::getpid;
use serial_test::serial;
use std::thread;
use std::time::{Duration, Instant};
use termination_monitor::{Outcome, ReleaseTrigger, TerminationSignal};

#[test]
#[serial]
fn test_release_returns_classified_outcome() {
    let (monitor, recorder) = recording_monitor(false);

    let guard = monitor.acquire().unwrap();
    let run_id = guard.run_id();
    assert_eq!(guard.pending_signal(), None);

    let outcome = guard.release(ReleaseTrigger::Failed {
        description: "disk full".to_string(),
    });

    assert_eq!(
        outcome,
        Outcome::Failure {
            description: "disk full".to_string()
        }
    );
    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains(&run_id.to_string()));
    assert!(sent[0].body.contains("disk full"));
}

#[test]
#[serial]
fn test_signal_observed_through_guard() {
    let prior = PriorHandler::counting(Signal::SIGTERM);
    let (monitor, recorder) = recording_monitor(false);

    let guard = monitor.acquire().unwrap();
    raise(Signal::SIGTERM).unwrap();

    // The handler ran synchronously; the prior handler has not
    assert_eq!(guard.pending_signal(), Some(TerminationSignal::Terminate));
    assert_eq!(prior.hits(), 0);

    let relayed = guard.signals().recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(relayed, TerminationSignal::Terminate);

    let outcome = guard.release(ReleaseTrigger::Signal(relayed));
    assert_eq!(
        outcome,
        Outcome::ExternalTermination {
            signal_name: "SIGTERM".to_string()
        }
    );
    assert_eq!(prior.hits(), 1);
    assert_eq!(recorder.count(), 1);
}

#[test]
#[serial]
fn test_late_signal_redelivered_after_success() {
    let prior = PriorHandler::counting(Signal::SIGINT);
    let (monitor, recorder) = recording_monitor(false);

    let guard = monitor.acquire().unwrap();
    raise(Signal::SIGINT).unwrap();

    // Work finished anyway; the interrupt must still reach the prior handler
    let outcome = guard.release(ReleaseTrigger::Completed);

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(prior.hits(), 1);
    assert_eq!(recorder.count(), 1);
}

#[test]
#[serial]
fn test_unwinding_drop_reports_failure() {
    let (monitor, recorder) = recording_monitor(false);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _guard = monitor.acquire().unwrap();
        panic!("unwinding through the guard");
    }));

    assert!(result.is_err());
    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.ends_with("Crashed"));
}

#[test]
#[serial]
fn test_signal_racing_release_is_never_lost() {
    const ROUNDS: usize = 2_000;

    let prior = PriorHandler::counting(Signal::SIGTERM);
    let (monitor, _recorder) = recording_monitor(false);

    for round in 0..ROUNDS {
        let guard = monitor.acquire().unwrap();

        // Stagger the signal across the whole release sequence
        let spins = (round * 37) % 5_000;
        let sender = thread::spawn(move || {
            for _ in 0..spins {
                std::hint::spin_loop();
            }
            kill(getpid(), Signal::SIGTERM).unwrap();
        });

        guard.release(ReleaseTrigger::Completed);
        sender.join().unwrap();
    }

    // Every request either reached the prior handler directly or was
    // re-delivered to it after release
    let deadline = Instant::now() + Duration::from_secs(5);
    while prior.hits() < ROUNDS && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(prior.hits(), ROUNDS);
}
