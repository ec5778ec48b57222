/*!
 * Lifecycle Tests
 * Success, failure and degraded runs through `TerminationMonitor::run`
 */

use super::recording_monitor;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::Arc;
use termination_monitor::{
    current_disposition, MonitorConfig, MonitorError, MonitorExit, RecordingNotifier, TerminationMonitor,
    TerminationSignal,
};

#[test]
#[serial]
fn test_success_returns_value_and_reports_once() {
    let (monitor, recorder) = recording_monitor(false);

    let rows = monitor.run(|| Ok::<_, anyhow::Error>(vec![1, 2, 3])).unwrap();

    assert_eq!(rows, vec![1, 2, 3]);
    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "ops@example.com");
    assert_eq!(sent[0].subject, "[ALERT] Your Program is Terminated: Success");
    assert!(sent[0].body.contains("Status: Success"));
}

#[test]
#[serial]
fn test_failure_reports_crash_and_returns_same_error() {
    let (monitor, recorder) = recording_monitor(false);

    let exit = monitor
        .run(|| -> anyhow::Result<()> {
            Err(anyhow::anyhow!("checksum mismatch").context("verifying archive"))
        })
        .unwrap_err();

    let error = exit.into_failure().expect("block error is returned unchanged");
    assert_eq!(error.to_string(), "verifying archive");
    assert_eq!(error.root_cause().to_string(), "checksum mismatch");

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[ALERT] Your Program is Terminated: Crashed");
    assert!(sent[0].body.contains("verifying archive"));
    assert!(sent[0].body.contains("checksum mismatch"));
}

#[test]
#[serial]
fn test_start_notification_precedes_report() {
    let (monitor, recorder) = recording_monitor(true);

    monitor.run(|| Ok::<_, String>(())).unwrap();

    let subjects: Vec<_> = recorder.sent().into_iter().map(|r| r.subject).collect();
    assert_eq!(
        subjects,
        vec![
            "[INFO] Monitoring Activated: Your Program Started".to_string(),
            "[ALERT] Your Program is Terminated: Success".to_string(),
        ]
    );
}

#[test]
#[serial]
fn test_failed_delivery_does_not_change_result() {
    let recorder = Arc::new(RecordingNotifier::failing());
    let config = MonitorConfig::builder()
        .recipient("ops@example.com")
        .notify_on_start(false)
        .build_with(|_| None)
        .unwrap();
    let monitor = TerminationMonitor::with_notifier(config, recorder.clone());

    assert_eq!(monitor.run(|| Ok::<_, String>(7)).unwrap(), 7);
    assert_eq!(recorder.count(), 1);
}

#[test]
#[serial]
fn test_failed_delivery_keeps_block_error_and_restores_dispositions() {
    let recorder = Arc::new(RecordingNotifier::failing());
    let config = MonitorConfig::builder()
        .recipient("ops@example.com")
        .notify_on_start(true)
        .build_with(|_| None)
        .unwrap();
    let monitor = TerminationMonitor::with_notifier(config, recorder.clone());
    let before: Vec<_> = TerminationSignal::ALL
        .into_iter()
        .map(|s| current_disposition(s).unwrap())
        .collect();

    let exit = monitor
        .run(|| -> anyhow::Result<()> { Err(anyhow::anyhow!("quota exceeded")) })
        .unwrap_err();

    let error = exit.into_failure().expect("block error is returned unchanged");
    assert_eq!(error.to_string(), "quota exceeded");

    let after: Vec<_> = TerminationSignal::ALL
        .into_iter()
        .map(|s| current_disposition(s).unwrap())
        .collect();
    assert_eq!(before, after);

    let subjects: Vec<_> = recorder.sent().into_iter().map(|r| r.subject).collect();
    assert_eq!(
        subjects,
        vec![
            "[INFO] Monitoring Activated: Your Program Started".to_string(),
            "[ALERT] Your Program is Terminated: Crashed".to_string(),
        ]
    );
}

#[test]
#[serial]
fn test_degraded_monitor_runs_block_without_sending() {
    let recorder = Arc::new(RecordingNotifier::new());
    let config = MonitorConfig::builder().build_with(|_| None).unwrap();
    let monitor = TerminationMonitor::with_notifier(config, recorder.clone());

    assert!(monitor.is_degraded());
    let exit = monitor.run(|| Err::<(), _>("bad input".to_string())).unwrap_err();
    assert_eq!(exit.into_failure(), Some("bad input".to_string()));
    assert_eq!(recorder.count(), 0);
}

#[test]
#[serial]
fn test_incomplete_smtp_config_is_degraded() {
    let config = MonitorConfig::builder()
        .recipient("ops@example.com")
        .build_with(|_| None)
        .unwrap();
    assert!(TerminationMonitor::new(config).is_degraded());
}

#[test]
#[serial]
fn test_dispositions_restored_after_each_outcome() {
    let (monitor, _recorder) = recording_monitor(false);
    let before: Vec<_> = TerminationSignal::ALL
        .into_iter()
        .map(|s| current_disposition(s).unwrap())
        .collect();

    monitor.run(|| Ok::<_, String>(())).unwrap();
    let _ = monitor.run(|| Err::<(), _>("x".to_string()));
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        monitor.run(|| -> Result<(), String> { panic!("boom") })
    }));

    let after: Vec<_> = TerminationSignal::ALL
        .into_iter()
        .map(|s| current_disposition(s).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
#[serial]
fn test_nested_run_is_rejected() {
    let (monitor, recorder) = recording_monitor(false);
    let monitor = Arc::new(monitor);

    let inner = monitor.clone();
    let outer = monitor
        .run(move || Ok::<_, String>(inner.run(|| Ok::<_, String>(())).is_err()))
        .unwrap();

    assert!(outer, "inner run must fail while the outer guard is armed");
    assert_eq!(recorder.count(), 1);

    let exit = {
        let _held = monitor.acquire().unwrap();
        monitor.run(|| Ok::<_, String>(())).unwrap_err()
    };
    assert!(matches!(exit, MonitorExit::Setup(MonitorError::AlreadyArmed)));
}
