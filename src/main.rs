/*!
 * Termination Monitor - Command Line Entry Point
 *
 * Runs a command as the guarded block:
 *
 * ```text
 * termination-monitor [OPTIONS] -- <COMMAND> [ARGS]...
 * ```
 *
 * - exit status mirrors the child's (128 + n when the child dies of signal n)
 * - SIGINT/SIGTERM sent to the wrapper are forwarded to the child; once the
 *   child has exited (or been killed after `--kill-grace-secs`) the signal is
 *   reported and re-delivered so the wrapper ends by the same signal
 */

use clap::Parser;
use flume::{Receiver, RecvTimeoutError};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitCode, ExitStatus};
use std::thread;
use std::time::Duration;
use termination_monitor::core::capture_local_offset;
use termination_monitor::{
    init_tracing, ArmedGuard, MonitorConfig, MonitorError, ReleaseTrigger, TerminationMonitor, TerminationSignal,
};
use thiserror::Error;
use tracing::{error, info, warn};

/// Conventional shell status for "command not found / not executable"
const SPAWN_FAILURE_CODE: u8 = 127;

#[derive(Parser, Debug)]
#[command(name = "termination-monitor", version, about = "Run a command and email a report when it terminates")]
struct Cli {
    /// Report recipient [env: TERMINATION_MONITOR_RECIPIENT_EMAIL]
    #[arg(long, value_name = "EMAIL")]
    recipient: Option<String>,

    /// SMTP server [env: TERMINATION_MONITOR_SMTP_HOST, default: smtp.gmail.com]
    #[arg(long, value_name = "HOST")]
    smtp_host: Option<String>,

    /// SMTP port; 465 uses implicit TLS [env: TERMINATION_MONITOR_SMTP_PORT, default: 587]
    #[arg(long, value_name = "PORT")]
    smtp_port: Option<u16>,

    /// Sender account [env: TERMINATION_MONITOR_SENDER_EMAIL]
    #[arg(long, value_name = "EMAIL")]
    sender_email: Option<String>,

    /// Sender password or app password [env: TERMINATION_MONITOR_SENDER_PASSWORD]
    #[arg(long, value_name = "PASSWORD")]
    sender_password: Option<String>,

    /// http://, https://, socks5:// or socks5h:// proxy for SMTP traffic
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Skip the start-up notification
    #[arg(long)]
    no_start_notification: bool,

    /// SMTP connection timeout [env: TERMINATION_MONITOR_SMTP_TIMEOUT_SECS, default: 60]
    #[arg(long, value_name = "SECS")]
    smtp_timeout_secs: Option<u64>,

    /// Seconds the command gets to exit after a forwarded signal before SIGKILL
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    kill_grace_secs: u64,

    /// Command to run under the monitor
    #[arg(last = true, required = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    /// Flags first, environment for anything not given
    fn config(&self) -> Result<MonitorConfig, MonitorError> {
        let mut builder = MonitorConfig::builder();
        if let Some(recipient) = &self.recipient {
            builder = builder.recipient(recipient);
        }
        if let Some(host) = &self.smtp_host {
            builder = builder.smtp_host(host);
        }
        if let Some(port) = self.smtp_port {
            builder = builder.smtp_port(port);
        }
        if let Some(sender) = &self.sender_email {
            builder = builder.sender_email(sender);
        }
        if let Some(password) = &self.sender_password {
            builder = builder.sender_password(password);
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy);
        }
        if self.no_start_notification {
            builder = builder.notify_on_start(false);
        }
        if let Some(secs) = self.smtp_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Non-zero exit of the monitored command
#[derive(Debug, Error)]
#[error("`{command}` exited unsuccessfully ({status})")]
struct CommandFailed {
    command: String,
    status: ExitStatus,
}

enum Wake {
    Exited(io::Result<ExitStatus>),
    Signal(TerminationSignal),
    Lost,
}

fn main() -> miette::Result<ExitCode> {
    // Before any thread exists; the offset cannot be read safely afterwards
    capture_local_offset();
    init_tracing();

    let cli = Cli::parse();
    let monitor = TerminationMonitor::new(cli.config()?);
    supervise(&monitor, &cli.command, Duration::from_secs(cli.kill_grace_secs))
}

fn supervise(monitor: &TerminationMonitor, command: &[String], grace: Duration) -> miette::Result<ExitCode> {
    let Some((program, args)) = command.split_first() else {
        return Err(miette::miette!("no command given"));
    };
    let command_line = command.join(" ");

    let mut guard = monitor.acquire()?;

    let mut child = match Command::new(program).args(args).spawn() {
        Ok(child) => child,
        Err(e) => {
            let error = anyhow::Error::new(e).context(format!("failed to start `{command_line}`"));
            guard.release(ReleaseTrigger::failed(&error));
            return Ok(ExitCode::from(SPAWN_FAILURE_CODE));
        }
    };
    let pid = Pid::from_raw(child.id() as i32);
    info!(command = %command_line, pid = %pid, "Command started");

    let (done_tx, done_rx) = flume::bounded(1);
    let waiter = thread::Builder::new()
        .name("child-waiter".to_string())
        .spawn(move || {
            let _ = done_tx.send(child.wait());
        });
    if let Err(e) = waiter {
        // The child handle moved into the failed closure; stop the orphan
        let _ = kill(pid, Signal::SIGKILL);
        guard.release(ReleaseTrigger::Failed {
            description: format!("failed to wait on `{command_line}`: {e}"),
        });
        return Err(MonitorError::Spawn(e).into());
    }

    let wake = flume::Selector::new()
        .recv(&done_rx, |status| match status {
            Ok(status) => Wake::Exited(status),
            Err(_) => Wake::Lost,
        })
        .recv(guard.signals(), |signal| match signal {
            Ok(signal) => Wake::Signal(signal),
            Err(_) => match done_rx.recv() {
                Ok(status) => Wake::Exited(status),
                Err(_) => Wake::Lost,
            },
        })
        .wait();

    Ok(match wake {
        Wake::Exited(status) => finish(guard, &command_line, status),
        Wake::Signal(signal) => {
            if let Err(e) = kill(pid, signal.as_nix()) {
                warn!(pid = %pid, signal = %signal, error = %e, "Failed to forward signal to command");
            }
            let note = match reap_after_forward(&done_rx, pid, grace) {
                Reaped::Exited(status) => format!("Command `{command_line}` ended after {signal}: {status}."),
                Reaped::Killed(status) => format!(
                    "Command `{command_line}` ignored {signal} for {}s and was killed: {status}.",
                    grace.as_secs()
                ),
                Reaped::Unknown => format!("Command `{command_line}` exit status unknown after {signal}."),
            };
            guard.note(note);
            guard.release(ReleaseTrigger::Signal(signal));
            // Only reached when the prior disposition let us survive
            ExitCode::from(signal.shell_exit_code())
        }
        Wake::Lost => {
            guard.release(ReleaseTrigger::Failed {
                description: format!("lost track of `{command_line}`"),
            });
            ExitCode::FAILURE
        }
    })
}

/// How the command ended after a forwarded signal
enum Reaped {
    Exited(ExitStatus),
    Killed(ExitStatus),
    Unknown,
}

/// Wait up to `grace` for the command to exit, then SIGKILL it.
///
/// The wrapper never exits ahead of its command.
fn reap_after_forward(done_rx: &Receiver<io::Result<ExitStatus>>, pid: Pid, grace: Duration) -> Reaped {
    match done_rx.recv_timeout(grace) {
        Ok(Ok(status)) => {
            info!(pid = %pid, status = %status, "Command exited after forwarded signal");
            Reaped::Exited(status)
        }
        Ok(Err(e)) => {
            warn!(pid = %pid, error = %e, "Failed to wait for command");
            Reaped::Unknown
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(pid = %pid, grace_secs = grace.as_secs(), "Command still running after grace period; killing");
            if let Err(e) = kill(pid, Signal::SIGKILL) {
                warn!(pid = %pid, error = %e, "Failed to kill command");
            }
            match done_rx.recv() {
                Ok(Ok(status)) => Reaped::Killed(status),
                _ => Reaped::Unknown,
            }
        }
        Err(RecvTimeoutError::Disconnected) => Reaped::Unknown,
    }
}

fn finish(guard: ArmedGuard<'_>, command_line: &str, status: io::Result<ExitStatus>) -> ExitCode {
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            error!(command = %command_line, error = %e, "Failed to wait for command");
            let error = anyhow::Error::new(e).context(format!("failed to wait on `{command_line}`"));
            guard.release(ReleaseTrigger::failed(&error));
            return ExitCode::FAILURE;
        }
    };

    if status.success() {
        guard.release(ReleaseTrigger::Completed);
        return ExitCode::SUCCESS;
    }

    let error = anyhow::Error::new(CommandFailed {
        command: command_line.to_string(),
        status,
    });
    guard.release(ReleaseTrigger::failed(&error));
    ExitCode::from(exit_code(status))
}

fn exit_code(status: ExitStatus) -> u8 {
    match (status.code(), status.signal()) {
        (Some(code), _) => (code & 0xff) as u8,
        (None, Some(signal)) => (128 + signal).min(255) as u8,
        (None, None) => 1,
    }
}
