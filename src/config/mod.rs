/*!
 * Configuration
 * Monitor settings resolved from explicit values and the environment
 */

mod proxy;
mod settings;

use std::time::Duration;

pub use proxy::{ProxyConfig, ProxyKind, DEFAULT_PROXY_PORT};
pub use settings::{MonitorConfig, MonitorConfigBuilder, SmtpSettings, TlsMode};

pub const ENV_RECIPIENT: &str = "TERMINATION_MONITOR_RECIPIENT_EMAIL";
pub const ENV_SMTP_HOST: &str = "TERMINATION_MONITOR_SMTP_HOST";
pub const ENV_SMTP_PORT: &str = "TERMINATION_MONITOR_SMTP_PORT";
pub const ENV_SENDER_EMAIL: &str = "TERMINATION_MONITOR_SENDER_EMAIL";
pub const ENV_SENDER_PASSWORD: &str = "TERMINATION_MONITOR_SENDER_PASSWORD";
pub const ENV_HTTP_PROXY: &str = "TERMINATION_MONITOR_HTTP_PROXY";
pub const ENV_HTTPS_PROXY: &str = "TERMINATION_MONITOR_HTTPS_PROXY";
pub const ENV_NOTIFY_ON_START: &str = "TERMINATION_MONITOR_NOTIFY_ON_START";
pub const ENV_SMTP_TIMEOUT_SECS: &str = "TERMINATION_MONITOR_SMTP_TIMEOUT_SECS";

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// SMTP port that speaks TLS from the first byte
pub const IMPLICIT_TLS_PORT: u16 = 465;
