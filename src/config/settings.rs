/*!
 * Monitor Settings
 *
 * Each field resolves in order: explicit builder value, environment
 * variable, built-in default. Blank values count as unset.
 */

use super::proxy::ProxyConfig;
use super::*;
use crate::errors::{MonitorError, MonitorResult};
use std::fmt;
use std::time::Duration;

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (port 465)
    Implicit,
    /// Plain connect, then mandatory STARTTLS upgrade
    StartTls,
}

/// SMTP endpoint and sender identity
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub sender: Option<String>,
    password: Option<String>,
}

impl SmtpSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            sender: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, sender: impl Into<String>, password: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self.password = Some(password.into());
        self
    }

    /// Sender login pair, if both halves are present
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sender, &self.password) {
            (Some(sender), Some(password)) => Some((sender.as_str(), password.as_str())),
            _ => None,
        }
    }

    pub fn tls_mode(&self) -> TlsMode {
        if self.port == IMPLICIT_TLS_PORT {
            TlsMode::Implicit
        } else {
            TlsMode::StartTls
        }
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Immutable monitor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub recipient: Option<String>,
    pub smtp: SmtpSettings,
    pub proxy: Option<ProxyConfig>,
    pub notify_on_start: bool,
    pub timeout: Duration,
}

impl MonitorConfig {
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Everything from the process environment
    pub fn from_env() -> MonitorResult<Self> {
        Self::builder().build()
    }

    /// Names of the settings whose absence puts the monitor in degraded mode
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.recipient.is_none() {
            missing.push(ENV_RECIPIENT);
        }
        if self.smtp.sender.is_none() {
            missing.push(ENV_SENDER_EMAIL);
        }
        if self.smtp.password.is_none() {
            missing.push(ENV_SENDER_PASSWORD);
        }
        missing
    }

    /// Recipient and sender credentials are all present
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Builder for [`MonitorConfig`]; unset fields fall back to the environment
#[derive(Debug, Default, Clone)]
pub struct MonitorConfigBuilder {
    recipient: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    sender_email: Option<String>,
    sender_password: Option<String>,
    proxy: Option<String>,
    notify_on_start: Option<bool>,
    timeout: Option<Duration>,
}

impl MonitorConfigBuilder {
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn smtp_host(mut self, host: impl Into<String>) -> Self {
        self.smtp_host = Some(host.into());
        self
    }

    pub fn smtp_port(mut self, port: u16) -> Self {
        self.smtp_port = Some(port);
        self
    }

    pub fn sender_email(mut self, sender: impl Into<String>) -> Self {
        self.sender_email = Some(sender.into());
        self
    }

    pub fn sender_password(mut self, password: impl Into<String>) -> Self {
        self.sender_password = Some(password.into());
        self
    }

    /// Proxy URL; takes precedence over both proxy environment variables
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    pub fn notify_on_start(mut self, enabled: bool) -> Self {
        self.notify_on_start = Some(enabled);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve against the process environment
    pub fn build(self) -> MonitorResult<MonitorConfig> {
        self.build_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary variable source
    pub fn build_with<F>(self, env: F) -> MonitorResult<MonitorConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).and_then(non_blank);

        let recipient = self.recipient.and_then(non_blank).or_else(|| lookup(ENV_RECIPIENT));
        let host = self
            .smtp_host
            .and_then(non_blank)
            .or_else(|| lookup(ENV_SMTP_HOST))
            .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());

        let port = match self.smtp_port {
            Some(port) => port,
            None => match lookup(ENV_SMTP_PORT) {
                Some(raw) => parse_port(&raw)?,
                None => DEFAULT_SMTP_PORT,
            },
        };

        let sender = self.sender_email.and_then(non_blank).or_else(|| lookup(ENV_SENDER_EMAIL));
        let password = self
            .sender_password
            .and_then(non_blank)
            .or_else(|| lookup(ENV_SENDER_PASSWORD));

        let proxy = match self.proxy.and_then(non_blank) {
            Some(raw) => Some(ProxyConfig::parse(ENV_HTTP_PROXY, &raw)?),
            None => match (lookup(ENV_HTTP_PROXY), lookup(ENV_HTTPS_PROXY)) {
                (Some(raw), _) => Some(ProxyConfig::parse(ENV_HTTP_PROXY, &raw)?),
                (None, Some(raw)) => Some(ProxyConfig::parse(ENV_HTTPS_PROXY, &raw)?),
                (None, None) => None,
            },
        };

        let notify_on_start = match self.notify_on_start {
            Some(enabled) => enabled,
            None => match lookup(ENV_NOTIFY_ON_START) {
                Some(raw) => parse_bool(ENV_NOTIFY_ON_START, &raw)?,
                None => true,
            },
        };

        let timeout = match self.timeout {
            Some(timeout) => timeout,
            None => match lookup(ENV_SMTP_TIMEOUT_SECS) {
                Some(raw) => Duration::from_secs(
                    raw.trim()
                        .parse()
                        .map_err(|_| MonitorError::invalid(ENV_SMTP_TIMEOUT_SECS, format!("'{raw}' is not a number of seconds")))?,
                ),
                None => DEFAULT_SMTP_TIMEOUT,
            },
        };

        Ok(MonitorConfig {
            recipient,
            smtp: SmtpSettings {
                host,
                port,
                sender,
                password,
            },
            proxy,
            notify_on_start,
            timeout,
        })
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_port(raw: &str) -> MonitorResult<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(MonitorError::invalid(
            ENV_SMTP_PORT,
            format!("'{raw}' is not a valid TCP port"),
        )),
        Ok(port) => Ok(port),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> MonitorResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(MonitorError::invalid(key, format!("'{raw}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_empty_environment() {
        let config = MonitorConfig::builder().build_with(|_| None).unwrap();
        assert_eq!(config.recipient, None);
        assert_eq!(config.smtp.host, DEFAULT_SMTP_HOST);
        assert_eq!(config.smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(config.smtp.tls_mode(), TlsMode::StartTls);
        assert!(config.notify_on_start);
        assert_eq!(config.timeout, DEFAULT_SMTP_TIMEOUT);
        assert!(!config.is_complete());
        assert_eq!(
            config.missing_fields(),
            vec![ENV_RECIPIENT, ENV_SENDER_EMAIL, ENV_SENDER_PASSWORD]
        );
    }

    #[test]
    fn test_environment_fills_unset_fields() {
        let env = env_from(&[
            (ENV_RECIPIENT, "ops@example.com"),
            (ENV_SMTP_HOST, "mail.example.com"),
            (ENV_SMTP_PORT, "465"),
            (ENV_SENDER_EMAIL, "bot@example.com"),
            (ENV_SENDER_PASSWORD, "hunter2"),
            (ENV_NOTIFY_ON_START, "false"),
            (ENV_SMTP_TIMEOUT_SECS, "15"),
        ]);

        let config = MonitorConfig::builder().build_with(env).unwrap();
        assert_eq!(config.recipient.as_deref(), Some("ops@example.com"));
        assert_eq!(config.smtp.host, "mail.example.com");
        assert_eq!(config.smtp.tls_mode(), TlsMode::Implicit);
        assert_eq!(config.smtp.credentials(), Some(("bot@example.com", "hunter2")));
        assert!(!config.notify_on_start);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(config.is_complete());
    }

    #[test]
    fn test_explicit_values_take_precedence() {
        let env = env_from(&[
            (ENV_RECIPIENT, "env@example.com"),
            (ENV_SMTP_PORT, "not-a-port"),
            (ENV_HTTP_PROXY, "http://env-proxy:3128"),
        ]);

        let config = MonitorConfig::builder()
            .recipient("explicit@example.com")
            .smtp_port(2525)
            .proxy("socks5://explicit-proxy:1080")
            .build_with(env)
            .unwrap();

        assert_eq!(config.recipient.as_deref(), Some("explicit@example.com"));
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.proxy.unwrap().host, "explicit-proxy");
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let env = env_from(&[(ENV_RECIPIENT, "  "), (ENV_SENDER_EMAIL, "bot@example.com")]);
        let config = MonitorConfig::builder()
            .sender_password("")
            .build_with(env)
            .unwrap();
        assert_eq!(config.recipient, None);
        assert_eq!(config.missing_fields(), vec![ENV_RECIPIENT, ENV_SENDER_PASSWORD]);
    }

    #[test]
    fn test_http_proxy_preferred_over_https() {
        let env = env_from(&[
            (ENV_HTTP_PROXY, "http://first:3128"),
            (ENV_HTTPS_PROXY, "http://second:3128"),
        ]);
        let config = MonitorConfig::builder().build_with(env).unwrap();
        assert_eq!(config.proxy.unwrap().host, "first");

        let env = env_from(&[(ENV_HTTPS_PROXY, "http://second:3128")]);
        let config = MonitorConfig::builder().build_with(env).unwrap();
        assert_eq!(config.proxy.unwrap().host, "second");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MonitorConfig::builder()
            .build_with(env_from(&[(ENV_SMTP_PORT, "70000")]))
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig { key, .. } if key == ENV_SMTP_PORT));

        let err = MonitorConfig::builder()
            .build_with(env_from(&[(ENV_NOTIFY_ON_START, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig { key, .. } if key == ENV_NOTIFY_ON_START));
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let settings = SmtpSettings::new("mail.example.com", 587).with_credentials("bot@example.com", "hunter2");
        let debug = format!("{:?}", settings);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }
}
