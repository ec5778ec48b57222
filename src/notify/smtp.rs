/*!
 * SMTP Notifier
 *
 * Email delivery via lettre. One transport per call: connect, optionally
 * through the proxy tunnel, authenticate, send, quit.
 */

use super::traits::Notifier;
use super::tunnel::ProxyTunnel;
use crate::config::{MonitorConfig, ProxyConfig, SmtpSettings, TlsMode};
use crate::core::panic_message;
use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Why a single delivery attempt failed. Never leaves [`SmtpNotifier::send`].
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Sender credentials are not configured")]
    MissingCredentials,

    #[error("Invalid address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("Failed to open proxy tunnel via {proxy}: {source}")]
    Tunnel {
        proxy: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Notifier that sends plain-text email over SMTP
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    settings: SmtpSettings,
    proxy: Option<ProxyConfig>,
    timeout: Duration,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings, proxy: Option<ProxyConfig>, timeout: Duration) -> Self {
        Self {
            settings,
            proxy,
            timeout,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.smtp.clone(), config.proxy.clone(), config.timeout)
    }

    fn build_message(&self, recipient: &str, subject: &str, body: &str) -> Result<Message, DeliveryError> {
        let (sender, _) = self.settings.credentials().ok_or(DeliveryError::MissingCredentials)?;

        Ok(Message::builder()
            .from(parse_mailbox(sender)?)
            .to(parse_mailbox(recipient)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?)
    }

    fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = self.build_message(recipient, subject, body)?;
        let (sender, password) = self.settings.credentials().ok_or(DeliveryError::MissingCredentials)?;

        let host = self.settings.host.as_str();

        // Certificates are always checked against the real host, even when
        // the TCP connection goes to the loopback end of a tunnel
        let tls_parameters = TlsParameters::new(host.to_string())?;
        let tls = match self.settings.tls_mode() {
            TlsMode::Implicit => Tls::Wrapper(tls_parameters),
            TlsMode::StartTls => Tls::Required(tls_parameters),
        };

        let (server, port) = match &self.proxy {
            Some(proxy) => {
                let tunnel = ProxyTunnel::open(proxy, host, self.settings.port, self.timeout).map_err(|source| {
                    DeliveryError::Tunnel {
                        proxy: proxy.to_string(),
                        source,
                    }
                })?;
                let local = tunnel.local_addr();
                (local.ip().to_string(), local.port())
            }
            None => (host.to_string(), self.settings.port),
        };

        let transport = SmtpTransport::builder_dangerous(server)
            .port(port)
            .tls(tls)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .timeout(Some(self.timeout))
            .build();

        transport.send(&message)?;
        Ok(())
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            proxy = ?self.proxy.as_ref().map(|p| p.to_string()),
            "Connecting to SMTP server"
        );

        match panic::catch_unwind(AssertUnwindSafe(|| self.deliver(recipient, subject, body))) {
            Ok(Ok(())) => {
                info!(recipient, "Email notification sent successfully");
                true
            }
            Ok(Err(e)) => {
                error!(recipient, error = %e, "Failed to send email");
                false
            }
            Err(payload) => {
                error!(recipient, panic = %panic_message(&*payload), "Email transport panicked");
                false
            }
        }
    }

    fn transport(&self) -> &'static str {
        "smtp"
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|source| DeliveryError::Address {
        address: address.to_string(),
        source,
    })
}
