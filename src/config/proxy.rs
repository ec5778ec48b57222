/*!
 * Proxy Configuration
 * Relay used by the notifier's own connection only
 */

use crate::errors::{MonitorError, MonitorResult};
use std::fmt;
use url::Url;

/// Port used when the proxy URL does not name one
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// Tunnel protocol spoken to the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// HTTP `CONNECT` tunnel (`http://` and `https://` URLs)
    HttpConnect,
    /// SOCKS5 (every other scheme)
    Socks5,
}

/// Parsed proxy endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
    credentials: Option<(String, String)>,
}

impl ProxyConfig {
    /// Parse a proxy URL such as `http://proxy:3128` or `socks5://user:pw@host:1080`
    pub fn parse(key: &'static str, raw: &str) -> MonitorResult<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| MonitorError::invalid(key, e.to_string()))?;

        let kind = match url.scheme() {
            "http" | "https" => ProxyKind::HttpConnect,
            _ => ProxyKind::Socks5,
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MonitorError::invalid(key, "proxy URL has no host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let credentials = match (url.username(), url.password()) {
            ("", _) => None,
            (user, password) => Some((user.to_string(), password.unwrap_or_default().to_string())),
        };

        Ok(Self {
            kind,
            host,
            port: url.port().unwrap_or(DEFAULT_PROXY_PORT),
            credentials,
        })
    }

    /// Username and password embedded in the URL
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(user, password)| (user.as_str(), password.as_str()))
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials.as_ref().map(|(user, _)| user))
            .finish()
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.kind {
            ProxyKind::HttpConnect => "http",
            ProxyKind::Socks5 => "socks5",
        };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}
