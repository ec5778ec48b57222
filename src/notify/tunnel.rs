/*!
 * Proxy Tunnel
 *
 * Per-connection relay through an HTTP CONNECT or SOCKS5 proxy.
 *
 * The handshake runs eagerly against the proxy; the established stream is
 * then exposed on an ephemeral loopback port that the SMTP client dials
 * instead of the real host. Nothing outside this one connection is
 * proxied.
 */

use crate::config::{ProxyConfig, ProxyKind};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound on a proxy's CONNECT response head
const MAX_RESPONSE_HEAD: usize = 8 * 1024;

const SOCKS_VERSION: u8 = 0x05;
const SOCKS_NO_AUTH: u8 = 0x00;
const SOCKS_USER_PASS: u8 = 0x02;
const SOCKS_CMD_CONNECT: u8 = 0x01;
const SOCKS_ATYP_IPV4: u8 = 0x01;
const SOCKS_ATYP_DOMAIN: u8 = 0x03;
const SOCKS_ATYP_IPV6: u8 = 0x04;

/// Loopback endpoint relaying to `target` through a proxy
#[derive(Debug)]
pub struct ProxyTunnel {
    local_addr: SocketAddr,
}

impl ProxyTunnel {
    /// Connect to the proxy, ask it for `host:port`, and start relaying.
    ///
    /// The loopback listener accepts a single connection within `timeout`.
    pub fn open(proxy: &ProxyConfig, host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
        let mut upstream = connect_with_timeout(&proxy.host, proxy.port, timeout)?;
        upstream.set_read_timeout(Some(timeout))?;
        upstream.set_write_timeout(Some(timeout))?;

        match proxy.kind {
            ProxyKind::HttpConnect => http_connect(&mut upstream, proxy, host, port)?,
            ProxyKind::Socks5 => socks5_connect(&mut upstream, proxy, host, port)?,
        }
        debug!(proxy = %proxy, target = %format!("{host}:{port}"), "Proxy tunnel established");

        upstream.set_read_timeout(None)?;
        upstream.set_write_timeout(None)?;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        thread::Builder::new()
            .name("smtp-proxy-tunnel".into())
            .spawn(move || {
                let deadline = Instant::now() + timeout;
                match accept_until(&listener, deadline) {
                    Ok(client) => relay(client, upstream),
                    Err(e) => warn!(error = %e, "Proxy tunnel was never used"),
                }
            })?;

        Ok(Self { local_addr })
    }

    /// Address the SMTP client should dial
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = io::Error::new(ErrorKind::NotFound, format!("{host} did not resolve"));
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

fn accept_until(listener: &TcpListener, deadline: Instant) -> io::Result<TcpStream> {
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(ErrorKind::TimedOut, "no client connected"));
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pump bytes both ways until each side has closed
fn relay(client: TcpStream, upstream: TcpStream) {
    let (mut client_read, mut upstream_write) = match (client.try_clone(), upstream.try_clone()) {
        (Ok(c), Ok(u)) => (c, u),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Could not split proxy tunnel streams");
            return;
        }
    };

    let outbound = thread::spawn(move || {
        let _ = io::copy(&mut client_read, &mut upstream_write);
        let _ = upstream_write.shutdown(Shutdown::Write);
    });

    let (mut upstream_read, mut client_write) = (upstream, client);
    let _ = io::copy(&mut upstream_read, &mut client_write);
    let _ = client_write.shutdown(Shutdown::Write);

    let _ = outbound.join();
    debug!("Proxy tunnel closed");
}

fn http_connect(stream: &mut TcpStream, proxy: &ProxyConfig, host: &str, port: u16) -> io::Result<()> {
    let authority = format!("{host}:{port}");
    let mut request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if let Some((user, password)) = proxy.credentials() {
        let token = STANDARD.encode(format!("{user}:{password}"));
        request.push_str(&format!("Proxy-Authorization: Basic {token}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes())?;

    let head = read_response_head(stream)?;
    let status_line = head.lines().next().unwrap_or_default();
    let accepted = status_line
        .split_whitespace()
        .nth(1)
        .map(|code| code.starts_with('2'))
        .unwrap_or(false);

    if accepted {
        Ok(())
    } else {
        Err(io::Error::new(
            ErrorKind::ConnectionRefused,
            format!("proxy refused CONNECT: {status_line}"),
        ))
    }
}

fn read_response_head(stream: &mut TcpStream) -> io::Result<String> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(io::Error::new(ErrorKind::InvalidData, "proxy response head too large"));
        }
        stream.read_exact(&mut byte)?;
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn socks5_connect(stream: &mut TcpStream, proxy: &ProxyConfig, host: &str, port: u16) -> io::Result<()> {
    let credentials = proxy.credentials();
    let greeting: &[u8] = match credentials {
        Some(_) => &[SOCKS_VERSION, 2, SOCKS_NO_AUTH, SOCKS_USER_PASS],
        None => &[SOCKS_VERSION, 1, SOCKS_NO_AUTH],
    };
    stream.write_all(greeting)?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice)?;
    if choice[0] != SOCKS_VERSION {
        return Err(socks_error("unexpected SOCKS version in method reply"));
    }

    match (choice[1], credentials) {
        (SOCKS_NO_AUTH, _) => {}
        (SOCKS_USER_PASS, Some((user, password))) => socks5_authenticate(stream, user, password)?,
        _ => return Err(socks_error("proxy offered no acceptable authentication method")),
    }

    if host.len() > u8::MAX as usize {
        return Err(socks_error("target host name too long"));
    }
    let mut request = vec![SOCKS_VERSION, SOCKS_CMD_CONNECT, 0x00, SOCKS_ATYP_DOMAIN, host.len() as u8];
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request)?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply)?;
    if reply[1] != 0x00 {
        return Err(socks_error(&format!("proxy CONNECT failed with code {}", reply[1])));
    }

    // Skip the bound address the proxy reports
    let remaining = match reply[3] {
        SOCKS_ATYP_IPV4 => 4 + 2,
        SOCKS_ATYP_IPV6 => 16 + 2,
        SOCKS_ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len)?;
            len[0] as usize + 2
        }
        other => return Err(socks_error(&format!("unknown address type {other}"))),
    };
    let mut bound = vec![0u8; remaining];
    stream.read_exact(&mut bound)?;
    Ok(())
}

fn socks5_authenticate(stream: &mut TcpStream, user: &str, password: &str) -> io::Result<()> {
    if user.len() > u8::MAX as usize || password.len() > u8::MAX as usize {
        return Err(socks_error("proxy credentials too long"));
    }
    let mut request = vec![0x01, user.len() as u8];
    request.extend_from_slice(user.as_bytes());
    request.push(password.len() as u8);
    request.extend_from_slice(password.as_bytes());
    stream.write_all(&request)?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status)?;
    if status[1] != 0x00 {
        return Err(io::Error::new(ErrorKind::PermissionDenied, "proxy rejected credentials"));
    }
    Ok(())
}

fn socks_error(message: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, format!("SOCKS5: {message}"))
}
