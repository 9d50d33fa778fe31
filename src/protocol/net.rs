//! Socket establishment and transport I/O.
//!
//! Connecting resolves every candidate address (IPv4 and IPv6) and races the
//! connect attempts; the first socket to complete wins and the losers are
//! dropped. All reads and writes are bounded by the connection timeout and
//! raced against the connection's cancel token.

use crate::error::{Error, Result};
use futures::future::select_ok;
use log::{debug, warn};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::watch;

/// Maximum number of resolved addresses raced during connect.
pub const MAX_CANDIDATES: usize = 6;

/// TLS configuration for the optional outer tunnel.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM file with the root certificate(s) used to verify the server.
    /// Without it, peer verification is disabled, matching the C SDK.
    pub ca_file: Option<PathBuf>,
    /// PEM file with the client certificate.
    pub cert_file: Option<PathBuf>,
    /// PEM file with the client private key (PKCS#8).
    pub key_file: Option<PathBuf>,
    /// Requested cipher list. The native TLS backend does not expose cipher
    /// selection; a non-empty list is reported and ignored, as the C SDK
    /// does on configuration failure.
    pub cipher_list: Option<String>,
    /// Skip certificate verification even when a CA file is set.
    pub accept_invalid_certs: bool,
}

/// Cloneable handle that aborts in-flight operations on a connection.
///
/// Cancellation is transport-level: the blocked operation fails and the
/// connection is left unusable, exactly like shutting the socket down under
/// a blocked caller.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Abort whatever operation is currently blocked on the connection.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// A connected transport, plain TCP or TLS-wrapped.
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<tokio_native_tls::TlsStream<TcpStream>>),
}

impl Transport {
    async fn io_read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.read_exact(buf).await.map(|_| ()),
            Self::Tls(s) => s.read_exact(buf).await.map(|_| ()),
        }
    }

    async fn io_write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(s) => {
                s.write_all(buf).await?;
                s.flush().await
            }
            Self::Tls(s) => {
                s.write_all(buf).await?;
                s.flush().await
            }
        }
    }

    async fn io_shutdown(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.shutdown().await,
            Self::Tls(s) => s.shutdown().await,
        }
    }
}

/// A transport with timeout and cancellation applied to every operation.
pub struct NetStream {
    transport: Transport,
    timeout: Duration,
    cancel_rx: watch::Receiver<bool>,
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // every handle dropped: cancellation can never fire
            std::future::pending::<()>().await;
        }
    }
}

impl NetStream {
    /// Wrap a transport; returns the stream and its cancel handle.
    pub fn new(transport: Transport, timeout: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                transport,
                timeout,
                cancel_rx: rx,
            },
            CancelHandle { tx: Arc::new(tx) },
        )
    }

    /// The per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read exactly `buf.len()` bytes.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let Self {
            transport,
            timeout,
            cancel_rx,
        } = self;
        let timeout = *timeout;
        tokio::select! {
            res = tokio::time::timeout(timeout, transport.io_read_exact(buf)) => match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(Error::SocketTimeout { timeout }),
            },
            _ = wait_cancelled(cancel_rx) => Err(Error::Cancelled),
        }
    }

    /// Write all of `buf`.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let Self {
            transport,
            timeout,
            cancel_rx,
        } = self;
        let timeout = *timeout;
        tokio::select! {
            res = tokio::time::timeout(timeout, transport.io_write_all(buf)) => match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(Error::SocketTimeout { timeout }),
            },
            _ = wait_cancelled(cancel_rx) => Err(Error::Cancelled),
        }
    }

    /// Shut the transport down (TLS close-notify first when applicable).
    pub async fn shutdown(&mut self) {
        let _ = self.transport.io_shutdown().await;
    }
}

/// Resolve `host` to at most [`MAX_CANDIDATES`] socket addresses.
///
/// Numeric literals (IPv4 first, then IPv6) bypass the resolver.
pub async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| Error::DnsResolutionFailed {
            hostname: host.to_string(),
            message: e.to_string(),
        })?
        .take(MAX_CANDIDATES)
        .collect();
    if addrs.is_empty() {
        return Err(Error::DnsResolutionFailed {
            hostname: host.to_string(),
            message: "no addresses returned".to_string(),
        });
    }
    Ok(addrs)
}

/// Race connect attempts to every candidate; first to succeed wins.
pub async fn race_connect(
    addrs: &[SocketAddr],
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<TcpStream> {
    debug!("connecting to {host}:{port}, {} candidate(s)", addrs.len());
    let attempts: Vec<_> = addrs
        .iter()
        .map(|addr| Box::pin(TcpStream::connect(*addr)))
        .collect();
    match tokio::time::timeout(timeout, select_ok(attempts)).await {
        Ok(Ok((stream, _losers))) => {
            stream.set_nodelay(true)?;
            debug!("connected to {}", stream.peer_addr()?);
            Ok(stream)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(Error::ConnectionTimeout {
            host: host.to_string(),
            port,
            timeout,
        }),
    }
}

/// Resolve and connect.
pub async fn connect_socket(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs = resolve(host, port).await?;
    race_connect(&addrs, host, port, timeout).await
}

/// Upgrade a connected socket to TLS using the given client options.
pub async fn upgrade_tls(
    stream: TcpStream,
    host: &str,
    options: Option<&TlsOptions>,
) -> Result<Transport> {
    let default_options = TlsOptions::default();
    let opts = options.unwrap_or(&default_options);

    let mut builder = native_tls::TlsConnector::builder();
    match &opts.ca_file {
        Some(path) => {
            let pem = std::fs::read(path)?;
            builder.add_root_certificate(native_tls::Certificate::from_pem(&pem)?);
        }
        None => {
            // no root certificate: disable certificate and name verification
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
    }
    if opts.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    if let (Some(cert), Some(key)) = (&opts.cert_file, &opts.key_file) {
        let identity = native_tls::Identity::from_pkcs8(&std::fs::read(cert)?, &std::fs::read(key)?)?;
        builder.identity(identity);
    }
    if opts.cipher_list.is_some() {
        warn!("cipher list is not configurable with the native TLS backend, ignoring");
    }

    let connector = tokio_native_tls::TlsConnector::from(builder.build()?);
    let tls = connector.connect(host, stream).await?;
    Ok(Transport::Tls(Box::new(tls)))
}
