//! Byte-stream connectors: plain TCP, implicit TLS, and the STARTTLS upgrade path.
//!
//! Mirrors the original `TCP`/`TLS`/`TLSStream` split: a connector knows how to produce a stream,
//! a stream just needs to be `Read + Write`. [`TlsStream`] keeps the borrow between the
//! `rustls::ClientConnection` and the underlying `TcpStream` alive via `ouroboros` rather than
//! boxing either side, the same trick used here originally.

use crate::error::{Error, Result};
use crate::types::TlsOptions;
use anyhow::Context as _;
use std::io::{self, Read, Write};
use std::net::{self, ToSocketAddrs as _};
use std::sync::Arc;
use std::time::Duration;

/// Something that can produce a fresh, connected byte stream. Implemented for plain TCP and for
/// TLS-over-TCP; [`Session::upgrade`](crate::session::Session::upgrade) uses [`upgrade_tls`]
/// directly rather than going through this trait, since STARTTLS reuses an already-open socket.
pub trait Connector {
  type Stream: Read + Write;

  fn connect(&self) -> Result<Self::Stream>;
}

pub struct TcpConnector {
  pub host: String,
  pub port: u16,
  pub connect_timeout: Option<Duration>,
}

fn network_error(host: &str, port: u16, source: impl Into<anyhow::Error>) -> Error {
  Error::Network { host: host.to_string(), port, source: source.into() }
}

impl Connector for TcpConnector {
  type Stream = net::TcpStream;

  fn connect(&self) -> Result<Self::Stream> {
    let address = (self.host.as_str(), self.port)
      .to_socket_addrs()
      .map_err(|e| network_error(&self.host, self.port, e))?
      .next()
      .ok_or_else(|| network_error(&self.host, self.port, anyhow::anyhow!("no address resolved")))?;
    log::debug!("connecting to {:?} (timeout {:?})", address, self.connect_timeout);
    let stream = match self.connect_timeout {
      Some(duration) => {
        let stream = net::TcpStream::connect_timeout(&address, duration)
          .map_err(|e| network_error(&self.host, self.port, e))?;
        stream
          .set_read_timeout(Some(duration))
          .map_err(|e| network_error(&self.host, self.port, e))?;
        stream
      }
      None => net::TcpStream::connect(address).map_err(|e| network_error(&self.host, self.port, e))?,
    };
    Ok(stream)
  }
}

#[ouroboros::self_referencing]
pub struct TlsStream {
  tcp_stream: net::TcpStream,
  tls_connection: rustls::ClientConnection,
  #[borrows(mut tcp_stream, mut tls_connection)]
  #[covariant]
  tls_stream: rustls::Stream<'this, rustls::ClientConnection, net::TcpStream>,
}

impl Read for TlsStream {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.with_mut(|fields| fields.tls_stream.read(buf))
  }
}

impl Write for TlsStream {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.with_mut(|fields| fields.tls_stream.write(buf))
  }

  fn flush(&mut self) -> io::Result<()> {
    self.with_mut(|fields| fields.tls_stream.flush())
  }
}

/// Accepts any server certificate. Only reachable via the debug-only `reject_unauthorized = false`
/// knob, for talking to servers with self-signed certificates during development.
struct NoVerifier;

impl rustls::client::ServerCertVerifier for NoVerifier {
  fn verify_server_cert(
    &self,
    _end_entity: &rustls::Certificate,
    _intermediates: &[rustls::Certificate],
    _server_name: &rustls::ServerName,
    _scts: &mut dyn Iterator<Item = &[u8]>,
    _ocsp_response: &[u8],
    _now: std::time::SystemTime,
  ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
    Ok(rustls::client::ServerCertVerified::assertion())
  }
}

fn tls_config(options: &TlsOptions) -> Result<Arc<rustls::ClientConfig>> {
  if !options.reject_unauthorized {
    log::warn!("TLS certificate verification disabled, connection is not authenticated");
    let builder = rustls::ClientConfig::builder()
      .with_safe_defaults()
      .with_custom_certificate_verifier(Arc::new(NoVerifier));
    return Ok(Arc::new(builder.with_no_client_auth()));
  }
  let mut root_store = rustls::RootCertStore::empty();
  if let Some(ca) = &options.ca {
    // A single DER-encoded CA certificate, for pinning to a private CA. Multiple-certificate PEM
    // bundles aren't supported here (no PEM parser in the dependency stack) — pin one CA cert.
    root_store
      .add(&rustls::Certificate(ca.clone()))
      .context("configured CA certificate is not valid DER")
      .map_err(|e| network_error("", 0, e))?;
  } else {
    for certificate in rustls_native_certs::load_native_certs()
      .context("couldn't load native root certificates")
      .map_err(|e| network_error("", 0, e))?
    {
      root_store
        .add(&rustls::Certificate(certificate.0))
        .map_err(|e| network_error("", 0, e))?;
    }
  }
  let builder = rustls::ClientConfig::builder()
    .with_safe_defaults()
    .with_root_certificates(root_store);
  Ok(Arc::new(builder.with_no_client_auth()))
}

/// Wraps an already-connected TCP socket in TLS, used both for implicit TLS (connect then
/// immediately wrap) and STARTTLS (plaintext handshake first, then wrap the same socket).
pub fn upgrade_tls(tcp_stream: net::TcpStream, server_name: &str, options: &TlsOptions) -> Result<TlsStream> {
  let config = tls_config(options)?;
  let server_name = options.servername.as_deref().unwrap_or(server_name);
  let name = server_name
    .to_owned()
    .try_into()
    .map_err(|e| network_error(server_name, 0, anyhow::anyhow!("invalid server name: {e:?}")))?;
  let tls_connection = rustls::ClientConnection::new(config, name)
    .map_err(|e| network_error(server_name, 0, e))?;
  Ok(
    TlsStreamBuilder {
      tcp_stream,
      tls_connection,
      tls_stream_builder: |tcp_stream, tls_connection| rustls::Stream::new(tls_connection, tcp_stream),
    }
    .build(),
  )
}

pub struct TlsConnector {
  pub tcp: TcpConnector,
  pub options: TlsOptions,
}

impl Connector for TlsConnector {
  type Stream = TlsStream;

  fn connect(&self) -> Result<Self::Stream> {
    let tcp_stream = self.tcp.connect()?;
    upgrade_tls(tcp_stream, &self.tcp.host, &self.options)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tcp_connect_fails_fast_on_unresolvable_host() {
    let connector = TcpConnector {
      host: "this-host-does-not-resolve.invalid".to_string(),
      port: 143,
      connect_timeout: None,
    };
    let error = connector.connect().unwrap_err();
    assert!(matches!(error, Error::Network { .. }));
  }

  #[test]
  fn tls_config_with_verification_disabled_builds_without_root_store() {
    let options = TlsOptions { reject_unauthorized: false, ..TlsOptions::default() };
    assert!(tls_config(&options).is_ok());
  }

  #[test]
  fn tls_config_rejects_invalid_der_ca() {
    let options = TlsOptions { reject_unauthorized: true, ca: Some(b"not a certificate".to_vec()), ..TlsOptions::default() };
    assert!(tls_config(&options).is_err());
  }
}
