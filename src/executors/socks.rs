use crate::config::ProxyConfig;
use crate::core::errors::ConnectError;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const SOCKS_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NONE_ACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const REPLY_SUCCEEDED: u8 = 0x00;
const REPLY_CONNECTION_REFUSED: u8 = 0x05;

/// A bidirectional byte stream owned by exactly one probe.
pub trait ProbeStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ProbeStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn ProbeStream>;

/// Opens a stream to `host:port`. The timeout bounds the whole
/// operation; implementations never retry.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16, limit: Duration) -> Result<BoxedStream, ConnectError>;
}

/// SOCKS5 (RFC 1928) client that asks the proxy to resolve hostnames,
/// so `.onion` destinations never touch local DNS.
pub struct ProxyConnector {
    proxy: ProxyConfig,
}

impl ProxyConnector {
    pub fn new(proxy: ProxyConfig) -> Self {
        Self { proxy }
    }

    pub async fn open(&self, host: &str, port: u16, limit: Duration) -> Result<TcpStream, ConnectError> {
        match timeout(limit, self.tunnel(host, port)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("SOCKS connect to {}:{} timed out after {:?}", host, port, limit);
                Err(ConnectError::Timeout)
            }
        }
    }

    async fn tunnel(&self, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        if host.is_empty() || host.len() > 255 {
            return Err(ConnectError::InvalidAddress(host.to_string()));
        }

        let mut stream = TcpStream::connect(self.proxy.address())
            .await
            .map_err(|e| ConnectError::ProxyUnavailable(format!("{}: {}", self.proxy.address(), e)))?;

        negotiate(&mut stream, host, port).await?;
        tracing::debug!("SOCKS tunnel open to {}:{}", host, port);
        Ok(stream)
    }
}

#[async_trait]
impl Connector for ProxyConnector {
    async fn connect(&self, host: &str, port: u16, limit: Duration) -> Result<BoxedStream, ConnectError> {
        let stream = self.open(host, port, limit).await?;
        Ok(Box::new(stream))
    }
}

/// Runs the no-auth greeting and CONNECT request over an already
/// established proxy connection.
pub async fn negotiate<S>(stream: &mut S, host: &str, port: u16) -> Result<(), ConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[SOCKS_VERSION, 1, METHOD_NO_AUTH])
        .await
        .map_err(io_error)?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await.map_err(io_error)?;
    if choice[0] != SOCKS_VERSION {
        return Err(ConnectError::Protocol(format!("unexpected SOCKS version {}", choice[0])));
    }
    match choice[1] {
        METHOD_NO_AUTH => {}
        METHOD_NONE_ACCEPTABLE => {
            return Err(ConnectError::ProxyRejected("no acceptable authentication method".to_string()));
        }
        other => {
            return Err(ConnectError::Protocol(format!("proxy selected unsupported method {:#04x}", other)));
        }
    }

    stream.write_all(&connect_request(host, port)).await.map_err(io_error)?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await.map_err(io_error)?;
    if head[0] != SOCKS_VERSION {
        return Err(ConnectError::Protocol(format!("unexpected SOCKS version {}", head[0])));
    }
    if head[1] != REPLY_SUCCEEDED {
        return Err(reply_error(head[1]));
    }

    // Bound address is unused but must be drained before payload bytes.
    let addr_len = match head[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await.map_err(io_error)?;
            len[0] as usize
        }
        other => return Err(ConnectError::Protocol(format!("unknown address type {:#04x}", other))),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await.map_err(io_error)?;

    Ok(())
}

fn connect_request(host: &str, port: u16) -> Vec<u8> {
    let mut request = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            request.push(ATYP_DOMAIN);
            request.push(host.len() as u8);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    request
}

/// Standard reply codes plus Tor's onion-service extensions (0xF0-0xF7).
fn reply_error(code: u8) -> ConnectError {
    let reason = match code {
        REPLY_CONNECTION_REFUSED => return ConnectError::Refused,
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        0xF0 => "onion service descriptor not found",
        0xF1 => "onion service descriptor is invalid",
        0xF2 => "onion service introduction failed",
        0xF3 => "onion service rendezvous failed",
        0xF4 => "onion service missing client authorization",
        0xF5 => "onion service wrong client authorization",
        0xF6 => "invalid onion service address",
        0xF7 => "onion service introduction timed out",
        other => return ConnectError::ProxyRejected(format!("unknown reply code {:#04x}", other)),
    };
    ConnectError::ProxyRejected(reason.to_string())
}

fn io_error(err: std::io::Error) -> ConnectError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ConnectError::Protocol("proxy closed the connection".to_string())
    } else {
        ConnectError::Protocol(err.to_string())
    }
}
