use crate::core::errors::{BannerError, ConnectError};
use crate::core::models::{BannerResult, Protocol};
use crate::executors::socks::{BoxedStream, Connector};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout};

const BITCOIN_MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];
const BITCOIN_PROTOCOL_VERSION: i32 = 70015;
const MONGO_OP_QUERY: i32 = 2004;

/// Captures the greeting each catalog service sends on connect. Every port
/// gets its own tunnel and its own timeouts; one slow port never holds up
/// the rest.
pub struct BannerScanner {
    connector: Arc<dyn Connector>,
    concurrency: usize,
    max_bytes: usize,
}

impl BannerScanner {
    pub fn new(connector: Arc<dyn Connector>, concurrency: usize, max_bytes: usize) -> Self {
        Self {
            connector,
            concurrency: concurrency.max(1),
            max_bytes: max_bytes.max(1),
        }
    }

    pub async fn scan(&self, host: &str, catalog: &[(u16, Protocol)], per_port: Duration) -> BTreeMap<u16, BannerResult> {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::new();

        for &(port, protocol) in catalog {
            let sem = Arc::clone(&sem);
            let connector = Arc::clone(&self.connector);
            let host = host.to_string();
            let max_bytes = self.max_bytes;

            let task = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                grab(connector.as_ref(), &host, port, protocol, per_port, max_bytes).await
            });
            tasks.push((port, protocol, task));
        }

        let mut results = BTreeMap::new();
        for (port, protocol, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(BannerError::Read(format!("probe task failed: {}", e))),
            };

            let result = match outcome {
                Ok(banner) => {
                    tracing::debug!("{}:{} ({}) -> {:?}", host, port, protocol.label(), banner);
                    BannerResult { port, protocol, banner: Some(banner), error: None }
                }
                Err(e) => {
                    tracing::debug!("{}:{} ({}) failed: {}", host, port, protocol.label(), e);
                    BannerResult { port, protocol, banner: None, error: Some(e) }
                }
            };
            results.insert(port, result);
        }

        let captured = results.values().filter(|r| r.banner.is_some()).count();
        tracing::info!("Banner scan on {}: {}/{} ports answered", host, captured, results.len());
        results
    }
}

async fn grab(
    connector: &dyn Connector,
    host: &str,
    port: u16,
    protocol: Protocol,
    limit: Duration,
    max_bytes: usize,
) -> Result<String, BannerError> {
    let mut stream = match timeout(limit, connector.connect(host, port, limit)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(BannerError::Connect(e)),
        Err(_) => return Err(BannerError::Connect(ConnectError::Timeout)),
    };

    if let Some(greeting) = greeting(protocol, host, port) {
        match timeout(limit, stream.write_all(&greeting)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BannerError::Read(format!("greeting not sent: {}", e))),
            Err(_) => return Err(BannerError::Read("greeting write timed out".to_string())),
        }
    }

    let line_mode = is_line_oriented(protocol);
    let raw = read_banner(&mut stream, line_mode, max_bytes, limit).await?;
    let banner = render(&raw, line_mode);
    if banner.is_empty() {
        return Err(BannerError::Closed);
    }
    Ok(banner)
}

fn is_line_oriented(protocol: Protocol) -> bool {
    matches!(
        protocol,
        Protocol::Ssh | Protocol::Ftp | Protocol::Smtp | Protocol::Irc | Protocol::Vnc
    )
}

/// Line-oriented services are read up to the first newline; the rest are
/// read until the first chunk arrives. Both stop at `max_bytes` or when
/// `limit` runs out.
async fn read_banner(stream: &mut BoxedStream, line_mode: bool, max_bytes: usize, limit: Duration) -> Result<Vec<u8>, BannerError> {
    let deadline = Instant::now() + limit;
    let mut banner = Vec::new();
    let mut chunk = [0u8; 512];
    let mut timed_out = false;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, stream.read(&mut chunk)).await {
            Err(_) => {
                timed_out = true;
                break;
            }
            Ok(Err(e)) if banner.is_empty() => return Err(BannerError::Read(e.to_string())),
            Ok(Err(_)) | Ok(Ok(0)) => break,
            Ok(Ok(n)) => banner.extend_from_slice(&chunk[..n]),
        }

        if banner.len() >= max_bytes {
            banner.truncate(max_bytes);
            break;
        }
        if !line_mode || first_line(&banner).is_some() {
            break;
        }
    }

    match (banner.is_empty(), timed_out) {
        (false, _) => Ok(banner),
        (true, true) => Err(BannerError::ReadTimeout),
        (true, false) => Err(BannerError::Closed),
    }
}

/// First newline-terminated line with something on it.
fn first_line(raw: &[u8]) -> Option<&[u8]> {
    raw.split_inclusive(|&b| b == b'\n')
        .take_while(|line| line.ends_with(b"\n"))
        .find(|line| !line.trim_ascii().is_empty())
}

fn render(raw: &[u8], line_mode: bool) -> String {
    let bytes = if line_mode {
        first_line(raw).unwrap_or(raw).trim_ascii_start()
    } else {
        raw
    };

    bytes
        .trim_ascii_end()
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

/// Bytes a client must send before the service says anything.
fn greeting(protocol: Protocol, host: &str, port: u16) -> Option<Vec<u8>> {
    match protocol {
        Protocol::Xmpp => Some(xmpp_stream_header(host)),
        Protocol::Mongodb => Some(mongo_is_master()),
        Protocol::Bitcoin => Some(bitcoin_version(port, chrono::Utc::now().timestamp())),
        _ => None,
    }
}

fn xmpp_stream_header(host: &str) -> Vec<u8> {
    format!(
        "<?xml version='1.0'?><stream:stream to='{}' xmlns='jabber:client' \
         xmlns:stream='http://etherx.jabber.org/streams' version='1.0'>",
        host
    )
    .into_bytes()
}

/// Legacy OP_QUERY `{isMaster: 1}` against `admin.$cmd`; every server
/// version still answers it.
fn mongo_is_master() -> Vec<u8> {
    let mut query = Vec::new();
    query.push(0x10); // int32 element
    query.extend_from_slice(b"isMaster\0");
    query.extend_from_slice(&1i32.to_le_bytes());
    query.push(0x00);
    let doc_len = (query.len() + 4) as i32;

    let mut body = Vec::new();
    body.extend_from_slice(&0i32.to_le_bytes()); // flags
    body.extend_from_slice(b"admin.$cmd\0");
    body.extend_from_slice(&0i32.to_le_bytes()); // numberToSkip
    body.extend_from_slice(&(-1i32).to_le_bytes()); // numberToReturn
    body.extend_from_slice(&doc_len.to_le_bytes());
    body.extend_from_slice(&query);

    let mut message = Vec::new();
    message.extend_from_slice(&((body.len() + 16) as i32).to_le_bytes());
    message.extend_from_slice(&1i32.to_le_bytes()); // requestID
    message.extend_from_slice(&0i32.to_le_bytes()); // responseTo
    message.extend_from_slice(&MONGO_OP_QUERY.to_le_bytes());
    message.extend_from_slice(&body);
    message
}

fn bitcoin_version(port: u16, timestamp: i64) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&BITCOIN_PROTOCOL_VERSION.to_le_bytes());
    payload.extend_from_slice(&0u64.to_le_bytes()); // services
    payload.extend_from_slice(&timestamp.to_le_bytes());
    push_net_addr(&mut payload, port); // addr_recv
    push_net_addr(&mut payload, 0); // addr_from
    payload.extend_from_slice(&0x6f6e_696f_6e73_6361u64.to_le_bytes()); // nonce
    let agent = b"/onionscan:0.1/";
    payload.push(agent.len() as u8);
    payload.extend_from_slice(agent);
    payload.extend_from_slice(&0i32.to_le_bytes()); // start_height
    payload.push(0); // relay

    let mut command = [0u8; 12];
    command[..7].copy_from_slice(b"version");

    let mut message = Vec::with_capacity(24 + payload.len());
    message.extend_from_slice(&BITCOIN_MAGIC);
    message.extend_from_slice(&command);
    message.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    message.extend_from_slice(&double_sha256(&payload)[..4]);
    message.extend_from_slice(&payload);
    message
}

fn push_net_addr(buf: &mut Vec<u8>, port: u16) {
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&[0u8; 10]);
    buf.extend_from_slice(&[0xFF, 0xFF, 0, 0, 0, 0]);
    buf.extend_from_slice(&port.to_be_bytes());
}

fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}
