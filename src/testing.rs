//! Test doubles shared by the unit tests: an in-process SOCKS5 proxy that
//! plays the destination side, plus in-memory fetcher and connector stubs.

use crate::config::ProxyConfig;
use crate::core::errors::{ConnectError, FetchError};
use crate::core::models::FetchResult;
use crate::executors::http::{FetchOptions, Fetcher};
use crate::executors::socks::{BoxedStream, Connector};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// Canned HTTP response served by [`Destination::Http`].
#[derive(Clone, Debug)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: vec![], body: body.into() }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type HttpHandler = Arc<dyn Fn(&str) -> HttpReply + Send + Sync>;
type GreetingHandler = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// What the fake proxy does once a CONNECT request arrives.
#[derive(Clone)]
pub enum Destination {
    /// Fail the CONNECT with this SOCKS reply code.
    Reject(u8),
    /// Never answer the CONNECT request.
    Hang,
    /// Connect, then immediately send these bytes.
    Banner(Vec<u8>),
    /// Connect, then stay silent.
    Silent,
    /// Connect and serve one HTTP/1.1 request, keyed by request path.
    Http(HttpHandler),
}

impl Destination {
    pub fn http<F>(handler: F) -> Self
    where
        F: Fn(&str) -> HttpReply + Send + Sync + 'static,
    {
        Destination::Http(Arc::new(handler))
    }
}

pub struct FakeProxy {
    pub config: ProxyConfig,
    requests: Arc<Mutex<Vec<(String, u16)>>>,
}

impl FakeProxy {
    pub async fn spawn<F>(route: F) -> Self
    where
        F: Fn(&str, u16) -> Destination + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let route = Arc::new(route);

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else { break };
                let route = Arc::clone(&route);
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let _ = serve(socket, route.as_ref(), &seen).await;
                });
            }
        });

        Self {
            config: ProxyConfig { host: "127.0.0.1".to_string(), port },
            requests,
        }
    }

    pub fn requests(&self) -> Vec<(String, u16)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve<F>(mut socket: TcpStream, route: &F, seen: &Mutex<Vec<(String, u16)>>) -> std::io::Result<()>
where
    F: Fn(&str, u16) -> Destination,
{
    let mut head = [0u8; 2];
    socket.read_exact(&mut head).await?;
    let mut methods = vec![0u8; head[1] as usize];
    socket.read_exact(&mut methods).await?;
    socket.write_all(&[5, 0]).await?;

    let mut request = [0u8; 4];
    socket.read_exact(&mut request).await?;
    let host = match request[3] {
        1 => {
            let mut ip = [0u8; 4];
            socket.read_exact(&mut ip).await?;
            std::net::Ipv4Addr::from(ip).to_string()
        }
        4 => {
            let mut ip = [0u8; 16];
            socket.read_exact(&mut ip).await?;
            std::net::Ipv6Addr::from(ip).to_string()
        }
        _ => {
            let mut len = [0u8; 1];
            socket.read_exact(&mut len).await?;
            let mut name = vec![0u8; len[0] as usize];
            socket.read_exact(&mut name).await?;
            String::from_utf8_lossy(&name).into_owned()
        }
    };
    let mut port = [0u8; 2];
    socket.read_exact(&mut port).await?;
    let port = u16::from_be_bytes(port);
    seen.lock().unwrap().push((host.clone(), port));

    let destination = route(&host, port);
    if let Destination::Reject(code) = destination {
        socket.write_all(&[5, code, 0, 1, 0, 0, 0, 0, 0, 0]).await?;
        return Ok(());
    }
    if let Destination::Hang = destination {
        std::future::pending::<()>().await;
    }
    socket.write_all(&[5, 0, 0, 1, 127, 0, 0, 1, 0, 0]).await?;

    match destination {
        Destination::Banner(bytes) => {
            socket.write_all(&bytes).await?;
            drain(&mut socket).await
        }
        Destination::Silent => drain(&mut socket).await,
        Destination::Http(handler) => {
            let path = read_request_path(&mut socket).await?;
            let reply = handler(&path);
            let mut raw = format!("HTTP/1.1 {} Test\r\n", reply.status);
            for (name, value) in &reply.headers {
                raw.push_str(&format!("{}: {}\r\n", name, value));
            }
            raw.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", reply.body.len()));
            socket.write_all(raw.as_bytes()).await?;
            socket.write_all(&reply.body).await?;
            socket.shutdown().await
        }
        Destination::Reject(_) | Destination::Hang => Ok(()),
    }
}

async fn drain(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; 512];
    while socket.read(&mut buf).await? > 0 {}
    Ok(())
}

async fn read_request_path(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
    }
    let text = String::from_utf8_lossy(&raw);
    Ok(text
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string())
}

/// A localhost port with nothing listening on it.
pub fn unused_local_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Fetcher answering from a URL -> result table; unknown URLs 404.
#[derive(Default, Clone)]
pub struct StubFetcher {
    pages: HashMap<String, FetchResult>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.pages.insert(url.to_string(), FetchResult::response(url, status, body.to_vec()));
        self
    }

    pub fn result(mut self, url: &str, result: FetchResult) -> Self {
        self.pages.insert(url.to_string(), result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url, _options: FetchOptions) -> FetchResult {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| FetchResult::response(url.as_str(), 404, b"not found".to_vec()))
    }
}

/// Fetcher for which every request fails at the network level.
pub struct DeadFetcher;

#[async_trait]
impl Fetcher for DeadFetcher {
    async fn fetch(&self, url: &Url, _options: FetchOptions) -> FetchResult {
        FetchResult::failed(url.as_str(), FetchError::Connect("proxy unavailable".to_string()))
    }
}

/// How [`StubConnector`] treats one port.
#[derive(Clone)]
pub enum PortBehavior {
    Banner(Vec<u8>),
    Fail(ConnectError),
    Hang,
    Silent,
    Greeting(GreetingHandler),
}

/// Connector backed by in-memory duplex pipes; unlisted ports are refused.
#[derive(Default, Clone)]
pub struct StubConnector {
    ports: HashMap<u16, PortBehavior>,
}

impl StubConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16, behavior: PortBehavior) -> Self {
        self.ports.insert(port, behavior);
        self
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(&self, _host: &str, port: u16, _limit: Duration) -> Result<BoxedStream, ConnectError> {
        let behavior = self
            .ports
            .get(&port)
            .cloned()
            .unwrap_or(PortBehavior::Fail(ConnectError::Refused));

        let (client, mut server) = tokio::io::duplex(8192);
        match behavior {
            PortBehavior::Fail(err) => return Err(err),
            PortBehavior::Hang => {
                std::future::pending::<()>().await;
            }
            PortBehavior::Banner(bytes) => {
                tokio::spawn(async move {
                    let _ = server.write_all(&bytes).await;
                    let mut buf = [0u8; 256];
                    while matches!(server.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
            PortBehavior::Silent => {
                tokio::spawn(async move {
                    let mut buf = [0u8; 256];
                    while matches!(server.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
            PortBehavior::Greeting(handler) => {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    if let Ok(n) = server.read(&mut buf).await {
                        let _ = server.write_all(&handler(&buf[..n])).await;
                    }
                    while matches!(server.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        }
        Ok(Box::new(client))
    }
}

/// Minimal JPEG: SOI, an APP1 segment holding a little-endian TIFF
/// block with IFD0 `Make` and `Model`, then EOI.
pub fn jpeg_with_make(make: &str, model: &str) -> Vec<u8> {
    let make = format!("{}\0", make);
    let model = format!("{}\0", model);
    let data_start = 8 + 2 + 2 * 12 + 4;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    for (tag, text, offset) in [
        (0x010Fu16, &make, data_start),
        (0x0110u16, &model, data_start + make.len()),
    ] {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes()); // ASCII
        tiff.extend_from_slice(&(text.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&(offset as u32).to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(make.as_bytes());
    tiff.extend_from_slice(model.as_bytes());

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(&app1);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
