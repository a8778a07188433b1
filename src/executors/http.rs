use crate::config::ProxyConfig;
use crate::config::types::HttpConfig;
use crate::core::errors::FetchError;
use crate::core::models::FetchResult;
use crate::executors::tls::parse_certificate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::tls::TlsInfo;
use reqwest::Client;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub follow_redirects: bool,
}

impl FetchOptions {
    /// Page loads follow redirects like a browser would.
    pub fn page(timeout: Duration) -> Self {
        Self { timeout, follow_redirects: true }
    }

    /// Probes report the first response as-is so redirects stay visible.
    pub fn probe(timeout: Duration) -> Self {
        Self { timeout, follow_redirects: false }
    }
}

/// One proxied GET. Never fails: network problems come back as a
/// `FetchResult` carrying an error marker and an empty body.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, options: FetchOptions) -> FetchResult;
}

/// HTTP(S) client tunneled through the SOCKS proxy. Idle connections are
/// not pooled, so each request owns its tunnel for its lifetime.
pub struct ContentFetcher {
    following: Client,
    direct: Client,
    max_body_bytes: usize,
}

impl ContentFetcher {
    pub fn new(proxy: &ProxyConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            following: build_client(proxy, http, Policy::limited(http.max_redirects))?,
            direct: build_client(proxy, http, Policy::none())?,
            max_body_bytes: http.max_body_bytes,
        })
    }

    async fn execute(&self, url: &Url, options: FetchOptions) -> Result<FetchResult, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let client = if options.follow_redirects { &self.following } else { &self.direct };
        let mut response = client
            .get(url.clone())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let certificate = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .and_then(|der| match parse_certificate(der) {
                Ok(cert) => Some(cert),
                Err(e) => {
                    tracing::debug!("Unparseable certificate from {}: {}", final_url, e);
                    None
                }
            });

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                tracing::debug!("Body of {} truncated at {} bytes", final_url, self.max_body_bytes);
                break;
            }
        }

        Ok(FetchResult {
            headers,
            certificate,
            ..FetchResult::response(final_url, status, body)
        })
    }
}

#[async_trait]
impl Fetcher for ContentFetcher {
    async fn fetch(&self, url: &Url, options: FetchOptions) -> FetchResult {
        match self.execute(url, options).await {
            Ok(result) => {
                tracing::debug!("GET {} -> {:?} ({} bytes)", url, result.status, result.body.len());
                result
            }
            Err(e) => {
                tracing::debug!("GET {} failed: {}", url, e);
                FetchResult::failed(url.as_str(), e)
            }
        }
    }
}

fn build_client(proxy: &ProxyConfig, http: &HttpConfig, redirects: Policy) -> Result<Client> {
    let proxy = reqwest::Proxy::all(proxy.socks_url())
        .with_context(|| format!("Invalid proxy URL: {}", proxy.socks_url()))?;

    Client::builder()
        .proxy(proxy)
        .user_agent(http.user_agent.clone())
        .redirect(redirects)
        .danger_accept_invalid_certs(true)
        .tls_info(true)
        .pool_max_idle_per_host(0)
        .build()
        .context("Failed to create HTTP client")
}

fn classify(err: reqwest::Error) -> FetchError {
    let detail = describe(&err);
    if err.is_timeout() {
        FetchError::Timeout
    } else if caused_by_tls(&err) {
        FetchError::TlsFailure(detail)
    } else if err.is_connect() {
        FetchError::Connect(detail)
    } else if err.is_builder() {
        FetchError::InvalidUrl(detail)
    } else {
        FetchError::MalformedResponse(detail)
    }
}

fn caused_by_tls(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

/// reqwest's own message is terse; append the cause chain.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}
