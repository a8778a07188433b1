use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to open a proxied stream.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ConnectError {
    #[error("connect timed out")]
    Timeout,

    #[error("proxy rejected request: {0}")]
    ProxyRejected(String),

    #[error("connection refused by destination")]
    Refused,

    #[error("proxy unavailable: {0}")]
    ProxyUnavailable(String),

    #[error("proxy protocol error: {0}")]
    Protocol(String),

    #[error("invalid destination address: {0}")]
    InvalidAddress(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls failure: {0}")]
    TlsFailure(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParseError {
    #[error("malformed content: {0}")]
    MalformedContent(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CertificateError {
    #[error("connect failed: {0}")]
    Connect(ConnectError),

    #[error("tls handshake failed: {0}")]
    Handshake(String),

    #[error("peer presented no certificate")]
    NoCertificate,

    #[error("certificate parse failed: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("descriptor lookup failed: {0}")]
pub struct DescriptorLookupError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty target")]
    Empty,

    #[error("unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("cannot parse target '{0}': {1}")]
    Invalid(String, String),
}

impl From<ConnectError> for CertificateError {
    fn from(err: ConnectError) -> Self {
        CertificateError::Connect(err)
    }
}

/// Per-port banner capture failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BannerError {
    #[error("connect failed: {0}")]
    Connect(ConnectError),

    #[error("no banner before read timeout")]
    ReadTimeout,

    #[error("read failed: {0}")]
    Read(String),

    #[error("connection closed without data")]
    Closed,
}
