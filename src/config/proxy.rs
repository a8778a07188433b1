use serde::{Deserialize, Serialize};

pub const DEFAULT_PROXY_HOST: &str = "127.0.0.1";
pub const DEFAULT_PROXY_PORT: u16 = 9050;

pub const ENV_PROXY_HOST: &str = "TOR_PROXY_HOST";
pub const ENV_PROXY_PORT: &str = "TOR_PROXY_PORT";

/// SOCKS5 endpoint every probe is tunneled through. Resolved once at
/// startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROXY_HOST.to_string(),
            port: DEFAULT_PROXY_PORT,
        }
    }
}

impl ProxyConfig {
    /// Precedence per field: explicit value, then `env`, then the default.
    /// The first source that is set wins; if its port is not a valid
    /// non-zero number the default port is used.
    pub fn resolve<F>(explicit_host: Option<&str>, explicit_port: Option<&str>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = pick(explicit_host, env(ENV_PROXY_HOST))
            .unwrap_or_else(|| DEFAULT_PROXY_HOST.to_string());

        let port = pick(explicit_port, env(ENV_PROXY_PORT))
            .and_then(|raw| parse_port(&raw))
            .unwrap_or(DEFAULT_PROXY_PORT);

        Self { host, port }
    }

    pub fn from_env(explicit_host: Option<&str>, explicit_port: Option<&str>) -> Self {
        Self::resolve(explicit_host, explicit_port, |key| std::env::var(key).ok())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL for the HTTP client; `socks5h` so hostnames resolve on
    /// the proxy side, which onion addresses require.
    pub fn socks_url(&self) -> String {
        format!("socks5h://{}:{}", self.host, self.port)
    }
}

fn pick(explicit: Option<&str>, env: Option<String>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| env.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|p| *p != 0)
}
