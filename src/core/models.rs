use super::errors::{BannerError, FetchError, TargetError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

/// One scan input: the address as supplied plus the URL it resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub address: String, // as supplied, trimmed
    pub host: String,    // lowercased hostname
    pub scheme: Scheme,
    pub url: Url,
}

impl Target {
    /// Accepts a bare host (`abc.onion`), `host:port` or a full http(s) URL.
    /// Bare hosts default to plain http, which is what onion services speak.
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let address = input.trim();
        if address.is_empty() {
            return Err(TargetError::Empty);
        }

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let url = Url::parse(&candidate)
            .map_err(|e| TargetError::Invalid(address.to_string(), e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(TargetError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::Invalid(address.to_string(), "missing host".to_string()))?
            .to_ascii_lowercase();

        Ok(Self {
            address: address.to_string(),
            host,
            scheme,
            url,
        })
    }

    /// `scheme://host[:port]/` with path, query and fragment removed.
    pub fn base_url(&self) -> Url {
        let mut base = self.url.clone();
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);
        base
    }

    pub fn join(&self, path: &str) -> Option<Url> {
        self.base_url().join(path).ok()
    }
}

/// Leaf certificate metadata captured from a TLS handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub issuer: String,
    pub subject: String,
    pub not_before: String,
    pub not_after: String,
    pub serial: String,
    pub signature_algorithm: String,
    pub fingerprint_sha256: String,
    pub subject_alt_names: Vec<String>,
}

/// Outcome of one proxied HTTP(S) GET. Either `status` or `error` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub url: String,
    pub status: Option<u16>,
    pub error: Option<FetchError>,
    pub headers: BTreeMap<String, String>, // lowercase names
    pub body: Vec<u8>,
    pub certificate: Option<CertificateInfo>,
}

impl FetchResult {
    pub fn failed(url: impl Into<String>, error: FetchError) -> Self {
        Self {
            url: url.into(),
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn response(url: impl Into<String>, status: u16, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            body,
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// True when any HTTP response came back, whatever its status.
    pub fn has_response(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, Some(300..=399))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn summary(&self) -> FetchSummary {
        FetchSummary {
            url: self.url.clone(),
            status: self.status,
            error: self.error.clone(),
            content_length: self.body.len(),
            headers: self.headers.clone(),
        }
    }
}

/// Body-less view of the base fetch as it appears in the report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    pub url: String,
    pub status: Option<u16>,
    pub error: Option<FetchError>,
    pub content_length: usize,
    pub headers: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCheckResult {
    pub path: String,
    pub exposed: bool,
    pub status: Option<u16>,
    pub content_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchError>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ssh,
    Ftp,
    Smtp,
    Xmpp,
    Bitcoin,
    Irc,
    Vnc,
    Mongodb,
}

impl Protocol {
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Ssh => "ssh",
            Protocol::Ftp => "ftp",
            Protocol::Smtp => "smtp",
            Protocol::Xmpp => "xmpp",
            Protocol::Bitcoin => "bitcoin",
            Protocol::Irc => "irc",
            Protocol::Vnc => "vnc",
            Protocol::Mongodb => "mongodb",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerResult {
    pub port: u16,
    pub protocol: Protocol,
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BannerError>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub url: String,
    pub metadata: BTreeMap<String, String>,
}

/// Everything pulled out of the page body, one set per category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub onion_links: BTreeSet<String>,
    pub crypto_addresses: BTreeSet<String>,
    pub pgp_blocks: BTreeSet<String>,
    pub emails: BTreeSet<String>,
    pub analytics_ids: BTreeSet<String>,
    pub images: Vec<ImageMetadata>,
}

impl ArtifactSet {
    pub fn is_empty(&self) -> bool {
        self.onion_links.is_empty()
            && self.crypto_addresses.is_empty()
            && self.pgp_blocks.is_empty()
            && self.emails.is_empty()
            && self.analytics_ids.is_empty()
            && self.images.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.onion_links.len()
            + self.crypto_addresses.len()
            + self.pgp_blocks.len()
            + self.emails.len()
            + self.analytics_ids.len()
            + self.images.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMetadata {
    pub nickname: Option<String>,
    pub published: Option<String>,
    pub platform: Option<String>,
    pub contact: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Fetch,
    PathProbe,
    BannerScan,
    Certificate,
    Artifacts,
    Descriptor,
}

/// A non-fatal failure recorded while scanning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub component: Component,
    pub message: String,
}

impl ScanIssue {
    pub fn new(component: Component, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub fetch: FetchSummary,
    pub metadata: BTreeMap<String, String>,
    pub certificate: Option<CertificateInfo>,
    pub paths: Vec<PathCheckResult>,
    pub banners: BTreeMap<u16, BannerResult>,
    pub artifacts: ArtifactSet,
    pub fingerprint: Option<String>,
    pub descriptor: Option<DescriptorMetadata>,
    pub errors: Vec<ScanIssue>,
}

impl ScanReport {
    pub fn exposed_paths(&self) -> impl Iterator<Item = &PathCheckResult> {
        self.paths.iter().filter(|p| p.exposed)
    }

    pub fn captured_banners(&self) -> impl Iterator<Item = &BannerResult> {
        self.banners.values().filter(|b| b.banner.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("abc.onion", Scheme::Http, "abc.onion", "http://abc.onion/")]
    #[case("  https://ABC.onion/index.php ", Scheme::Https, "abc.onion", "https://abc.onion/")]
    #[case("abc.onion:8080", Scheme::Http, "abc.onion", "http://abc.onion:8080/")]
    #[case("http://abc.onion/a/b?c=d#e", Scheme::Http, "abc.onion", "http://abc.onion/")]
    fn test_target_parse(
        #[case] input: &str,
        #[case] scheme: Scheme,
        #[case] host: &str,
        #[case] base: &str,
    ) {
        let target = Target::parse(input).unwrap();
        assert_eq!(target.scheme, scheme);
        assert_eq!(target.host, host);
        assert_eq!(target.base_url().as_str(), base);
        assert_eq!(target.address, input.trim());
    }

    #[test]
    fn test_target_parse_rejects_bad_input() {
        assert_eq!(Target::parse("   "), Err(TargetError::Empty));
        assert!(matches!(
            Target::parse("ftp://abc.onion"),
            Err(TargetError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(Target::parse("http://"), Err(TargetError::Invalid(..))));
    }

    #[test]
    fn test_target_join() {
        let target = Target::parse("http://abc.onion/deep/page").unwrap();
        assert_eq!(
            target.join("/.git/HEAD").unwrap().as_str(),
            "http://abc.onion/.git/HEAD"
        );
    }

    #[test]
    fn test_fetch_result_classification() {
        let ok = FetchResult::response("http://a.onion/", 204, vec![]);
        assert!(ok.has_response() && ok.is_success() && !ok.is_redirect());

        let moved = FetchResult::response("http://a.onion/", 302, vec![])
            .with_header("Location", "/login");
        assert!(moved.is_redirect());
        assert_eq!(moved.location(), Some("/login"));

        let failed = FetchResult::failed("http://a.onion/", FetchError::Timeout);
        assert!(!failed.has_response());
        assert!(failed.body.is_empty());
    }

    #[test]
    fn test_report_json_round_trip() {
        let mut banners = BTreeMap::new();
        banners.insert(
            22,
            BannerResult {
                port: 22,
                protocol: Protocol::Ssh,
                banner: Some("SSH-2.0-OpenSSH_9.6".to_string()),
                error: None,
            },
        );
        banners.insert(
            21,
            BannerResult {
                port: 21,
                protocol: Protocol::Ftp,
                banner: None,
                error: Some(BannerError::Connect(
                    crate::core::errors::ConnectError::Timeout,
                )),
            },
        );

        let mut artifacts = ArtifactSet::default();
        artifacts.emails.insert("ops@example.com".to_string());
        artifacts.images.push(ImageMetadata {
            url: "http://abc.onion/a.jpg".to_string(),
            metadata: BTreeMap::from([("Make".to_string(), "Canon".to_string())]),
        });

        let report = ScanReport {
            target: "abc.onion".to_string(),
            url: "http://abc.onion/".to_string(),
            timestamp: Utc::now(),
            fetch: FetchResult::response("http://abc.onion/", 200, b"<html></html>".to_vec())
                .with_header("Server", "nginx")
                .summary(),
            metadata: BTreeMap::from([("Server".to_string(), "nginx".to_string())]),
            certificate: Some(CertificateInfo {
                issuer: "CN=abc".to_string(),
                ..Default::default()
            }),
            paths: vec![PathCheckResult {
                path: "/admin".to_string(),
                exposed: true,
                status: Some(200),
                content_length: 512,
                location: None,
                error: None,
            }],
            banners,
            artifacts,
            fingerprint: Some("d54b7b623983de5b6880519382f60059f00539d4".to_string()),
            descriptor: Some(DescriptorMetadata {
                nickname: Some("relay".to_string()),
                ..Default::default()
            }),
            errors: vec![ScanIssue::new(Component::BannerScan, "port 21: connect timed out")],
        };

        let json = serde_json::to_string_pretty(&report).unwrap();
        let back: ScanReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
