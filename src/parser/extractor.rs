use super::crypto::is_valid_bitcoin_address;
use super::document::PageDocument;
use super::exif::read_metadata;
use crate::core::errors::ParseError;
use crate::core::models::{ArtifactSet, Component, ImageMetadata, ScanIssue, Target};
use crate::executors::http::{FetchOptions, Fetcher};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".js"];

/// Pulls cross-links, payment addresses, key blocks, contacts, tracking
/// IDs and image metadata out of a fetched page.
pub struct ArtifactExtractor {
    fetcher: Arc<dyn Fetcher>,
    image_concurrency: usize,
    max_images: usize,
    onion: Regex,
    onion_host: Regex,
    bare_onion_href: Regex,
    base58: Regex,
    segwit: Regex,
    pgp_begin: Regex,
    email: Regex,
    analytics: Regex,
}

impl ArtifactExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>, image_concurrency: usize, max_images: usize) -> Result<Self> {
        Ok(Self {
            fetcher,
            image_concurrency: image_concurrency.max(1),
            max_images,
            onion: Regex::new(r"\b([a-z2-7]{56}|[a-z2-7]{16})\.onion\b").context("onion pattern")?,
            onion_host: Regex::new(r"(?:^|\.)([a-z2-7]{56}|[a-z2-7]{16})\.onion\.?$").context("onion host pattern")?,
            bare_onion_href: Regex::new(r"^(?:[a-z0-9-]+\.)*(?:[a-z2-7]{56}|[a-z2-7]{16})\.onion(?:[:/?#]|$)")
                .context("bare onion href pattern")?,
            base58: Regex::new(r"\b[13][a-km-zA-HJ-NP-Z1-9]{25,34}\b").context("base58 pattern")?,
            segwit: Regex::new(r"(?i)\bbc1[ac-hj-np-z02-9]{11,71}\b").context("segwit pattern")?,
            pgp_begin: Regex::new(r"-----BEGIN PGP ([A-Z ]+)-----").context("pgp begin pattern")?,
            email: Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").context("email pattern")?,
            analytics: Regex::new(r"\b(?:UA-\d{4,10}-\d{1,4}|G-[A-Z0-9]{10}|GTM-[A-Z0-9]{4,8}|ca-pub-\d{16})\b")
                .context("analytics pattern")?,
        })
    }

    /// Runs every pass over one parsed copy of `html`. Relative links and
    /// image sources resolve against `page_url`. Per-category problems come
    /// back as issues next to whatever the other passes found.
    pub async fn extract(&self, html: &str, page_url: &Url, target: &Target, limit: Duration) -> (ArtifactSet, Vec<ScanIssue>) {
        let document = PageDocument::parse(html);
        let mut issues = Vec::new();

        let mut artifacts = ArtifactSet {
            onion_links: self.onion_links(&document, page_url, target),
            crypto_addresses: self.crypto_addresses(&document),
            emails: self.emails(&document),
            analytics_ids: self.analytics_ids(&document),
            ..Default::default()
        };

        match self.searchable_text(&document).map(|text| self.pgp_blocks(text)).collect::<Result<Vec<_>, _>>() {
            Ok(found) => artifacts.pgp_blocks = found.into_iter().flatten().collect(),
            Err(e) => issues.push(ScanIssue::new(Component::Artifacts, format!("pgp blocks: {}", e))),
        }

        let (images, image_issues) = self.images(&document, page_url, limit).await;
        artifacts.images = images;
        issues.extend(image_issues);

        debug!(
            "Artifacts for {}: {} onions, {} crypto, {} pgp, {} emails, {} analytics, {} images",
            target.host,
            artifacts.onion_links.len(),
            artifacts.crypto_addresses.len(),
            artifacts.pgp_blocks.len(),
            artifacts.emails.len(),
            artifacts.analytics_ids.len(),
            artifacts.images.len()
        );

        (artifacts, issues)
    }

    fn bare_onion(&self, text: &str) -> Option<String> {
        self.onion
            .captures(&text.to_ascii_lowercase())
            .and_then(|caps| caps.get(1).map(|m| format!("{}.onion", m.as_str())))
    }

    /// Resolves `href` against the page and returns the bare onion address
    /// of its host, if the host is one.
    fn link_onion(&self, href: &str, page_url: &Url) -> Option<String> {
        let href = href.to_ascii_lowercase();
        // A scheme-less "name.onion/..." is a host, not a relative path.
        let resolved = if self.bare_onion_href.is_match(&href) {
            Url::parse(&format!("http://{}", href)).ok()?
        } else {
            page_url.join(&href).ok()?
        };
        let host = resolved.host_str()?.to_ascii_lowercase();
        self.onion_host
            .captures(&host)
            .and_then(|caps| caps.get(1).map(|m| format!("{}.onion", m.as_str())))
    }

    fn onion_links(&self, document: &PageDocument, page_url: &Url, target: &Target) -> BTreeSet<String> {
        let own = self.bare_onion(&target.host);
        document
            .links
            .iter()
            .filter_map(|href| self.link_onion(href, page_url))
            .filter(|onion| own.as_deref() != Some(onion.as_str()))
            .collect()
    }

    /// Visible text plus comment bodies.
    fn searchable_text<'a>(&self, document: &'a PageDocument) -> impl Iterator<Item = &'a str> {
        std::iter::once(document.text.as_str()).chain(document.comments.iter().map(String::as_str))
    }

    fn searchable<'a>(&self, document: &'a PageDocument) -> impl Iterator<Item = &'a str> {
        self.searchable_text(document).chain(document.attributes.iter().map(String::as_str))
    }

    fn crypto_addresses(&self, document: &PageDocument) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for haystack in self.searchable(document) {
            let candidates = self
                .base58
                .find_iter(haystack)
                .chain(self.segwit.find_iter(haystack))
                .map(|m| m.as_str());
            for candidate in candidates {
                if is_valid_bitcoin_address(candidate) {
                    found.insert(candidate.to_string());
                } else {
                    debug!("Discarding invalid address candidate {}", candidate);
                }
            }
        }
        found
    }

    /// Complete armored blocks, verbatim. `BEGIN PGP X` closes at the next
    /// `END PGP X`; a clearsigned message runs through the end of its
    /// signature. A block that opens but never closes makes the whole
    /// category malformed.
    fn pgp_blocks(&self, text: &str) -> Result<BTreeSet<String>, ParseError> {
        let mut blocks = BTreeSet::new();
        let mut unterminated = 0;
        let mut cursor = 0;

        while let Some(caps) = self.pgp_begin.captures(&text[cursor..]) {
            let (Some(open), Some(label)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let start = cursor + open.start();
            let body = cursor + open.end();
            let closing = match label.as_str() {
                "SIGNED MESSAGE" => "SIGNATURE",
                other => other,
            };
            let end_marker = format!("-----END PGP {}-----", closing);

            match text[body..].find(&end_marker) {
                Some(offset) => {
                    let end = body + offset + end_marker.len();
                    blocks.insert(text[start..end].to_string());
                    cursor = end;
                }
                None => {
                    unterminated += 1;
                    cursor = body;
                }
            }
        }

        if unterminated > 0 {
            return Err(ParseError::MalformedContent(format!(
                "{} unterminated armor block(s)",
                unterminated
            )));
        }
        Ok(blocks)
    }

    fn emails(&self, document: &PageDocument) -> BTreeSet<String> {
        self.searchable(document)
            .flat_map(|haystack| self.email.find_iter(haystack).map(|m| m.as_str().to_ascii_lowercase()))
            .filter(|email| !ASSET_SUFFIXES.iter().any(|suffix| email.ends_with(suffix)))
            .collect()
    }

    fn analytics_ids(&self, document: &PageDocument) -> BTreeSet<String> {
        self.searchable(document)
            .flat_map(|haystack| self.analytics.find_iter(haystack).map(|m| m.as_str().to_string()))
            .collect()
    }

    fn image_urls(&self, document: &PageDocument, page_url: &Url) -> Vec<Url> {
        let mut seen = HashSet::new();
        document
            .images
            .iter()
            .filter(|src| !src.is_empty() && !src.starts_with("data:"))
            .filter_map(|src| page_url.join(src).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .filter(|url| seen.insert(url.to_string()))
            .take(self.max_images)
            .collect()
    }

    async fn images(&self, document: &PageDocument, page_url: &Url, limit: Duration) -> (Vec<ImageMetadata>, Vec<ScanIssue>) {
        let urls = self.image_urls(document, page_url);
        let fetched: Vec<_> = stream::iter(urls)
            .map(|url| async move {
                let result = self.fetcher.fetch(&url, FetchOptions::page(limit)).await;
                (url, result)
            })
            .buffered(self.image_concurrency)
            .collect()
            .await;

        let mut images = Vec::new();
        let mut issues = Vec::new();
        for (url, result) in fetched {
            if result.is_success() {
                images.push(ImageMetadata {
                    url: url.to_string(),
                    metadata: read_metadata(&result.body),
                });
            } else if let Some(error) = result.error {
                issues.push(ScanIssue::new(Component::Artifacts, format!("image {}: {}", url, error)));
            } else if let Some(status) = result.status {
                issues.push(ScanIssue::new(Component::Artifacts, format!("image {}: HTTP {}", url, status)));
            }
        }
        (images, issues)
    }
}
