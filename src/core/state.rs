use super::events::Event;
use super::models::{
    ArtifactSet, BannerResult, CertificateInfo, Component, DescriptorMetadata, FetchSummary, PathCheckResult,
    ScanIssue, ScanReport, Target,
};
use crate::config::catalog::METADATA_HEADERS;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Accumulates one target's results. Nothing here is shared between
/// targets.
#[derive(Debug)]
pub struct ScanState {
    pub target: Target,
    pub started: DateTime<Utc>,
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

impl ScanState {
    pub fn new(target: &Target) -> Self {
        Self {
            target: target.clone(),
            started: Utc::now(),
            fetch: FetchSummary {
                url: target.url.to_string(),
                ..Default::default()
            },
            metadata: BTreeMap::new(),
            certificate: None,
            paths: Vec::new(),
            banners: BTreeMap::new(),
            artifacts: ArtifactSet::default(),
            fingerprint: None,
            descriptor: None,
            errors: Vec::new(),
        }
    }

    pub fn on_event(&mut self, ev: Event) {
        match ev {
            Event::Fetched(result) => {
                tracing::info!("Fetched {}: {:?}", result.url, result.status);
                for name in METADATA_HEADERS {
                    if let Some(value) = result.header(name) {
                        self.metadata.insert(name.to_string(), value.to_string());
                    }
                }
                if let Some(error) = &result.error {
                    self.fail(Component::Fetch, format!("{}: {}", result.url, error));
                }
                if result.certificate.is_some() {
                    self.certificate = result.certificate.clone();
                }
                self.fetch = result.summary();
            }
            Event::CertificateCaptured(info) => {
                tracing::info!("Certificate captured: {}", info.subject);
                self.certificate = Some(info);
            }
            Event::PathsProbed(results) => {
                for result in &results {
                    if let Some(error) = &result.error {
                        self.fail(Component::PathProbe, format!("{}: {}", result.path, error));
                    }
                }
                self.paths = results;
            }
            Event::BannersCaptured(results) => {
                for result in results.values() {
                    if let Some(error) = &result.error {
                        self.fail(
                            Component::BannerScan,
                            format!("port {} ({}): {}", result.port, result.protocol.label(), error),
                        );
                    }
                }
                self.banners = results;
            }
            Event::ArtifactsExtracted(artifacts) => {
                tracing::info!("Artifacts extracted: {} findings", artifacts.finding_count());
                self.artifacts = artifacts;
            }
            Event::Fingerprinted(hash) => {
                self.fingerprint = Some(hash);
            }
            Event::DescriptorFound(descriptor) => {
                self.descriptor = Some(descriptor);
            }
            Event::ComponentFailed(issue) => {
                tracing::warn!("{:?} failed for {}: {}", issue.component, self.target.host, issue.message);
                self.errors.push(issue);
            }
        }
    }

    fn fail(&mut self, component: Component, message: String) {
        tracing::debug!("{:?} issue for {}: {}", component, self.target.host, message);
        self.errors.push(ScanIssue::new(component, message));
    }

    pub fn into_report(self) -> ScanReport {
        ScanReport {
            target: self.target.address,
            url: self.target.url.to_string(),
            timestamp: self.started,
            fetch: self.fetch,
            metadata: self.metadata,
            certificate: self.certificate,
            paths: self.paths,
            banners: self.banners,
            artifacts: self.artifacts,
            fingerprint: self.fingerprint,
            descriptor: self.descriptor,
            errors: self.errors,
        }
    }
}
