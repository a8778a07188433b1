use super::events::Event;
use super::models::{Component, Scheme, ScanIssue, ScanReport, Target};
use super::state::ScanState;
use crate::config::catalog::{BANNER_CATALOG, PATH_CATALOG, TLS_PORT};
use crate::config::{ProxyConfig, ScanSettings};
use crate::executors::http::{ContentFetcher, FetchOptions, Fetcher};
use crate::executors::socks::{Connector, ProxyConnector};
use crate::executors::tls::CertificateInspector;
use crate::parser::{ArtifactExtractor, fingerprint};
use crate::plugins::{BannerScanner, DescriptorLookup, NoDescriptorLookup, PathProber};
use anyhow::Result;
use std::sync::Arc;
use url::Url;

/// Runs every probe against one target and folds the outcomes into a
/// single report. A report is always produced, however much fails.
pub struct ScanOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    paths: PathProber,
    banners: BannerScanner,
    artifacts: ArtifactExtractor,
    certificates: CertificateInspector,
    descriptor: Arc<dyn DescriptorLookup>,
    settings: ScanSettings,
}

impl ScanOrchestrator {
    pub fn new(proxy: &ProxyConfig, settings: ScanSettings) -> Result<Self> {
        let fetcher = Arc::new(ContentFetcher::new(proxy, &settings.http)?);
        let connector = Arc::new(ProxyConnector::new(proxy.clone()));
        Self::with_components(fetcher, connector, Arc::new(NoDescriptorLookup), settings)
    }

    pub fn with_components(
        fetcher: Arc<dyn Fetcher>,
        connector: Arc<dyn Connector>,
        descriptor: Arc<dyn DescriptorLookup>,
        settings: ScanSettings,
    ) -> Result<Self> {
        let c = &settings.concurrency;
        Ok(Self {
            paths: PathProber::new(Arc::clone(&fetcher), c.max_path_probes, settings.http.min_exposed_body_bytes),
            banners: BannerScanner::new(Arc::clone(&connector), c.max_banner_probes, settings.banner.max_bytes),
            artifacts: ArtifactExtractor::new(Arc::clone(&fetcher), c.max_image_fetches, settings.http.max_images)?,
            certificates: CertificateInspector::new(connector)?,
            fetcher,
            descriptor,
            settings,
        })
    }

    pub async fn scan_target(&self, target: &Target) -> ScanReport {
        let limit = self.settings.timeout();
        tracing::info!("Scanning {} (timeout {:?})", target.url, limit);

        let mut state = ScanState::new(target);
        let base = self.fetcher.fetch(&target.url, FetchOptions::page(limit)).await;
        let page_ok = base.has_response();
        let page_url = Url::parse(&base.url).unwrap_or_else(|_| target.url.clone());
        let html = base.body_text();
        let tls_port = match target.scheme {
            Scheme::Https => target.url.port_or_known_default().unwrap_or(TLS_PORT),
            Scheme::Http => TLS_PORT,
        };

        let paths = async {
            if page_ok {
                Some(self.paths.probe(&base, target, PATH_CATALOG, limit).await)
            } else {
                None
            }
        };
        let artifacts = async {
            if page_ok {
                Some(self.artifacts.extract(&html, &page_url, target, limit).await)
            } else {
                None
            }
        };
        let certificate = async {
            if base.certificate.is_some() {
                None
            } else {
                Some(self.certificates.inspect(&target.host, tls_port, limit).await)
            }
        };
        let banners = self.banners.scan(&target.host, BANNER_CATALOG, limit);
        let descriptor = self.descriptor.lookup(&target.host);

        let (paths, artifacts, certificate, banners, descriptor) =
            tokio::join!(paths, artifacts, certificate, banners, descriptor);

        // Merge order is fixed so the issue list is stable between runs.
        let digest = page_ok.then(|| fingerprint(&base.body));
        state.on_event(Event::Fetched(base));

        match certificate {
            Some(Ok(info)) => state.on_event(Event::CertificateCaptured(info)),
            Some(Err(e)) => state.on_event(Event::ComponentFailed(ScanIssue::new(
                Component::Certificate,
                format!("port {}: {}", tls_port, e),
            ))),
            None => {}
        }

        if let Some(paths) = paths {
            state.on_event(Event::PathsProbed(paths));
        }

        state.on_event(Event::BannersCaptured(banners));

        if let Some((found, issues)) = artifacts {
            state.on_event(Event::ArtifactsExtracted(found));
            for issue in issues {
                state.on_event(Event::ComponentFailed(issue));
            }
        }

        if let Some(digest) = digest {
            state.on_event(Event::Fingerprinted(digest));
        }

        match descriptor {
            Ok(Some(metadata)) => state.on_event(Event::DescriptorFound(metadata)),
            Ok(None) => tracing::debug!("No descriptor for {} via {}", target.host, self.descriptor.name()),
            Err(e) => state.on_event(Event::ComponentFailed(ScanIssue::new(Component::Descriptor, e.to_string()))),
        }

        let report = state.into_report();
        tracing::info!(
            "Finished {}: {} exposed paths, {} banners, {} artifacts, {} issues",
            target.host,
            report.exposed_paths().count(),
            report.captured_banners().count(),
            report.artifacts.finding_count(),
            report.errors.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{BannerError, ConnectError, DescriptorLookupError};
    use crate::core::models::DescriptorMetadata;
    use crate::testing::{DeadFetcher, PortBehavior, StubConnector, StubFetcher, unused_local_port};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const ONION: &str = "duckduckgogg42xjoc72x3sjasowoarfbgcmvfimaftt6twagswzczad.onion";

    struct FixedDescriptor(Result<Option<DescriptorMetadata>, DescriptorLookupError>);

    #[async_trait]
    impl DescriptorLookup for FixedDescriptor {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn lookup(&self, _address: &str) -> Result<Option<DescriptorMetadata>, DescriptorLookupError> {
            self.0.clone()
        }
    }

    fn settings() -> ScanSettings {
        ScanSettings { timeout_secs: 1, ..Default::default() }
    }

    fn site() -> StubFetcher {
        let root = format!("http://{}/", ONION);
        StubFetcher::new()
            .result(
                &root,
                crate::core::models::FetchResult::response(
                    &root,
                    200,
                    br#"<html><body><a href="http://abcdefghijklmnop.onion/">friend</a>
                    <a href="mailto:ops@example.com">mail</a></body></html>"#
                        .to_vec(),
                )
                .with_header("Server", "nginx"),
            )
            .page(
                &format!("http://{}/admin", ONION),
                200,
                b"<html><h1>Administration console</h1></html>",
            )
    }

    fn connector() -> StubConnector {
        StubConnector::new().port(22, PortBehavior::Banner(b"SSH-2.0-OpenSSH_9.6\r\n".to_vec()))
    }

    #[tokio::test]
    async fn test_full_scan_merges_components() {
        let orchestrator = ScanOrchestrator::with_components(
            Arc::new(site()),
            Arc::new(connector()),
            Arc::new(FixedDescriptor(Ok(Some(DescriptorMetadata {
                nickname: Some("relay".to_string()),
                ..Default::default()
            })))),
            settings(),
        )
        .unwrap();
        let target = Target::parse(ONION).unwrap();

        let report = orchestrator.scan_target(&target).await;

        assert_eq!(report.target, ONION);
        assert_eq!(report.fetch.status, Some(200));
        assert_eq!(report.metadata.get("Server").map(String::as_str), Some("nginx"));
        let exposed: Vec<&str> = report.exposed_paths().map(|p| p.path.as_str()).collect();
        assert_eq!(exposed, vec!["/admin"]);
        assert_eq!(report.paths.len(), PATH_CATALOG.len());
        assert_eq!(report.banners.len(), BANNER_CATALOG.len());
        assert_eq!(report.banners[&22].banner.as_deref(), Some("SSH-2.0-OpenSSH_9.6"));
        assert!(report.artifacts.onion_links.contains("abcdefghijklmnop.onion"));
        assert!(report.artifacts.emails.contains("ops@example.com"));
        assert!(report.fingerprint.is_some());
        assert_eq!(report.descriptor.and_then(|d| d.nickname), Some("relay".to_string()));
        assert_eq!(report.certificate, None);
        assert_eq!(report.errors[0].component, Component::Certificate);
        assert!(report.errors.iter().all(|e| e.component != Component::Fetch));
    }

    #[tokio::test]
    async fn test_total_failure_still_reports() {
        let proxy = ProxyConfig { host: "127.0.0.1".to_string(), port: unused_local_port() };
        let orchestrator = ScanOrchestrator::with_components(
            Arc::new(DeadFetcher),
            Arc::new(ProxyConnector::new(proxy)),
            Arc::new(FixedDescriptor(Err(DescriptorLookupError("directory unreachable".to_string())))),
            settings(),
        )
        .unwrap();
        let target = Target::parse(ONION).unwrap();

        let report = orchestrator.scan_target(&target).await;

        assert_eq!(report.fetch.status, None);
        assert!(report.fetch.error.is_some());
        assert!(report.paths.is_empty());
        assert!(report.artifacts.is_empty());
        assert_eq!(report.fingerprint, None);
        assert_eq!(report.descriptor, None);
        assert_eq!(report.banners.len(), BANNER_CATALOG.len());
        assert!(report.banners.values().all(|b| matches!(
            b.error,
            Some(BannerError::Connect(ConnectError::ProxyUnavailable(_)))
        )));

        let components: Vec<Component> = report.errors.iter().map(|e| e.component).collect();
        assert_eq!(components.first(), Some(&Component::Fetch));
        assert_eq!(components.last(), Some(&Component::Descriptor));
        assert!(components.contains(&Component::Certificate));
        assert_eq!(
            components.iter().filter(|c| **c == Component::BannerScan).count(),
            BANNER_CATALOG.len()
        );
    }

    #[tokio::test]
    async fn test_repeat_scans_differ_only_in_timestamp() {
        let orchestrator = ScanOrchestrator::with_components(
            Arc::new(site()),
            Arc::new(connector()),
            Arc::new(NoDescriptorLookup),
            settings(),
        )
        .unwrap();
        let target = Target::parse(ONION).unwrap();

        let first = orchestrator.scan_target(&target).await;
        let mut second = orchestrator.scan_target(&target).await;
        second.timestamp = first.timestamp;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_https_certificate_from_fetch_skips_inspection() {
        let root = format!("https://{}/", ONION);
        let fetcher = StubFetcher::new().result(
            &root,
            crate::core::models::FetchResult {
                certificate: Some(crate::core::models::CertificateInfo {
                    subject: "CN=service".to_string(),
                    ..Default::default()
                }),
                ..crate::core::models::FetchResult::response(&root, 200, b"<html>tls</html>".to_vec())
            },
        );
        let orchestrator = ScanOrchestrator::with_components(
            Arc::new(fetcher),
            Arc::new(StubConnector::new()),
            Arc::new(NoDescriptorLookup),
            settings(),
        )
        .unwrap();

        let report = orchestrator.scan_target(&Target::parse(&root).unwrap()).await;

        assert_eq!(report.certificate.map(|c| c.subject), Some("CN=service".to_string()));
        assert!(report.errors.iter().all(|e| e.component != Component::Certificate));
    }
}
