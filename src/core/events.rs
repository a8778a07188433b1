use super::models::{
    ArtifactSet, BannerResult, CertificateInfo, DescriptorMetadata, FetchResult, PathCheckResult, ScanIssue,
};
use std::collections::BTreeMap;

/// Component outcomes fed into [`super::state::ScanState`] once a target's
/// probes have all finished.
#[derive(Debug, Clone)]
pub enum Event {
    Fetched(FetchResult),
    CertificateCaptured(CertificateInfo),
    PathsProbed(Vec<PathCheckResult>),
    BannersCaptured(BTreeMap<u16, BannerResult>),
    ArtifactsExtracted(ArtifactSet),
    Fingerprinted(String),
    DescriptorFound(DescriptorMetadata),
    ComponentFailed(ScanIssue),
}
