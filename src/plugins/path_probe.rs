use crate::core::models::{FetchResult, PathCheckResult, Target};
use crate::core::errors::FetchError;
use crate::executors::http::{FetchOptions, Fetcher};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Requests every catalog path on the target and decides which ones are
/// really served.
pub struct PathProber {
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
    min_body_bytes: usize,
}

impl PathProber {
    pub fn new(fetcher: Arc<dyn Fetcher>, concurrency: usize, min_body_bytes: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            min_body_bytes,
        }
    }

    /// One result per catalog entry, in catalog order. `base` is the root
    /// page fetch, used to spot servers that answer every path with it.
    pub async fn probe(&self, base: &FetchResult, target: &Target, catalog: &[&str], limit: Duration) -> Vec<PathCheckResult> {
        let results: Vec<PathCheckResult> = stream::iter(catalog.iter().copied())
            .map(|path| self.check(base, target, path, limit))
            .buffered(self.concurrency)
            .collect()
            .await;

        let exposed = results.iter().filter(|r| r.exposed).count();
        tracing::info!("Path probe on {}: {}/{} exposed", target.host, exposed, results.len());
        results
    }

    async fn check(&self, base: &FetchResult, target: &Target, path: &str, limit: Duration) -> PathCheckResult {
        let Some(url) = target.join(path) else {
            return PathCheckResult {
                path: path.to_string(),
                exposed: false,
                status: None,
                content_length: 0,
                location: None,
                error: Some(FetchError::InvalidUrl(path.to_string())),
            };
        };

        let result = self.fetcher.fetch(&url, FetchOptions::probe(limit)).await;
        let exposed = self.is_exposed(base, &result);
        tracing::debug!("{} -> {:?} exposed={}", url, result.status, exposed);

        PathCheckResult {
            path: path.to_string(),
            exposed,
            status: result.status,
            content_length: result.body.len(),
            location: result.location().map(str::to_string),
            error: result.error,
        }
    }

    fn is_exposed(&self, base: &FetchResult, result: &FetchResult) -> bool {
        if result.body.len() <= self.min_body_bytes {
            return false;
        }

        let served = result.is_success()
            || (result.is_redirect()
                && result
                    .location()
                    .is_some_and(|location| !looks_like_error_page(location) && !points_at_root(location)));

        served && !is_catch_all(base, result)
    }
}

fn looks_like_error_page(location: &str) -> bool {
    let location = location.to_ascii_lowercase();
    ["404", "error", "not-found", "notfound", "not_found"]
        .iter()
        .any(|marker| location.contains(marker))
}

fn points_at_root(location: &str) -> bool {
    let path = match Url::parse(location) {
        Ok(url) => url.path().to_string(),
        Err(_) => location.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.is_empty() || path == "/"
}

// Some servers return the landing page for any path with a 200.
fn is_catch_all(base: &FetchResult, result: &FetchResult) -> bool {
    result.is_success() && base.is_success() && !base.body.is_empty() && result.body == base.body
}
