use crate::core::errors::TargetError;
use crate::core::models::Target;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Targets accepted for scanning plus the inputs that did not parse.
#[derive(Debug, Default)]
pub struct TargetList {
    pub targets: Vec<Target>,
    pub rejected: Vec<(String, TargetError)>,
}

impl TargetList {
    /// A `.txt` argument is read as a target file; anything else is a
    /// single address.
    pub fn load(input: &str) -> Result<Self> {
        if input.ends_with(".txt") {
            let path = Path::new(input);
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read target file: {:?}", path))?;
            tracing::info!("Read target file {:?}", path);
            Ok(Self::from_lines(&content))
        } else {
            Ok(Self::from_lines(input))
        }
    }

    /// Blank lines and `#` comments are skipped. Repeated addresses are
    /// scanned once.
    pub fn from_lines(content: &str) -> Self {
        let mut list = Self::default();
        let mut seen = HashSet::new();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !seen.insert(line.to_string()) {
                tracing::debug!("Skipping duplicate target {}", line);
                continue;
            }
            match Target::parse(line) {
                Ok(target) => list.targets.push(target),
                Err(e) => {
                    tracing::warn!("Skipping invalid target {}: {}", line, e);
                    list.rejected.push((line.to_string(), e));
                }
            }
        }
        list
    }
}
