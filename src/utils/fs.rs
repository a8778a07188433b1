use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes through a sibling temp file and renames it into place, so a
/// reader never sees a half-written file.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid path: no file name in {:?}", path))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);

    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", tmp_path))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to temp file: {:?}", tmp_path))?;

    file.sync_all()
        .with_context(|| format!("Failed to sync temp file: {:?}", tmp_path))?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;

    Ok(())
}
