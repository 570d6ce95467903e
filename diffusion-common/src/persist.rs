use crate::config::{DumpFormat, RenderPolicy};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes `bytes` to `path` so that readers only ever see a complete file: the data goes to a
/// hidden sibling first, is flushed to disk, then renamed over the destination.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staging = staging_path(path);
    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&staging)
            .with_context(|| format!("Failed to create '{}'", staging.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write '{}'", staging.display()))?;
        file.sync_all()?;
        fs::rename(&staging, path)
            .with_context(|| format!("Failed to move '{}' into place", path.display()))?;
        Ok(())
    })();
    if result.is_err() {
        // Never leave a half-written staging file behind.
        let _ = fs::remove_file(&staging);
    }
    result
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

/// `{dir}/{population}_cells/{population}_cells_{generation:04}.{ext}`
pub fn dump_path(dir: &Path, population: &str, generation: u32, format: DumpFormat) -> PathBuf {
    dir.join(format!("{}_cells", population))
        .join(format!("{}_cells_{:04}.{}", population, generation, format.extension()))
}

/// `{dir}/{population}_{policy}_time_{generation:04}.png`
pub fn frame_path(dir: &Path, population: &str, policy: RenderPolicy, generation: u32) -> PathBuf {
    dir.join(format!("{}_{}_time_{:04}.png", population, policy.label(), generation))
}
