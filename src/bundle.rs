//! Build orchestration: collect, encode, fetch the runtime, then write
//! `<base>.js`, `<base>.html` and `index.html` into the output directory.
//!
//! Everything that can fail before output exists (missing sources, missing
//! runtime, unreadable or unpatchable files) is checked first; the output
//! directory is only touched once the whole bundle is in memory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::bootstrap::bootstrap_files;
use crate::config::BundleConfig;
use crate::encoder::{encode_manifest, EncodeStats};
use crate::error::{BundleError, Result};
use crate::patch::PatchSet;
use crate::runtime_blob::{load_runtime, BlobOrigin, FetchPolicy};

/// Summary of one packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub out_dir: PathBuf,
    pub bundle_path: PathBuf,
    pub page_paths: Vec<PathBuf>,
    pub stats: EncodeStats,
    pub script_bytes: usize,
    pub runtime_bytes: usize,
    pub bundle_bytes: usize,
    pub page_bytes: usize,
    pub runtime_from_cache: bool,
    pub elapsed_ms: u64,
}

/// Run a full packaging pass for `config`.
pub fn build(config: &BundleConfig, policy: FetchPolicy) -> Result<BuildReport> {
    let started = Instant::now();

    let manifest = config.collect_manifest()?;
    let runtime = load_runtime(&config.runtime, policy)?;
    let embedded = encode_manifest(&manifest, &PatchSet::standard())?;

    let mut bundle = Vec::with_capacity(runtime.bytes.len() + embedded.script.len() + 1);
    bundle.extend_from_slice(&runtime.bytes);
    bundle.push(b'\n');
    bundle.extend_from_slice(embedded.script.as_bytes());

    let pages = bootstrap_files(&config.page);

    fs::create_dir_all(&config.out_dir).map_err(|e| BundleError::io(&config.out_dir, e))?;
    let bundle_path = config.out_dir.join(config.page.bundle_file());
    write(&bundle_path, &bundle)?;

    let mut page_paths = Vec::new();
    let mut page_bytes = 0;
    for (name, html) in &pages {
        let path = config.out_dir.join(name);
        write(&path, html.as_bytes())?;
        page_bytes = html.len();
        page_paths.push(path);
    }

    let report = BuildReport {
        out_dir: config.out_dir.clone(),
        bundle_path,
        page_paths,
        stats: embedded.stats,
        script_bytes: embedded.script.len(),
        runtime_bytes: runtime.bytes.len(),
        bundle_bytes: bundle.len(),
        page_bytes,
        runtime_from_cache: runtime.origin == BlobOrigin::Cache,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    tracing::info!(
        out_dir = %report.out_dir.display(),
        bundle_bytes = report.bundle_bytes,
        elapsed_ms = report.elapsed_ms,
        "build complete"
    );
    Ok(report)
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| BundleError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote");
    Ok(())
}

/// Human-readable size: `KB` below one megabyte, `MB` above.
pub fn format_size(bytes: usize) -> String {
    if bytes > 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_pick_a_unit() {
        assert_eq!(format_size(512), "0.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }
}
