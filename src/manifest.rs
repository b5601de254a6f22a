//! Tree collector: turns a root directory plus a list of top-level include
//! patterns into a flat, order-stable manifest of files to embed.
//!
//! Directory entries are visited in filesystem-listing order, depth-first.
//! Symbolic links and other non-regular files are skipped.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{BundleError, Result};

/// One file to embed: where it lives on disk and where it lands in the
/// virtual filesystem (relative to the virtual root, `/`-separated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub source_path: PathBuf,
    pub virtual_path: String,
}

impl ManifestEntry {
    /// Directory segments of the virtual path, without the file name.
    pub fn dir_segments(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = self.virtual_path.split('/').collect();
        parts.pop();
        parts
    }

    pub fn file_name(&self) -> &str {
        self.virtual_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.virtual_path)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    /// Build a manifest from pre-computed entries, enforcing unique virtual paths.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.virtual_path.as_str()) {
                return Err(BundleError::DuplicateVirtualPath {
                    path: entry.virtual_path.clone(),
                });
            }
        }
        Ok(Self { entries })
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Check that every include pattern exists under `root` and stays inside it.
///
/// Runs before any file is read or written so a missing path aborts the
/// whole packaging run.
pub fn preflight(root: &Path, patterns: &[String]) -> Result<()> {
    for pattern in patterns {
        let full = resolve_pattern(root, pattern)?;
        if fs::symlink_metadata(&full).is_err() {
            return Err(BundleError::missing_source(&full));
        }
    }
    Ok(())
}

/// Collect every regular file reachable from the include patterns.
pub fn collect(root: &Path, patterns: &[String]) -> Result<Manifest> {
    collect_excluding(root, patterns, &[])
}

/// Like [`collect`], but files and directories under any of `excluded` are
/// left out. Used to keep the build output and the runtime cache out of a
/// bundle whose include patterns cover them.
pub fn collect_excluding(
    root: &Path,
    patterns: &[String],
    excluded: &[PathBuf],
) -> Result<Manifest> {
    preflight(root, patterns)?;

    let mut entries = Vec::new();
    for pattern in patterns {
        let full = resolve_pattern(root, pattern)?;
        if is_excluded(&full, excluded) {
            tracing::debug!(path = %full.display(), "skipping excluded path");
            continue;
        }
        let meta = fs::metadata(&full).map_err(|e| BundleError::io(&full, e))?;
        if meta.is_dir() {
            walk_dir(&full, root, excluded, &mut entries)?;
        } else {
            entries.push(ManifestEntry {
                virtual_path: virtual_path(root, &full)?,
                source_path: full,
            });
        }
    }

    tracing::debug!(files = entries.len(), "collected manifest");
    Manifest::from_entries(entries)
}

fn resolve_pattern(root: &Path, pattern: &str) -> Result<PathBuf> {
    let normalized = pattern.replace('\\', "/");
    let rel = Path::new(&normalized);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || pattern.is_empty() {
        return Err(BundleError::EscapesRoot {
            path: rel.to_path_buf(),
        });
    }
    Ok(root.join(rel))
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|ex| path.starts_with(ex))
}

fn walk_dir(
    dir: &Path,
    root: &Path,
    excluded: &[PathBuf],
    out: &mut Vec<ManifestEntry>,
) -> Result<()> {
    let listing = fs::read_dir(dir).map_err(|e| BundleError::io(dir, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| BundleError::io(dir, e))?;
        let path = entry.path();
        if is_excluded(&path, excluded) {
            tracing::debug!(path = %path.display(), "skipping excluded path");
            continue;
        }
        let file_type = entry.file_type().map_err(|e| BundleError::io(&path, e))?;
        if file_type.is_dir() {
            walk_dir(&path, root, excluded, out)?;
        } else if file_type.is_file() {
            out.push(ManifestEntry {
                virtual_path: virtual_path(root, &path)?,
                source_path: path,
            });
        } else {
            tracing::debug!(path = %path.display(), "skipping non-regular file");
        }
    }
    Ok(())
}

/// Strip `root` from `path` and join the remaining components with `/`.
fn virtual_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| BundleError::EscapesRoot {
        path: path.to_path_buf(),
    })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| BundleError::NonUtf8Name {
                    path: path.to_path_buf(),
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(BundleError::EscapesRoot {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    Ok(parts.join("/"))
}
