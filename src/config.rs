//! Build configuration, read from `bundle.toml`.
//!
//! Every key is optional; the defaults describe a 640x480 LÖVE web build of
//! `main.lua`, `conf.lua` and `src/`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};
use crate::manifest::{self, Manifest};

pub const DEFAULT_RUNTIME_URL: &str = "https://schellingb.github.io/LoveWebBuilder/love.js";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// Asset root, relative to the config file.
    pub root: PathBuf,
    /// Top-level files or directories to embed, relative to `root`.
    pub include: Vec<String>,
    /// Output directory, relative to the config file.
    pub out_dir: PathBuf,
    pub runtime: RuntimeConfig,
    pub page: PresentationConfig,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            include: vec!["main.lua".into(), "conf.lua".into(), "src".into()],
            out_dir: PathBuf::from("build/web"),
            runtime: RuntimeConfig::default(),
            page: PresentationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub url: String,
    /// Where the downloaded runtime is kept between builds.
    pub cache: PathBuf,
    /// Optional hex SHA-256 the runtime blob must match.
    pub sha256: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RUNTIME_URL.to_string(),
            cache: PathBuf::from("build/love.js.cache"),
            sha256: None,
        }
    }
}

/// Everything the bootstrap page needs to know.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresentationConfig {
    pub title: String,
    /// Drives `<base_name>.js` and `<base_name>.html`.
    pub base_name: String,
    pub width: u32,
    pub height: u32,
    pub memory_mb: u32,
    pub stack_mb: u32,
    pub controls: Vec<ControlHint>,
    pub footer: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            title: "Game".to_string(),
            base_name: "game".to_string(),
            width: 640,
            height: 480,
            memory_mb: 256,
            stack_mb: 8,
            controls: Vec::new(),
            footer: true,
        }
    }
}

impl PresentationConfig {
    pub fn memory_bytes(&self) -> u64 {
        u64::from(self.memory_mb) * 1024 * 1024
    }

    pub fn stack_bytes(&self) -> u64 {
        u64::from(self.stack_mb) * 1024 * 1024
    }

    pub fn bundle_file(&self) -> String {
        format!("{}.js", self.base_name)
    }

    pub fn page_file(&self) -> String {
        format!("{}.html", self.base_name)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.base_name.is_empty() {
            return Err("page.base_name must not be empty".into());
        }
        if self
            .base_name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\'' | '"' | '<' | '>') || c.is_control())
        {
            return Err(format!("page.base_name '{}' is not a plain file name", self.base_name));
        }
        for (key, value) in [
            ("width", self.width),
            ("height", self.height),
            ("memory_mb", self.memory_mb),
            ("stack_mb", self.stack_mb),
        ] {
            if value == 0 {
                return Err(format!("page.{key} must be greater than zero"));
            }
        }
        Ok(())
    }
}

/// A key hint shown under the canvas, e.g. `Space` → `Jump`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ControlHint {
    pub keys: Vec<String>,
    pub action: String,
}

impl BundleConfig {
    /// Read and validate a config file. Relative paths inside it are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| BundleError::io(path, e))?;
        let mut config = Self::parse(&text).map_err(|reason| BundleError::config(path, reason))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.rebase(base);
        Ok(config)
    }

    /// Parse and validate TOML text without touching the filesystem.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.include.is_empty() {
            return Err("include must list at least one file or directory".into());
        }
        self.page.validate()
    }

    /// Paths the build writes itself; never embedded even when an include
    /// pattern covers them.
    pub fn generated_paths(&self) -> Vec<PathBuf> {
        vec![self.out_dir.clone(), self.runtime.cache.clone()]
    }

    /// Collect the manifest this config describes.
    pub fn collect_manifest(&self) -> Result<Manifest> {
        manifest::collect_excluding(&self.root, &self.include, &self.generated_paths())
    }

    /// Make `root`, `out_dir` and `runtime.cache` absolute relative to `base`.
    pub fn rebase(&mut self, base: &Path) {
        for path in [&mut self.root, &mut self.out_dir, &mut self.runtime.cache] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
