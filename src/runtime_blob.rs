//! The sandboxed runtime script the bundle is built on. It is downloaded
//! once and then read from a local cache; an optional SHA-256 pin is checked
//! every time it is used.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::config::RuntimeConfig;
use crate::error::{BundleError, Result};

/// How the runtime blob may be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Use the cache, download when it is missing.
    CacheOrDownload,
    /// Use the cache only.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOrigin {
    Cache,
    Download,
}

#[derive(Debug, Clone)]
pub struct RuntimeBlob {
    pub bytes: Vec<u8>,
    pub origin: BlobOrigin,
}

/// Load the runtime blob described by `config`.
///
/// The pin is checked on cached bytes every time, and on downloaded bytes
/// before they are cached, so a bad download never reaches the cache.
pub fn load_runtime(config: &RuntimeConfig, policy: FetchPolicy) -> Result<RuntimeBlob> {
    if config.cache.is_file() {
        tracing::info!(cache = %config.cache.display(), "using cached runtime");
        let bytes = fs::read(&config.cache).map_err(|e| BundleError::io(&config.cache, e))?;
        check_pin(config, &bytes)?;
        return Ok(RuntimeBlob {
            bytes,
            origin: BlobOrigin::Cache,
        });
    }
    if policy == FetchPolicy::Offline {
        return Err(BundleError::MissingRuntime {
            path: config.cache.clone(),
        });
    }

    let bytes = download(&config.url)?;
    check_pin(config, &bytes)?;
    write_cache(&config.cache, &bytes)?;
    tracing::info!(
        cache = %config.cache.display(),
        bytes = bytes.len(),
        "cached runtime"
    );
    Ok(RuntimeBlob {
        bytes,
        origin: BlobOrigin::Download,
    })
}

fn check_pin(config: &RuntimeConfig, bytes: &[u8]) -> Result<()> {
    match &config.sha256 {
        Some(expected) => verify_digest(bytes, expected),
        None => Ok(()),
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn verify_digest(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(BundleError::ChecksumMismatch {
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        })
    }
}

fn download(url: &str) -> Result<Vec<u8>> {
    tracing::info!(url, "downloading runtime");
    let fetch_err = |reason: String| BundleError::Fetch {
        url: url.to_string(),
        reason,
    };

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(15))
        .user_agent("Mozilla/5.0")
        .build();

    let response = match agent.get(url).call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(code, _)) => return Err(fetch_err(format!("HTTP {code}"))),
        Err(e) => return Err(fetch_err(e.to_string())),
    };
    if response.status() != 200 {
        return Err(fetch_err(format!("HTTP {}", response.status())));
    }

    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| fetch_err(e.to_string()))?;
    Ok(bytes)
}

fn write_cache(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BundleError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| BundleError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Serve `body` to exactly one request; returns the URL to fetch.
    fn serve_once(body: &'static str) -> (String, thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let _ = request.respond(tiny_http::Response::from_string(body));
            }
        });
        (format!("http://{addr}/love.js"), handle)
    }

    fn cached(dir: &Path, contents: &[u8], sha256: Option<String>) -> RuntimeConfig {
        let cache = dir.join("love.js.cache");
        fs::write(&cache, contents).unwrap();
        RuntimeConfig {
            url: "http://127.0.0.1:9/unreachable.js".into(),
            cache,
            sha256,
        }
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn reads_cache_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = cached(dir.path(), b"var Module;", None);
        let blob = load_runtime(&config, FetchPolicy::Offline).unwrap();
        assert_eq!(blob.bytes, b"var Module;");
        assert_eq!(blob.origin, BlobOrigin::Cache);
    }

    #[test]
    fn offline_without_cache_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            cache: dir.path().join("missing.cache"),
            ..RuntimeConfig::default()
        };
        let err = load_runtime(&config, FetchPolicy::Offline).unwrap_err();
        assert!(matches!(err, BundleError::MissingRuntime { .. }));
        assert!(err.is_precondition());
    }

    #[test]
    fn pinned_digest_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let good = sha256_hex(b"runtime");
        let config = cached(dir.path(), b"runtime", Some(good.to_ascii_uppercase()));
        assert!(load_runtime(&config, FetchPolicy::Offline).is_ok());

        let config = cached(dir.path(), b"tampered", Some(good));
        let err = load_runtime(&config, FetchPolicy::Offline).unwrap_err();
        assert!(matches!(err, BundleError::ChecksumMismatch { .. }));
    }

    #[test]
    fn download_failing_the_pin_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (url, server) = serve_once("tampered");
        let config = RuntimeConfig {
            url,
            cache: dir.path().join("cache/love.js.cache"),
            sha256: Some(sha256_hex(b"genuine")),
        };

        let err = load_runtime(&config, FetchPolicy::CacheOrDownload).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, BundleError::ChecksumMismatch { .. }));
        assert!(!config.cache.exists());

        let err = load_runtime(&config, FetchPolicy::Offline).unwrap_err();
        assert!(matches!(err, BundleError::MissingRuntime { .. }));
    }

    #[test]
    fn verified_download_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (url, server) = serve_once("genuine");
        let config = RuntimeConfig {
            url,
            cache: dir.path().join("love.js.cache"),
            sha256: Some(sha256_hex(b"genuine")),
        };

        let blob = load_runtime(&config, FetchPolicy::CacheOrDownload).unwrap();
        server.join().unwrap();
        assert_eq!(blob.origin, BlobOrigin::Download);
        assert_eq!(fs::read(&config.cache).unwrap(), b"genuine");

        let again = load_runtime(&config, FetchPolicy::Offline).unwrap();
        assert_eq!(again.origin, BlobOrigin::Cache);
    }
}
