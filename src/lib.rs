pub mod bootstrap;
pub mod bundle;
pub mod config;
pub mod encoder;
pub mod error;
pub mod manifest;
pub mod patch;
pub mod runtime_blob;
pub mod serve;
pub mod watch;

use std::path::Path;

use config::PresentationConfig;
use encoder::EmbeddingScript;
use error::Result;

/// Collect the include patterns under `root` and encode them into the
/// virtual-filesystem script, with the standard patch rules applied.
pub fn embedding_script(root: &Path, include: &[String]) -> Result<EmbeddingScript> {
    let manifest = manifest::collect(root, include)?;
    encoder::encode_manifest(&manifest, &patch::PatchSet::standard())
}

/// Generate the bootstrap HTML document for `config`.
pub fn bootstrap_document(config: &PresentationConfig) -> String {
    bootstrap::generate_bootstrap(config)
}
