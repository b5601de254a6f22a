//! Bootstrap page generation: the HTML document that fetches the bundle,
//! injects it and launches the runtime behind a click-to-play prompt.
//!
//! This module is split into:
//! - `state`: the loader state machine modelled in Rust (states, events, effects)
//! - `loader`: the inline JavaScript implementing that machine
//! - `html`: markup and styling around the canvas

mod html;
mod loader;
pub mod state;

pub use state::{Effect, Failure, Loader, LoaderEvent, LoaderState, ProgressBar};

use crate::config::PresentationConfig;

/// File name the page is also written under.
pub const INDEX_FILE: &str = "index.html";

/// Generate the bootstrap document for `config`.
pub fn generate_bootstrap(config: &PresentationConfig) -> String {
    html::generate_page(config)
}

/// `(file name, contents)` pairs to write: the page under its own name and
/// as the directory index.
pub fn bootstrap_files(config: &PresentationConfig) -> [(String, String); 2] {
    let page = generate_bootstrap(config);
    [
        (config.page_file(), page.clone()),
        (INDEX_FILE.to_string(), page),
    ]
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Encode `s` as a JS string literal safe to place inside a `<script>` block.
pub(crate) fn js_string(s: &str) -> String {
    let json = serde_json::Value::String(s.to_string()).to_string();
    json.replace("</", "<\\/")
}
