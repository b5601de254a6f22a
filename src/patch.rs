//! Content patch rules: narrow, filename-keyed text rewrites applied to a
//! file's bytes before it is embedded.
//!
//! Rules are evaluated in order; each one whose predicate matches the file
//! name sees the output of the previous one. A rule must be idempotent.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{BundleError, Result};

/// Line written in place of a stripped `t.version = "..."` declaration.
pub const VERSION_PLACEHOLDER: &str = "    -- t.version removed for web build compatibility";

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Transform = Box<dyn Fn(&str) -> String + Send + Sync>;

/// A single `(predicate, transform)` pair.
pub struct PatchRule {
    name: String,
    predicate: Predicate,
    transform: Transform,
}

impl PatchRule {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            transform: Box::new(transform),
        }
    }

    /// Rule that fires only for an exact file name.
    pub fn for_file(
        file_name: &str,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        let target = file_name.to_string();
        Self::new(
            format!("{file_name} rewrite"),
            move |name| name == target,
            transform,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, file_name: &str) -> bool {
        (self.predicate)(file_name)
    }

    pub fn apply(&self, text: &str) -> String {
        (self.transform)(text)
    }
}

impl fmt::Debug for PatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRule").field("name", &self.name).finish()
    }
}

/// Ordered list of patch rules.
#[derive(Debug, Default)]
pub struct PatchSet {
    rules: Vec<PatchRule>,
}

impl PatchSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rules every web build applies: strip the engine version
    /// declaration from `conf.lua` (the web runtime reports an older engine
    /// version and would otherwise warn on startup).
    pub fn standard() -> Self {
        let mut set = Self::empty();
        set.push(PatchRule::for_file("conf.lua", strip_version_declaration));
        set
    }

    pub fn push(&mut self, rule: PatchRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when at least one rule targets `file_name`.
    pub fn matches(&self, file_name: &str) -> bool {
        self.rules.iter().any(|r| r.matches(file_name))
    }

    /// Apply every matching rule to `bytes`. Files no rule targets are
    /// returned untouched without being decoded.
    pub fn apply(&self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        if !self.matches(file_name) {
            return Ok(bytes);
        }

        let mut text = String::from_utf8(bytes)
            .map_err(|e| BundleError::patch(file_name, format!("not valid UTF-8: {e}")))?;
        for rule in self.rules.iter().filter(|r| r.matches(file_name)) {
            let patched = rule.apply(&text);
            if patched != text {
                tracing::info!(file = file_name, rule = rule.name(), "patched");
            }
            text = patched;
        }
        Ok(text.into_bytes())
    }
}

fn version_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?mR)^[ \t]*t\.version[ \t]*=[ \t]*"[^"\r\n]*"[ \t]*$"#)
            .expect("version declaration pattern is valid")
    })
}

/// Replace every `t.version = "..."` line with [`VERSION_PLACEHOLDER`].
/// Line terminators and all other lines are left as they were.
pub fn strip_version_declaration(src: &str) -> String {
    version_line()
        .replace_all(src, VERSION_PLACEHOLDER)
        .into_owned()
}
