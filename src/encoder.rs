//! Virtualization encoder: turns a manifest into the script that rebuilds
//! the asset tree inside the runtime's virtual filesystem.
//!
//! The output has exactly two statement kinds, one per line:
//!
//! ```text
//! FS.mkdir('/l/src');
//! FS.createDataFile('/l/src','level1.lua',FS.DEC('...'),!0,!0,!0);
//! ```
//!
//! The root directory comes first, every directory precedes anything nested
//! under it, and files follow manifest order. Files are read one at a time.

use std::collections::HashSet;
use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::{BundleError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::patch::PatchSet;

/// The single virtual directory every asset lives under.
pub const VIRTUAL_ROOT: &str = "/l";

/// Access flags passed to `createDataFile`. Every embedded file is
/// readable, writable and owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileFlags {
    pub can_read: bool,
    pub can_write: bool,
    pub can_own: bool,
}

impl FileFlags {
    pub const ALL: FileFlags = FileFlags {
        can_read: true,
        can_write: true,
        can_own: true,
    };
}

/// One file ready to be written as a `createDataFile` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub parent_dir: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub flags: FileFlags,
}

impl EmbeddedFile {
    pub fn statement(&self) -> String {
        format!(
            "FS.createDataFile('{}','{}',FS.DEC('{}'),{},{},{});",
            js_quote(&self.parent_dir),
            js_quote(&self.file_name),
            STANDARD.encode(&self.bytes),
            js_bool(self.flags.can_read),
            js_bool(self.flags.can_write),
            js_bool(self.flags.can_own),
        )
    }
}

/// Counters collected while encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodeStats {
    pub files: usize,
    pub directories: usize,
    pub patched: usize,
    pub payload_bytes: u64,
}

/// Result of one encoding pass.
#[derive(Debug, Clone)]
pub struct EmbeddingScript {
    pub script: String,
    pub stats: EncodeStats,
}

/// Encode every manifest entry, reading file bytes from disk.
pub fn encode_manifest(manifest: &Manifest, patches: &PatchSet) -> Result<EmbeddingScript> {
    let mut encoder = VfsEncoder::new(patches);
    for entry in manifest {
        encoder.push_entry(entry)?;
    }
    let out = encoder.finish();
    tracing::info!(
        files = out.stats.files,
        directories = out.stats.directories,
        bytes = out.script.len(),
        "embedded assets"
    );
    Ok(out)
}

/// Owns the created-directory set and the output buffer for one pass.
struct VfsEncoder<'a> {
    patches: &'a PatchSet,
    created: HashSet<String>,
    out: String,
    stats: EncodeStats,
}

impl<'a> VfsEncoder<'a> {
    fn new(patches: &'a PatchSet) -> Self {
        let mut encoder = Self {
            patches,
            created: HashSet::new(),
            out: String::new(),
            stats: EncodeStats::default(),
        };
        encoder.mkdir(VIRTUAL_ROOT.to_string());
        encoder
    }

    fn mkdir(&mut self, path: String) {
        if self.created.contains(&path) {
            return;
        }
        tracing::debug!(dir = %path, "mkdir");
        self.out.push_str(&format!("FS.mkdir('{}');\n", js_quote(&path)));
        self.created.insert(path);
        self.stats.directories += 1;
    }

    /// Ensure every prefix of `segments` exists, returning the deepest one.
    fn ensure_dirs(&mut self, segments: &[&str]) -> String {
        let mut dir = VIRTUAL_ROOT.to_string();
        for segment in segments {
            dir.push('/');
            dir.push_str(segment);
            self.mkdir(dir.clone());
        }
        dir
    }

    fn push_entry(&mut self, entry: &ManifestEntry) -> Result<()> {
        let bytes = fs::read(&entry.source_path).map_err(|e| BundleError::io(&entry.source_path, e))?;
        self.push_bytes(entry, bytes)
    }

    fn push_bytes(&mut self, entry: &ManifestEntry, bytes: Vec<u8>) -> Result<()> {
        let parent_dir = self.ensure_dirs(&entry.dir_segments());
        let file_name = entry.file_name().to_string();

        let bytes = if self.patches.matches(&file_name) {
            let before = bytes.clone();
            let after = self.patches.apply(&file_name, bytes)?;
            if after != before {
                self.stats.patched += 1;
                tracing::debug!(file = %entry.virtual_path, before = before.len(), after = after.len(), "applied patch rules");
            }
            after
        } else {
            bytes
        };

        let record = EmbeddedFile {
            parent_dir,
            file_name,
            bytes,
            flags: FileFlags::ALL,
        };
        self.out.push_str(&record.statement());
        self.out.push('\n');
        self.stats.files += 1;
        self.stats.payload_bytes += record.bytes.len() as u64;
        Ok(())
    }

    fn finish(self) -> EmbeddingScript {
        EmbeddingScript {
            script: self.out,
            stats: self.stats,
        }
    }
}

/// Escape a value for a single-quoted JS string literal. Line terminators
/// and control characters are escaped so each statement stays on one line.
fn js_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn js_bool(b: bool) -> &'static str {
    if b {
        "!0"
    } else {
        "!1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(virtual_path: &str) -> ManifestEntry {
        ManifestEntry {
            source_path: PathBuf::from(format!("/unused/{virtual_path}")),
            virtual_path: virtual_path.to_string(),
        }
    }

    fn encode_in_memory(files: &[(&str, &[u8])], patches: &PatchSet) -> EmbeddingScript {
        let mut encoder = VfsEncoder::new(patches);
        for (path, bytes) in files {
            encoder.push_bytes(&entry(path), bytes.to_vec()).expect("encode failed");
        }
        encoder.finish()
    }

    #[test]
    fn empty_manifest_still_creates_root() {
        let out = encode_in_memory(&[], &PatchSet::empty());
        assert_eq!(out.script, "FS.mkdir('/l');\n");
        assert_eq!(out.stats.directories, 1);
        assert_eq!(out.stats.files, 0);
    }

    #[test]
    fn root_file_goes_straight_under_root() {
        let out = encode_in_memory(&[("main.lua", b"print(1)")], &PatchSet::empty());
        let lines: Vec<&str> = out.script.lines().collect();
        assert_eq!(
            lines,
            vec![
                "FS.mkdir('/l');",
                "FS.createDataFile('/l','main.lua',FS.DEC('cHJpbnQoMSk='),!0,!0,!0);",
            ]
        );
    }

    #[test]
    fn interleaved_subtrees_create_each_dir_once_parent_first() {
        let out = encode_in_memory(
            &[
                ("a/b/one.lua", b"1"),
                ("c/two.lua", b"2"),
                ("a/three.lua", b"3"),
                ("a/b/d/four.lua", b"4"),
            ],
            &PatchSet::empty(),
        );
        let mkdirs: Vec<&str> = out
            .script
            .lines()
            .filter(|l| l.starts_with("FS.mkdir"))
            .collect();
        assert_eq!(
            mkdirs,
            vec![
                "FS.mkdir('/l');",
                "FS.mkdir('/l/a');",
                "FS.mkdir('/l/a/b');",
                "FS.mkdir('/l/c');",
                "FS.mkdir('/l/a/b/d');",
            ]
        );
        assert_eq!(out.stats.directories, 5);
        assert_eq!(out.stats.files, 4);
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let out = encode_in_memory(&[("it's.txt", b"")], &PatchSet::empty());
        assert!(out.script.contains("FS.createDataFile('/l','it\\'s.txt',FS.DEC(''),!0,!0,!0);"));
    }

    #[test]
    fn line_terminators_in_names_stay_on_one_line() {
        for name in ["a\nb.lua", "a\rb.lua", "a\u{2028}b.lua", "a\u{2029}b.lua", "a\u{1}b.lua"] {
            let out = encode_in_memory(&[(name, b"1")], &PatchSet::empty());
            assert_eq!(out.script.lines().count(), 2, "{name:?} split the statement");
            assert!(!out.script.contains(['\r', '\u{2028}', '\u{2029}', '\u{1}']));
        }
        let out = encode_in_memory(&[("dir\n/x.lua", b"")], &PatchSet::empty());
        assert!(out.script.contains("FS.mkdir('/l/dir\\n');"));
        assert!(out.script.contains("FS.createDataFile('/l/dir\\n','x.lua',"));
    }

    #[test]
    fn payload_round_trips() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let out = encode_in_memory(&[("bin/all.dat", &bytes)], &PatchSet::empty());
        let line = out.script.lines().last().unwrap();
        let start = line.find("FS.DEC('").unwrap() + "FS.DEC('".len();
        let end = line[start..].find('\'').unwrap() + start;
        assert_eq!(STANDARD.decode(&line[start..end]).unwrap(), bytes);
        assert_eq!(out.stats.payload_bytes, 256);
    }

    #[test]
    fn patches_apply_before_encoding() {
        let conf = b"t.version = \"11.4\"\nt.title = \"x\"\n";
        let out = encode_in_memory(&[("conf.lua", conf)], &PatchSet::standard());
        let expected = format!("{}\nt.title = \"x\"\n", crate::patch::VERSION_PLACEHOLDER);
        assert!(out.script.contains(&STANDARD.encode(expected.as_bytes())));
        assert_eq!(out.stats.patched, 1);
    }

    #[test]
    fn matching_file_without_changes_is_not_counted_as_patched() {
        let conf = b"t.title = \"x\"\n";
        let out = encode_in_memory(&[("conf.lua", conf)], &PatchSet::standard());
        assert!(out.script.contains(&STANDARD.encode(conf)));
        assert_eq!(out.stats.patched, 0);
    }

    #[test]
    fn flags_render_as_minified_booleans() {
        let file = EmbeddedFile {
            parent_dir: "/l".into(),
            file_name: "x".into(),
            bytes: Vec::new(),
            flags: FileFlags {
                can_read: true,
                can_write: false,
                can_own: true,
            },
        };
        assert!(file.statement().ends_with(",!0,!1,!0);"));
    }
}
