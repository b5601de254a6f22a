//! Rebuild-on-change loop for `build --watch`.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use notify::{Event, RecursiveMode, Watcher};

use crate::config::BundleConfig;

/// Events arriving within this window of each other trigger one rebuild.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Watch every included path and call `rebuild` after each burst of changes.
/// Blocks until the watcher channel closes.
pub fn watch_and_rebuild(
    config: &BundleConfig,
    mut rebuild: impl FnMut(),
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx)?;

    for pattern in &config.include {
        let path = config.root.join(pattern);
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&path, mode)?;
        tracing::debug!(path = %path.display(), "watching");
    }
    eprintln!("  watching for changes...");

    while let Ok(first) = rx.recv() {
        let mut relevant = is_relevant(&first, &config.out_dir);
        while let Ok(next) = rx.recv_timeout(DEBOUNCE) {
            relevant |= is_relevant(&next, &config.out_dir);
        }
        if relevant {
            rebuild();
        }
    }

    drop(watcher);
    Ok(())
}

fn is_relevant(event: &notify::Result<Event>, out_dir: &Path) -> bool {
    match event {
        Ok(event) => {
            !event.kind.is_access() && event.paths.iter().any(|p| !p.starts_with(out_dir))
        }
        Err(e) => {
            tracing::warn!(error = %e, "watch error");
            false
        }
    }
}
