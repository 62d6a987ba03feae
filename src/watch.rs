//! Watch loop: rebuild on source changes, one build per burst of events.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::discover::{self, Scope};
use crate::engine::Engine;
use crate::error::Result;
use crate::pipeline;
use crate::volume::SOURCE_EXTENSION;

/// Quiet period after the last event before a rebuild fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Collapses bursts of events into single triggers.
#[derive(Clone, Copy, Debug)]
pub struct Debouncer {
    window: Duration,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Call `fire` once per quiet-terminated burst until every sender is gone.
    pub fn run<T>(&self, events: Receiver<T>, mut fire: impl FnMut()) {
        while events.recv().is_ok() {
            loop {
                match events.recv_timeout(self.window) {
                    Ok(_) => continue,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        fire();
                        return;
                    }
                }
            }
            fire();
        }
    }
}

/// Whether a filesystem event can affect the build.
pub fn is_relevant(event: &Event) -> bool {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(_)) => true,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
            .paths
            .iter()
            .any(|p| p.extension().is_some_and(|e| e == SOURCE_EXTENSION)),
        _ => false,
    }
}

/// Build once, then rebuild after every burst of changes. Does not return
/// while the watchers are alive.
pub fn watch(engine: &dyn Engine, scope: &Scope, debouncer: Debouncer) -> Result<()> {
    tracing::info!("Booting watch mode...");
    let (tx, rx) = mpsc::channel();
    let _watchers = start_watchers(scope, tx)?;
    serve(engine, scope, debouncer, rx);
    Ok(())
}

/// Install a recursive watcher on every watch path of `scope`.
///
/// Each relevant event sends a unit on `events`. The channel closes once
/// the returned watchers are dropped.
pub fn start_watchers(scope: &Scope, events: Sender<()>) -> Result<Vec<RecommendedWatcher>> {
    let paths = discover::watch_paths(scope)?;
    tracing::info!("Watching {} path(s):", paths.len());
    paths
        .iter()
        .map(|path| {
            tracing::info!("  {}", path.display());
            watch_path(path, events.clone())
        })
        .collect()
}

/// Initial build, then one rebuild per burst on `events` until the channel
/// closes. Builds run one at a time on the calling thread. Returns how many
/// builds ran.
pub fn serve(engine: &dyn Engine, scope: &Scope, debouncer: Debouncer, events: Receiver<()>) -> usize {
    let mut builds = 0;
    let mut rebuild = |reason: &str| {
        tracing::info!("{}", reason);
        builds += 1;
        if let Err(e) = pipeline::compile_scope(engine, scope) {
            e.report();
        }
    };

    rebuild("Initial compilation...");
    debouncer.run(events, || rebuild("Change detected, recompiling..."));
    builds
}

fn watch_path(path: &Path, tx: Sender<()>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_relevant(&event) => {
            tracing::debug!("{:?} {:?}", event.kind, event.paths);
            let _ = tx.send(());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("watch error: {}", e),
    })?;
    watcher.watch(path, RecursiveMode::Recursive)?;
    Ok(watcher)
}
