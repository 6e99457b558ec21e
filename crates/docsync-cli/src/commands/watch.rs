//! Watch command: scheduled and change-driven cycles until Ctrl-C

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use docsync_core::{ChangeKind, ChannelFeed, LocalEvent, Scheduler};
use docsync_fs::NormalizedPath;
use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::Result;

const FEED_CAPACITY: usize = 64;

pub async fn run_watch(context: &Context, interval: Option<u64>) -> Result<()> {
    let (stop, shutdown) = watch::channel(false);
    let engine = Arc::new(context.engine()?.with_shutdown(shutdown.clone()));

    let vault = context.vault()?;
    let (tx, feed) = ChannelFeed::new(FEED_CAPACITY);
    let root = vault.root().clone();
    let extension = vault.extension().to_string();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| match event {
        Ok(event) => forward(&root, &extension, event, &tx),
        Err(e) => warn!(error = %e, "vault watcher error"),
    })?;
    watcher.watch(vault.root().to_native().as_path(), RecursiveMode::Recursive)?;

    let interval = interval.map_or_else(|| context.config.sync.interval(), |secs| Duration::from_secs(secs.max(1)));
    println!(
        "{} Watching {} (every {}s, Ctrl-C to stop)",
        "=>".blue().bold(),
        vault.root().to_string().cyan(),
        interval.as_secs()
    );

    let scheduler = Scheduler::new(engine).with_interval(interval).with_feed(feed);
    let running = tokio::spawn(scheduler.run(shutdown));

    tokio::signal::ctrl_c().await?;
    println!("{} Stopping after the current cycle...", "=>".blue().bold());
    let _ = stop.send(true);
    drop(watcher);

    let stats = running.await.map_err(docsync_core::Error::from)?;
    println!(
        "{} {} cycles, {} failed, {} skipped",
        "OK".green().bold(),
        stats.cycles,
        stats.failed,
        stats.skipped
    );
    Ok(())
}

/// Turn one watcher event into a batch for the scheduler.
fn forward(root: &NormalizedPath, extension: &str, event: Event, tx: &mpsc::Sender<Vec<LocalEvent>>) {
    let Some(kind) = change_kind(&event.kind) else {
        return;
    };
    let batch: Vec<LocalEvent> = event
        .paths
        .iter()
        .filter_map(|path| vault_relative(root, extension, path))
        .map(|path| LocalEvent::new(path, kind))
        .collect();
    if batch.is_empty() {
        return;
    }
    debug!(events = batch.len(), ?kind, "vault changed");
    // A full channel already guarantees a follow-up cycle.
    let _ = tx.try_send(batch);
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Updated),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}

/// The note path inside the vault, if the event is about a synced note.
fn vault_relative(root: &NormalizedPath, extension: &str, path: &Path) -> Option<NormalizedPath> {
    let relative = NormalizedPath::new(path).relative_to(root)?;
    let hidden = relative.as_str().split('/').any(|segment| segment.starts_with('.'));
    let matches = relative
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    (matches && !hidden).then_some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind};
    use std::path::PathBuf;

    #[test]
    fn only_visible_notes_are_forwarded() {
        let root = NormalizedPath::new("/vault");
        let note = vault_relative(&root, "md", Path::new("/vault/daily/Today.md"));
        assert_eq!(note.map(|p| p.to_string()), Some("daily/Today.md".to_string()));
        assert!(vault_relative(&root, "md", Path::new("/vault/.obsidian/app.md")).is_none());
        assert!(vault_relative(&root, "md", Path::new("/vault/.Today.md.1.2.tmp")).is_none());
        assert!(vault_relative(&root, "md", Path::new("/vault/image.png")).is_none());
        assert!(vault_relative(&root, "md", Path::new("/elsewhere/Today.md")).is_none());
    }

    #[test]
    fn metadata_changes_are_ignored() {
        assert_eq!(change_kind(&EventKind::Create(CreateKind::File)), Some(ChangeKind::Created));
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Updated)
        );
        assert_eq!(change_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))), None);
        assert_eq!(change_kind(&EventKind::Access(notify::event::AccessKind::Any)), None);
    }

    #[tokio::test]
    async fn events_become_batches() {
        let (tx, mut rx) = mpsc::channel(4);
        let root = NormalizedPath::new("/vault");
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/vault/A.md"))
            .add_path(PathBuf::from("/vault/.hidden.md"));
        forward(&root, "md", event, &tx);

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch, vec![LocalEvent::new("A.md", ChangeKind::Created)]);
    }
}
