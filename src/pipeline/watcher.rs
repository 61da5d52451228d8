//! Directory watcher: turn "file arrived" events into work items.
//!
//! A file arrives when it is created in the directory or renamed into it.
//! The `notify` backend delivers events on its own thread. The handler only
//! filters and pushes onto the [`QueueSender`], which never blocks, so a slow
//! worker cannot stall event delivery. Dropping the returned
//! [`DirectoryWatcher`] stops the backend and joins its thread.
//!
//! A creation event fires when the file is opened, usually before its bytes
//! land. [`wait_until_written`] lets the worker hold off until the size has
//! settled.

use crate::error::{DocumentError, FiscalError};
use crate::pipeline::queue::QueueSender;
use crate::progress::ProgressCallback;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// `true` if the path names a PDF (`.pdf` suffix, case-sensitive). Works on
/// the raw bytes, so non-UTF-8 names are accepted.
pub fn is_pdf_path(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().ends_with(b".pdf")
}

/// PDF paths that arrived with this event: created files and rename targets.
/// Empty for any other event kind.
pub fn created_pdf_paths(event: &Event) -> Vec<PathBuf> {
    let arrived: Vec<&PathBuf> = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().collect()
        }
        // [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().into_iter().collect()
        }
        // Backends that cannot tell the two sides apart.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().filter(|p| p.is_file()).collect()
        }
        _ => Vec::new(),
    };

    arrived
        .into_iter()
        .filter(|p| is_pdf_path(p))
        .cloned()
        .collect()
}

/// Wait until `path` has a non-zero size that holds across one `interval`.
///
/// Gives up quietly after `max_wait`; the reader then reports whatever it
/// finds. Fails only if the file cannot be inspected at all.
pub async fn wait_until_written(
    path: &Path,
    interval: Duration,
    max_wait: Duration,
) -> Result<(), DocumentError> {
    let deadline = tokio::time::Instant::now() + max_wait;
    let mut last: Option<u64> = None;

    loop {
        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| DocumentError::Unreadable {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .len();

        if len > 0 && last == Some(len) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            debug!("{} still changing after {:?}, reading anyway", path.display(), max_wait);
            return Ok(());
        }
        last = Some(len);
        tokio::time::sleep(interval).await;
    }
}

/// PDFs already present in `dir`, sorted by file name.
pub fn existing_pdfs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_pdf_path(p))
        .collect();
    found.sort();
    Ok(found)
}

/// A running watch on one directory.
pub struct DirectoryWatcher {
    dir: PathBuf,
    _backend: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching `dir` non-recursively, pushing new PDFs onto `queue`.
    pub fn start(
        dir: &Path,
        queue: QueueSender,
        progress: Option<ProgressCallback>,
    ) -> Result<Self, FiscalError> {
        if !dir.is_dir() {
            return Err(FiscalError::WatchDirNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut backend = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in created_pdf_paths(&event) {
                        info!("New file detected: {}", path.display());
                        if let Some(ref cb) = progress {
                            cb.on_document_detected(&path);
                        }
                        if !queue.push(path.clone()) {
                            warn!("Queue closed, dropping {}", path.display());
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .map_err(|e| FiscalError::Watch {
            path: dir.to_path_buf(),
            detail: e.to_string(),
        })?;

        backend
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| FiscalError::Watch {
                path: dir.to_path_buf(),
                detail: e.to_string(),
            })?;

        info!("Watching {} for new PDFs", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            _backend: backend,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop watching. Equivalent to dropping the watcher.
    pub fn stop(self) {
        debug!("Stopping watcher on {}", self.dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::queue::work_queue;
    use notify::event::{CreateKind, RemoveKind};

    #[test]
    fn pdf_suffix_is_case_sensitive() {
        assert!(is_pdf_path(Path::new("unprocessed/a.pdf")));
        assert!(!is_pdf_path(Path::new("unprocessed/a.PDF")));
        assert!(!is_pdf_path(Path::new("unprocessed/a.pdf.part")));
        assert!(!is_pdf_path(Path::new("unprocessed/a.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_accepted() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        let name = OsStr::from_bytes(b"unprocessed/inv\xff.pdf");
        assert!(is_pdf_path(Path::new(name)));
    }

    #[test]
    fn only_create_events_yield_paths() {
        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("u/a.pdf"))
            .add_path(PathBuf::from("u/b.txt"));
        assert_eq!(created_pdf_paths(&create), vec![PathBuf::from("u/a.pdf")]);

        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("u/a.pdf"));
        assert!(created_pdf_paths(&modify).is_empty());

        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("u/a.pdf"));
        assert!(created_pdf_paths(&remove).is_empty());

        let moved_from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(PathBuf::from("u/a.pdf"));
        assert!(created_pdf_paths(&moved_from).is_empty());
    }

    #[test]
    fn rename_targets_yield_paths() {
        let moved_to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("u/a.pdf"));
        assert_eq!(created_pdf_paths(&moved_to), vec![PathBuf::from("u/a.pdf")]);

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("u/a.pdf.part"))
            .add_path(PathBuf::from("u/a.pdf"));
        assert_eq!(created_pdf_paths(&both), vec![PathBuf::from("u/a.pdf")]);

        let renamed_away = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("u/a.pdf"))
            .add_path(PathBuf::from("u/a.bak"));
        assert!(created_pdf_paths(&renamed_away).is_empty());
    }

    #[tokio::test]
    async fn wait_returns_once_size_settles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.pdf");
        std::fs::File::create(&path).unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            std::fs::write(&writer_path, b"%PDF-1.7 body").unwrap();
        });

        wait_until_written(&path, Duration::from_millis(25), Duration::from_secs(5))
            .await
            .unwrap();
        writer.await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn wait_gives_up_on_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::File::create(&path).unwrap();

        let waited = tokio::time::timeout(
            Duration::from_secs(2),
            wait_until_written(&path, Duration::from_millis(10), Duration::from_millis(100)),
        )
        .await;
        assert!(matches!(waited, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn wait_reports_missing_file() {
        let err = wait_until_written(
            Path::new("/definitely/not/here.pdf"),
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocumentError::Unreadable { .. }));
    }

    #[test]
    fn existing_pdfs_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let found = existing_pdfs(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("a.pdf"), dir.path().join("b.pdf")]);
    }

    #[test]
    fn start_fails_on_missing_dir() {
        let (tx, _rx) = work_queue();
        let result = DirectoryWatcher::start(Path::new("/definitely/not/here"), tx, None);
        assert!(matches!(result, Err(FiscalError::WatchDirNotFound { .. })));
    }

    #[tokio::test]
    async fn created_pdf_is_enqueued() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = work_queue();
        let watcher = DirectoryWatcher::start(dir.path(), tx, None).unwrap();

        std::fs::write(dir.path().join("ignored.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("invoice.pdf"), b"%PDF-1.4").unwrap();

        let item = tokio::time::timeout(Duration::from_secs(5), rx.next())
            .await
            .expect("watcher should report the new PDF")
            .expect("queue open");
        assert_eq!(item.path.file_name().unwrap(), "invoice.pdf");

        watcher.stop();
    }

    #[tokio::test]
    async fn pdf_moved_in_is_enqueued() {
        let root = tempfile::tempdir().unwrap();
        let watched = root.path().join("unprocessed");
        std::fs::create_dir(&watched).unwrap();
        let staging = root.path().join("staging.pdf");
        std::fs::write(&staging, b"%PDF-1.4").unwrap();

        let (tx, mut rx) = work_queue();
        let watcher = DirectoryWatcher::start(&watched, tx, None).unwrap();

        std::fs::rename(&staging, watched.join("moved.pdf")).unwrap();

        let item = tokio::time::timeout(Duration::from_secs(5), rx.next())
            .await
            .expect("watcher should report the moved-in PDF")
            .expect("queue open");
        assert_eq!(item.path.file_name().unwrap(), "moved.pdf");

        watcher.stop();
    }
}
