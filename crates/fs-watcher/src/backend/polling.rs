//! Snapshot-polling backend.
//!
//! Walks the watched tree on a fixed interval and diffs each snapshot
//! against the previous one. Renames are indistinguishable from a delete
//! plus a create here; callers that need rename fidelity must rely on the
//! native backend.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::{dispatch, validate_root, WatcherBackend};
use crate::{EventCallback, FileEvent, Result, WatcherError};

/// One observed file, keyed in the snapshot by its root-relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
	modified: SystemTime,
	len: u64,
}

/// `BTreeMap` so diff passes run in path order and deliver events
/// deterministically.
type Snapshot = BTreeMap<PathBuf, FileStamp>;

pub struct PollingBackend {
	interval: Duration,
	/// Lowercase extensions without the leading dot; empty means no
	/// filtering. Applied to files only, never to the walk itself.
	extensions: Vec<String>,
	should_stop: Arc<AtomicBool>,
	worker: Option<JoinHandle<()>>,
}

impl PollingBackend {
	pub fn new(interval: Duration, extensions: Vec<String>) -> Self {
		Self {
			interval,
			extensions,
			should_stop: Arc::new(AtomicBool::new(false)),
			worker: None,
		}
	}
}

impl WatcherBackend for PollingBackend {
	fn start(&mut self, root: &Path, callback: EventCallback) -> Result<()> {
		if self.worker.is_some() {
			return Err(WatcherError::AlreadyWatching(root.to_path_buf()));
		}
		validate_root(root)?;
		self.should_stop.store(false, Ordering::SeqCst);

		// Seed the consumer's index with one event per existing entry,
		// synchronously on the starting thread.
		emit_initial_entries(root, &callback);

		let baseline = take_snapshot(root, &self.extensions);
		info!(
			root = %root.display(),
			interval_ms = self.interval.as_millis() as u64,
			tracked = baseline.len(),
			"polling backend started"
		);

		let tick_root = root.to_path_buf();
		let interval = self.interval;
		let extensions = self.extensions.clone();
		let should_stop = Arc::clone(&self.should_stop);
		let worker = thread::Builder::new()
			.name("av-poll-watcher".into())
			.spawn(move || {
				tick_loop(&tick_root, interval, &extensions, baseline, callback, &should_stop);
			})?;
		self.worker = Some(worker);
		Ok(())
	}

	fn stop(&mut self) {
		self.should_stop.store(true, Ordering::SeqCst);
		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				error!("polling worker panicked");
			}
			info!("polling backend stopped");
		}
	}

	fn is_running(&self) -> bool {
		self.worker.is_some()
	}
}

impl Drop for PollingBackend {
	fn drop(&mut self) {
		self.stop();
	}
}

fn tick_loop(
	root: &Path,
	interval: Duration,
	extensions: &[String],
	mut baseline: Snapshot,
	callback: EventCallback,
	should_stop: &AtomicBool,
) {
	// Stop is checked on both sides of the sleep, bounding shutdown
	// latency to one interval.
	while !should_stop.load(Ordering::SeqCst) {
		thread::sleep(interval);
		if should_stop.load(Ordering::SeqCst) {
			break;
		}

		let current = take_snapshot(root, extensions);
		for event in diff_snapshots(root, &baseline, &current) {
			dispatch(&callback, event);
		}
		baseline = current;
	}
}

/// Emit `Created` for every existing file and `DirectoryCreated` for every
/// existing directory under `root`. The root itself is not reported.
fn emit_initial_entries(root: &Path, callback: &EventCallback) {
	for entry in WalkDir::new(root).min_depth(1) {
		let entry = match entry {
			Ok(entry) => entry,
			Err(err) => {
				warn!(%err, "skipping unreadable entry during initial scan");
				continue;
			}
		};
		let event = if entry.file_type().is_dir() {
			FileEvent::directory_created(entry.path())
		} else if entry.file_type().is_file() {
			FileEvent::created(entry.path())
		} else {
			continue;
		};
		dispatch(callback, event);
	}
}

/// Capture `(mtime, size)` for every regular file under `root`, honoring
/// the extension allow-list. The same filter is applied when the baseline
/// is built and on every tick, so an allow-list never produces spurious
/// `Deleted` events on the first pass.
fn take_snapshot(root: &Path, extensions: &[String]) -> Snapshot {
	let mut snapshot = Snapshot::new();
	for entry in WalkDir::new(root).min_depth(1) {
		let entry = match entry {
			Ok(entry) => entry,
			Err(err) => {
				warn!(%err, "skipping unreadable entry during poll");
				continue;
			}
		};
		if !entry.file_type().is_file() || !extension_matches(entry.path(), extensions) {
			continue;
		}
		let relative = entry
			.path()
			.strip_prefix(root)
			.unwrap_or_else(|_| entry.path())
			.to_path_buf();
		match entry.metadata() {
			Ok(metadata) => {
				let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
				snapshot.insert(
					relative,
					FileStamp {
						modified,
						len: metadata.len(),
					},
				);
			}
			// Entry vanished between the walk and the stat; if it stays
			// gone the next tick reports it as deleted.
			Err(err) => {
				warn!(path = %entry.path().display(), %err, "could not stat file during poll");
			}
		}
	}
	snapshot
}

/// One diff pass: `Created` for paths new in `current`, `Modified` for
/// paths whose mtime or size changed, `Deleted` for paths that left.
fn diff_snapshots(root: &Path, baseline: &Snapshot, current: &Snapshot) -> Vec<FileEvent> {
	let mut events = Vec::new();
	for (relative, stamp) in current {
		match baseline.get(relative) {
			None => events.push(FileEvent::created(root.join(relative))),
			Some(previous) if previous != stamp => {
				events.push(FileEvent::modified(root.join(relative)));
			}
			Some(_) => {}
		}
	}
	for relative in baseline.keys() {
		if !current.contains_key(relative) {
			events.push(FileEvent::deleted(root.join(relative)));
		}
	}
	events
}

fn extension_matches(path: &Path, extensions: &[String]) -> bool {
	if extensions.is_empty() {
		return true;
	}
	let Some(ext) = path.extension().and_then(OsStr::to_str) else {
		return false;
	};
	let ext = ext.to_ascii_lowercase();
	extensions.iter().any(|allowed| *allowed == ext)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FileEventType;
	use std::time::UNIX_EPOCH;

	fn stamp(secs: u64, len: u64) -> FileStamp {
		FileStamp {
			modified: UNIX_EPOCH + Duration::from_secs(secs),
			len,
		}
	}

	#[test]
	fn diff_reports_created_modified_deleted_in_path_order() {
		let root = Path::new("/watched");
		let mut baseline = Snapshot::new();
		baseline.insert(PathBuf::from("gone.txt"), stamp(1, 10));
		baseline.insert(PathBuf::from("same.txt"), stamp(1, 10));
		baseline.insert(PathBuf::from("touched.txt"), stamp(1, 10));

		let mut current = Snapshot::new();
		current.insert(PathBuf::from("new.txt"), stamp(2, 5));
		current.insert(PathBuf::from("same.txt"), stamp(1, 10));
		current.insert(PathBuf::from("touched.txt"), stamp(2, 10));

		let events = diff_snapshots(root, &baseline, &current);
		let kinds: Vec<_> = events.iter().map(|e| (e.kind, e.path.clone())).collect();
		assert_eq!(
			kinds,
			vec![
				(FileEventType::Created, root.join("new.txt")),
				(FileEventType::Modified, root.join("touched.txt")),
				(FileEventType::Deleted, root.join("gone.txt")),
			]
		);
	}

	#[test]
	fn diff_treats_size_change_alone_as_modified() {
		let root = Path::new("/watched");
		let mut baseline = Snapshot::new();
		baseline.insert(PathBuf::from("a.bin"), stamp(1, 10));
		let mut current = Snapshot::new();
		current.insert(PathBuf::from("a.bin"), stamp(1, 11));

		let events = diff_snapshots(root, &baseline, &current);
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, FileEventType::Modified);
	}

	#[test]
	fn identical_snapshots_produce_no_events() {
		let root = Path::new("/watched");
		let mut baseline = Snapshot::new();
		baseline.insert(PathBuf::from("a.bin"), stamp(1, 10));
		let current = baseline.clone();
		assert!(diff_snapshots(root, &baseline, &current).is_empty());
	}

	#[test]
	fn extension_filter_matches_case_insensitively() {
		let allowed = vec!["png".to_string()];
		assert!(extension_matches(Path::new("a.png"), &allowed));
		assert!(extension_matches(Path::new("a.PNG"), &allowed));
		assert!(!extension_matches(Path::new("a.txt"), &allowed));
		assert!(!extension_matches(Path::new("no_extension"), &allowed));
	}

	#[test]
	fn empty_filter_matches_everything() {
		assert!(extension_matches(Path::new("a.anything"), &[]));
		assert!(extension_matches(Path::new("no_extension"), &[]));
	}
}
