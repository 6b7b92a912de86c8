//! Native notification backend.
//!
//! Wraps the platform's asynchronous change facility (inotify on Linux,
//! FSEvents on macOS, `ReadDirectoryChangesW` on Windows) through the
//! `notify` crate. Raw change records are decoded on a dedicated worker
//! thread and dispatched to the callback one at a time.
//!
//! The worker blocks on a single channel that carries both change records
//! and the shutdown signal, so `stop` wakes it immediately instead of
//! waiting out a poll interval.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info, trace, warn};

use super::{dispatch, validate_root, WatcherBackend};
use crate::{EventCallback, FileEvent, FileEventType, Result, WatcherError};

enum WorkerMessage {
	Change(std::result::Result<notify::Event, notify::Error>),
	Shutdown,
}

pub struct NativeBackend {
	/// Keeps the OS watch registration alive; dropped last during stop.
	watcher: Option<RecommendedWatcher>,
	worker: Option<JoinHandle<()>>,
	control: Option<Sender<WorkerMessage>>,
}

impl NativeBackend {
	pub fn new() -> Self {
		Self {
			watcher: None,
			worker: None,
			control: None,
		}
	}
}

impl Default for NativeBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl WatcherBackend for NativeBackend {
	fn start(&mut self, root: &Path, callback: EventCallback) -> Result<()> {
		if self.worker.is_some() {
			return Err(WatcherError::AlreadyWatching(root.to_path_buf()));
		}
		validate_root(root)?;

		let (tx, rx) = mpsc::channel();
		let change_tx = tx.clone();
		let mut watcher = notify::recommended_watcher(move |change| {
			// The receiver going away just means the watch is stopping.
			let _ = change_tx.send(WorkerMessage::Change(change));
		})
		.map_err(WatcherError::PlatformUnavailable)?;
		watcher
			.watch(root, RecursiveMode::Recursive)
			.map_err(WatcherError::PlatformUnavailable)?;

		let worker = thread::Builder::new()
			.name("av-native-watcher".into())
			.spawn(move || watch_loop(rx, callback))?;

		info!(root = %root.display(), "native backend started");
		self.watcher = Some(watcher);
		self.worker = Some(worker);
		self.control = Some(tx);
		Ok(())
	}

	fn stop(&mut self) {
		// Wake the worker first, then join, then drop the OS watch
		// registration. Same order on every exit route.
		if let Some(control) = self.control.take() {
			let _ = control.send(WorkerMessage::Shutdown);
		}
		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				error!("native worker panicked");
			}
		}
		if self.watcher.take().is_some() {
			info!("native backend stopped");
		}
	}

	fn is_running(&self) -> bool {
		self.worker.is_some()
	}
}

impl Drop for NativeBackend {
	fn drop(&mut self) {
		self.stop();
	}
}

fn watch_loop(rx: Receiver<WorkerMessage>, callback: EventCallback) {
	while let Ok(message) = rx.recv() {
		match message {
			WorkerMessage::Shutdown => break,
			WorkerMessage::Change(Ok(raw)) => {
				for event in decode(raw) {
					dispatch(&callback, event);
				}
			}
			WorkerMessage::Change(Err(err)) => {
				warn!(%err, "native change stream error; some events may have been lost");
			}
		}
	}
}

/// Map one raw change record onto zero or more events.
///
/// The old-name half of a rename pair produces no event of its own, and
/// its path is not carried into the `Renamed` event either: consumers only
/// learn the new path of a renamed entry.
fn decode(raw: notify::Event) -> Vec<FileEvent> {
	if raw.need_rescan() {
		warn!("native change buffer overflowed; changes were dropped");
	}

	let kind = match raw.kind {
		EventKind::Create(CreateKind::Folder) => FileEventType::DirectoryCreated,
		EventKind::Create(_) => FileEventType::Created,
		EventKind::Remove(RemoveKind::Folder) => FileEventType::DirectoryDeleted,
		EventKind::Remove(_) => FileEventType::Deleted,
		EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
			// Consumed; the matching new-name record carries the event.
			return Vec::new();
		}
		EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
			FileEventType::Renamed
		}
		EventKind::Modify(_) => FileEventType::Modified,
		other => {
			trace!(kind = ?other, "ignoring change record");
			return Vec::new();
		}
	};

	// A `Both` rename record lists the old path first and the new path
	// last; everything else carries a single path.
	let path = if kind == FileEventType::Renamed {
		raw.paths.into_iter().last()
	} else {
		raw.paths.into_iter().next()
	};
	match path {
		Some(path) => vec![FileEvent::new(kind, path)],
		None => Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use notify::event::{DataChange, MetadataKind};
	use std::path::PathBuf;

	fn raw(kind: EventKind, paths: &[&str]) -> notify::Event {
		paths
			.iter()
			.fold(notify::Event::new(kind), |event, path| {
				event.add_path(PathBuf::from(*path))
			})
	}

	#[test]
	fn create_records_map_by_entry_kind() {
		let events = decode(raw(EventKind::Create(CreateKind::File), &["/w/a.png"]));
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, FileEventType::Created);

		let events = decode(raw(EventKind::Create(CreateKind::Folder), &["/w/models"]));
		assert_eq!(events[0].kind, FileEventType::DirectoryCreated);
	}

	#[test]
	fn remove_records_map_by_entry_kind() {
		let events = decode(raw(EventKind::Remove(RemoveKind::File), &["/w/a.png"]));
		assert_eq!(events[0].kind, FileEventType::Deleted);

		let events = decode(raw(EventKind::Remove(RemoveKind::Folder), &["/w/models"]));
		assert_eq!(events[0].kind, FileEventType::DirectoryDeleted);
	}

	#[test]
	fn modify_records_map_to_modified() {
		let events = decode(raw(
			EventKind::Modify(ModifyKind::Data(DataChange::Content)),
			&["/w/a.png"],
		));
		assert_eq!(events[0].kind, FileEventType::Modified);

		let events = decode(raw(
			EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
			&["/w/a.png"],
		));
		assert_eq!(events[0].kind, FileEventType::Modified);
	}

	#[test]
	fn rename_old_half_is_consumed_silently() {
		let events = decode(raw(
			EventKind::Modify(ModifyKind::Name(RenameMode::From)),
			&["/w/old.png"],
		));
		assert!(events.is_empty());
	}

	#[test]
	fn rename_emits_new_path_without_old_path() {
		let events = decode(raw(
			EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
			&["/w/old.png", "/w/new.png"],
		));
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, FileEventType::Renamed);
		assert_eq!(events[0].path, PathBuf::from("/w/new.png"));
		assert!(events[0].old_path.is_none());

		let events = decode(raw(
			EventKind::Modify(ModifyKind::Name(RenameMode::To)),
			&["/w/new.png"],
		));
		assert_eq!(events[0].path, PathBuf::from("/w/new.png"));
	}

	#[test]
	fn access_records_are_ignored() {
		use notify::event::{AccessKind, AccessMode};
		let events = decode(raw(
			EventKind::Access(AccessKind::Close(AccessMode::Write)),
			&["/w/a.png"],
		));
		assert!(events.is_empty());
	}
}
