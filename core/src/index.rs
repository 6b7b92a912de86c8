//! Live asset index.
//!
//! Seeds the database with a full scan, then keeps it current by draining
//! watcher events on a dedicated consumer thread. The watcher callback
//! only forwards events into a channel; every database write happens on
//! the drain thread, so the callback never touches shared state from the
//! watcher's worker.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use av_fs_watcher::{FileEvent, FileEventType, FileWatcher};
use tracing::{debug, error, info, warn};

use crate::db::AssetDatabase;
use crate::scanner::{scan_directory, FileInfo};
use crate::{CoreError, Result};

enum IndexMessage {
	Event(FileEvent),
	Shutdown,
}

/// Keeps an [`AssetDatabase`] in sync with a directory tree.
pub struct AssetIndex {
	db: Arc<Mutex<AssetDatabase>>,
	watcher: FileWatcher,
	drain: Option<JoinHandle<()>>,
	control: Option<Sender<IndexMessage>>,
}

impl AssetIndex {
	/// Takes an already-opened database.
	pub fn new(db: AssetDatabase) -> Self {
		Self {
			db: Arc::new(Mutex::new(db)),
			watcher: FileWatcher::new(),
			drain: None,
			control: None,
		}
	}

	/// Shared handle to the underlying database. Lock it briefly; the
	/// drain thread takes the same lock for every applied event.
	pub fn database(&self) -> Arc<Mutex<AssetDatabase>> {
		Arc::clone(&self.db)
	}

	/// Only effective before [`AssetIndex::start`].
	pub fn set_polling_interval(&mut self, interval: Duration) {
		self.watcher.set_polling_interval(interval);
	}

	/// Only effective before [`AssetIndex::start`]; polling backend only.
	pub fn set_file_extensions<I, S>(&mut self, extensions: I)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.watcher.set_file_extensions(extensions);
	}

	/// Scan `root`, seed the database with the result, then start the
	/// watcher and the drain thread.
	pub fn start(&mut self, root: impl AsRef<Path>) -> Result<()> {
		let root = root.as_ref();

		let records = scan_directory(root);
		self.db
			.lock()
			.unwrap()
			.insert_assets_batch(&records)?;
		info!(root = %root.display(), seeded = records.len(), "asset index seeded");

		let (tx, rx) = mpsc::channel();
		let drain_db = Arc::clone(&self.db);
		let drain_root = root.to_path_buf();
		let drain = thread::Builder::new()
			.name("av-index-drain".into())
			.spawn(move || drain_loop(rx, &drain_db, &drain_root))?;

		let event_tx = tx.clone();
		let started = self.watcher.start_watching(root, move |event: &FileEvent| {
			// Receiver gone just means the index is shutting down.
			let _ = event_tx.send(IndexMessage::Event(event.clone()));
		});
		if !started {
			let _ = tx.send(IndexMessage::Shutdown);
			if drain.join().is_err() {
				error!("index drain thread panicked");
			}
			return Err(CoreError::WatchFailed(root.to_path_buf()));
		}

		self.control = Some(tx);
		self.drain = Some(drain);
		Ok(())
	}

	/// Stop the watcher, then the drain thread. Idempotent.
	pub fn stop(&mut self) {
		self.watcher.stop_watching();
		if let Some(control) = self.control.take() {
			let _ = control.send(IndexMessage::Shutdown);
		}
		if let Some(drain) = self.drain.take() {
			if drain.join().is_err() {
				error!("index drain thread panicked");
			}
			info!("asset index stopped");
		}
	}

	pub fn is_running(&self) -> bool {
		self.watcher.is_watching()
	}
}

impl Drop for AssetIndex {
	fn drop(&mut self) {
		self.stop();
	}
}

fn drain_loop(rx: Receiver<IndexMessage>, db: &Arc<Mutex<AssetDatabase>>, root: &Path) {
	while let Ok(message) = rx.recv() {
		match message {
			IndexMessage::Shutdown => break,
			IndexMessage::Event(event) => apply_event(db, root, &event),
		}
	}
}

/// Mirror one filesystem change into the database. Failures are logged
/// and never kill the drain thread.
fn apply_event(db: &Arc<Mutex<AssetDatabase>>, root: &Path, event: &FileEvent) {
	let result = match event.kind {
		FileEventType::Created | FileEventType::Modified => upsert(db, root, &event.path),
		FileEventType::Deleted => db.lock().unwrap().delete_asset(&event.path),
		FileEventType::Renamed => {
			// The native backend does not report the old half of a rename
			// pair, so the stale row can only be dropped when old_path is
			// present (see av-fs-watcher's event docs).
			if let Some(old_path) = &event.old_path {
				if let Err(err) = db.lock().unwrap().delete_asset(old_path) {
					warn!(path = %old_path.display(), %err, "could not drop renamed-away asset");
				}
			}
			upsert(db, root, &event.path)
		}
		// Directory lifecycle is only captured at seeding time; change
		// events for directories carry no record to store.
		FileEventType::DirectoryCreated | FileEventType::DirectoryDeleted => {
			debug!(path = %event.path.display(), kind = ?event.kind, "ignoring directory event");
			Ok(())
		}
	};

	if let Err(err) = result {
		warn!(
			path = %event.path.display(),
			kind = ?event.kind,
			%err,
			"failed to apply event to database"
		);
	}
}

fn upsert(db: &Arc<Mutex<AssetDatabase>>, root: &Path, path: &Path) -> Result<()> {
	if !path.exists() {
		debug!(path = %path.display(), "path vanished before it could be indexed");
		return Ok(());
	}
	let info = FileInfo::from_path(root, path);
	if info.is_directory {
		return Ok(());
	}
	db.lock().unwrap().insert_asset(&info)
}
