//! Public watcher facade.
//!
//! Owns backend selection and the single-active-watch invariant. The
//! native backend is always attempted first; any failure there (platform
//! unsupported, watch registration refused) silently degrades to the
//! polling backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::backend::{BackendKind, NativeBackend, PollingBackend, WatcherBackend};
use crate::{EventCallback, FileEvent};

const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(1000);

enum ActiveBackend {
	Native(NativeBackend),
	Polling(PollingBackend),
}

impl ActiveBackend {
	fn kind(&self) -> BackendKind {
		match self {
			Self::Native(_) => BackendKind::Native,
			Self::Polling(_) => BackendKind::Polling,
		}
	}

	fn stop(&mut self) {
		match self {
			Self::Native(backend) => backend.stop(),
			Self::Polling(backend) => backend.stop(),
		}
	}
}

/// Watches one directory tree and delivers change events to a callback.
///
/// Configuration setters only take effect when called before
/// [`FileWatcher::start_watching`]; a running watch is never reconfigured.
/// The extension allow-list applies to the polling backend only — the
/// native backend reports all changes regardless of the list.
pub struct FileWatcher {
	watched_path: Option<PathBuf>,
	extensions: Vec<String>,
	polling_interval: Duration,
	backend: Option<ActiveBackend>,
}

impl FileWatcher {
	pub fn new() -> Self {
		Self {
			watched_path: None,
			extensions: Vec::new(),
			polling_interval: DEFAULT_POLLING_INTERVAL,
			backend: None,
		}
	}

	/// Restrict polling-backend change reports to files with one of these
	/// extensions. Accepted with or without the leading dot; matching is
	/// case-insensitive. Directories are never filtered.
	pub fn set_file_extensions<I, S>(&mut self, extensions: I)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.extensions = extensions
			.into_iter()
			.map(|ext| normalize_extension(ext.as_ref()))
			.filter(|ext| !ext.is_empty())
			.collect();
	}

	/// Tick interval for the polling backend. Also bounds its shutdown
	/// latency.
	pub fn set_polling_interval(&mut self, interval: Duration) {
		self.polling_interval = interval;
	}

	/// Start watching `root`. Returns `false` when a watch is already
	/// active on this instance, when `root` is missing or not a
	/// directory, or when both backends fail to start.
	///
	/// The callback runs on the backend's worker thread; see the crate
	/// docs for the concurrency contract.
	pub fn start_watching<F>(&mut self, root: impl AsRef<Path>, callback: F) -> bool
	where
		F: Fn(&FileEvent) + Send + Sync + 'static,
	{
		let root = root.as_ref();
		if self.backend.is_some() {
			error!(
				path = %root.display(),
				"start_watching called while a watch is already active"
			);
			return false;
		}
		if !root.is_dir() {
			error!(
				path = %root.display(),
				"watch root does not exist or is not a directory"
			);
			return false;
		}

		let callback: EventCallback = Arc::new(callback);

		let mut native = NativeBackend::new();
		let backend = match native.start(root, Arc::clone(&callback)) {
			Ok(()) => ActiveBackend::Native(native),
			Err(err) => {
				warn!(%err, "native backend unavailable, falling back to polling");
				let mut polling =
					PollingBackend::new(self.polling_interval, self.extensions.clone());
				match polling.start(root, callback) {
					Ok(()) => ActiveBackend::Polling(polling),
					Err(err) => {
						error!(%err, "polling backend failed to start");
						return false;
					}
				}
			}
		};

		info!(
			path = %root.display(),
			backend = ?backend.kind(),
			"watch session started"
		);
		self.backend = Some(backend);
		self.watched_path = Some(root.to_path_buf());
		true
	}

	/// Stop the active watch, blocking until the worker thread has
	/// terminated and all OS resources are released. Safe to call when
	/// not watching; the second call is a no-op.
	pub fn stop_watching(&mut self) {
		if let Some(mut backend) = self.backend.take() {
			backend.stop();
		}
	}

	pub fn is_watching(&self) -> bool {
		self.backend.is_some()
	}

	/// Root of the current (or most recent) watch session.
	pub fn watched_path(&self) -> Option<&Path> {
		self.watched_path.as_deref()
	}

	/// Which backend the active session runs on. Diagnostic only.
	pub fn backend_kind(&self) -> Option<BackendKind> {
		self.backend.as_ref().map(ActiveBackend::kind)
	}
}

impl Default for FileWatcher {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for FileWatcher {
	fn drop(&mut self) {
		self.stop_watching();
	}
}

fn normalize_extension(extension: &str) -> String {
	extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extensions_are_normalized() {
		let mut watcher = FileWatcher::new();
		watcher.set_file_extensions([".PNG", "fbx", " .Wav ", ""]);
		assert_eq!(watcher.extensions, vec!["png", "fbx", "wav"]);
	}

	#[test]
	fn new_watcher_is_idle() {
		let watcher = FileWatcher::new();
		assert!(!watcher.is_watching());
		assert!(watcher.watched_path().is_none());
		assert!(watcher.backend_kind().is_none());
	}
}
