//! Filesystem change monitoring for the asset index.
//!
//! One watch session covers a single directory tree and delivers
//! [`FileEvent`]s to a caller-supplied callback. Two mechanisms sit behind
//! the same contract:
//!
//! - [`backend::NativeBackend`] wraps the OS asynchronous notification
//!   facility (inotify, FSEvents, `ReadDirectoryChangesW`) and decodes its
//!   raw change records on a dedicated worker thread;
//! - [`backend::PollingBackend`] walks the tree on a fixed interval and
//!   diffs each snapshot against the previous one.
//!
//! [`FileWatcher`] is the public entry point: it tries the native backend
//! first and falls back to polling when the facility is unavailable.
//!
//! The callback runs on the backend's worker thread, concurrently with the
//! controlling thread. The watcher provides no dispatch-to-owner queue, so
//! consumers that touch shared state from the callback should forward
//! events into a channel and drain it from a single consumer instead of
//! mutating that state directly.

pub mod backend;
mod event;
mod watcher;

pub use backend::{BackendKind, WatcherBackend};
pub use event::{FileEvent, FileEventType};
pub use watcher::FileWatcher;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while starting or running a watch backend.
///
/// None of these cross the [`FileWatcher::start_watching`] boundary; the
/// facade logs them and reports a plain `false`.
#[derive(Debug, Error)]
pub enum WatcherError {
	#[error("already watching {0}")]
	AlreadyWatching(PathBuf),

	#[error("path does not exist or is not a directory: {0}")]
	InvalidRoot(PathBuf),

	/// The native notification facility could not be set up. The facade
	/// treats this as "fall back to polling", not as a user-visible
	/// failure.
	#[error("native notification backend unavailable: {0}")]
	PlatformUnavailable(#[source] notify::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WatcherError>;

/// Callback invoked once per detected change, on the backend's worker
/// thread.
pub type EventCallback = Arc<dyn Fn(&FileEvent) + Send + Sync>;
