//! Watch backends.
//!
//! Both mechanisms implement [`WatcherBackend`]; [`crate::FileWatcher`]
//! picks one at start time and never runs both.

mod native;
mod polling;

pub use native::NativeBackend;
pub use polling::PollingBackend;

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::error;

use crate::{EventCallback, FileEvent, Result, WatcherError};

/// Contract shared by the two watch mechanisms.
///
/// A running backend owns exactly one worker thread. `stop` must block
/// until that thread has terminated and all OS resources are released,
/// and must be safe to call when the backend never started.
pub trait WatcherBackend {
	fn start(&mut self, root: &Path, callback: EventCallback) -> Result<()>;
	fn stop(&mut self);
	fn is_running(&self) -> bool;
}

/// Which mechanism a watch session ended up running on. Diagnostic only;
/// the behavioral contract is the same either way, modulo the extension
/// filter and rename fidelity differences documented on
/// [`crate::FileWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
	Native,
	Polling,
}

fn validate_root(root: &Path) -> Result<()> {
	if !root.is_dir() {
		return Err(WatcherError::InvalidRoot(root.to_path_buf()));
	}
	Ok(())
}

/// Invoke the callback for one event, isolating panics so a failing
/// consumer cannot kill the worker thread and stop subsequent delivery.
fn dispatch(callback: &EventCallback, event: FileEvent) {
	if panic::catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
		error!(path = %event.path.display(), "event callback panicked; continuing watch");
	}
}
