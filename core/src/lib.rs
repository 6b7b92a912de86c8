//! Asset inventory core.
//!
//! Three pieces, wired together by [`AssetIndex`]:
//!
//! - [`scanner`] walks a directory tree once and classifies every entry
//!   into a [`FileInfo`] record;
//! - [`db`] persists those records in SQLite;
//! - [`index`] seeds the database from a scan, then keeps it current by
//!   draining filesystem change events from `av-fs-watcher` on a
//!   dedicated consumer thread.

pub mod db;
pub mod index;
pub mod scanner;

pub use av_file_ext::AssetType;
pub use av_fs_watcher::{FileEvent, FileEventType, FileWatcher};
pub use db::AssetDatabase;
pub use index::AssetIndex;
pub use scanner::{scan_directory, FileInfo};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
	#[error("database error: {0}")]
	Database(#[from] rusqlite::Error),

	#[error("database is not open")]
	DatabaseClosed,

	#[error("could not start watching {0}")]
	WatchFailed(PathBuf),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
