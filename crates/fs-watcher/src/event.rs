use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// The kind of change a backend observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEventType {
	Created,
	Modified,
	Deleted,
	Renamed,
	DirectoryCreated,
	DirectoryDeleted,
}

/// A single filesystem change, captured at detection time.
///
/// `timestamp` is when the backend decoded the change, not the entry's
/// filesystem mtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
	pub kind: FileEventType,
	pub path: PathBuf,
	/// Previous path of a renamed entry. The native facility reports the
	/// old and new names as separate records and the old half is dropped
	/// during decoding, so this is `None` even for [`FileEventType::Renamed`]
	/// events; consumers only learn the new path.
	pub old_path: Option<PathBuf>,
	pub timestamp: SystemTime,
}

impl FileEvent {
	pub fn new(kind: FileEventType, path: impl Into<PathBuf>) -> Self {
		Self {
			kind,
			path: path.into(),
			old_path: None,
			timestamp: SystemTime::now(),
		}
	}

	pub fn created(path: impl Into<PathBuf>) -> Self {
		Self::new(FileEventType::Created, path)
	}

	pub fn modified(path: impl Into<PathBuf>) -> Self {
		Self::new(FileEventType::Modified, path)
	}

	pub fn deleted(path: impl Into<PathBuf>) -> Self {
		Self::new(FileEventType::Deleted, path)
	}

	pub fn renamed(path: impl Into<PathBuf>, old_path: Option<PathBuf>) -> Self {
		Self {
			old_path,
			..Self::new(FileEventType::Renamed, path)
		}
	}

	pub fn directory_created(path: impl Into<PathBuf>) -> Self {
		Self::new(FileEventType::DirectoryCreated, path)
	}

	pub fn directory_deleted(path: impl Into<PathBuf>) -> Self {
		Self::new(FileEventType::DirectoryDeleted, path)
	}

	/// True for the directory variants.
	pub fn is_directory_event(&self) -> bool {
		matches!(
			self.kind,
			FileEventType::DirectoryCreated | FileEventType::DirectoryDeleted
		)
	}
}
