//! One-shot recursive directory scan.
//!
//! Produces the initial set of [`FileInfo`] records the index is seeded
//! with. Unreadable entries never abort a scan: stat failures degrade to
//! a zero-size record and the walk continues.

use std::fs;
use std::path::{Path, PathBuf};

use av_file_ext::AssetType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// A classified filesystem entry, produced by the scanner or rebuilt by
/// the index when applying a change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
	pub full_path: PathBuf,
	/// Path relative to the scanned root.
	pub relative_path: PathBuf,
	pub name: String,
	/// Lowercase extension without the leading dot; empty for directories
	/// and extensionless files.
	pub extension: String,
	pub asset_type: AssetType,
	/// Always zero for directories.
	pub size: u64,
	pub last_modified: DateTime<Utc>,
	pub is_directory: bool,
}

impl FileInfo {
	/// Build a record for `path`, classifying it by extension. `root` is
	/// only used to derive the relative path; pass the scanned or watched
	/// root.
	pub fn from_path(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Self {
		let root = root.as_ref();
		let path = path.as_ref();
		let is_directory = path.is_dir();

		let (size, last_modified) = match fs::metadata(path) {
			Ok(metadata) => {
				let size = if is_directory { 0 } else { metadata.len() };
				let last_modified = metadata
					.modified()
					.map(DateTime::<Utc>::from)
					.unwrap_or(DateTime::UNIX_EPOCH);
				(size, last_modified)
			}
			Err(err) => {
				warn!(path = %path.display(), %err, "could not stat entry, keeping zero-size record");
				(0, DateTime::UNIX_EPOCH)
			}
		};

		let extension = if is_directory {
			String::new()
		} else {
			path.extension()
				.map(|ext| ext.to_string_lossy().to_ascii_lowercase())
				.unwrap_or_default()
		};
		let asset_type = if is_directory {
			AssetType::Directory
		} else {
			AssetType::from_extension(&extension)
		};

		Self {
			full_path: path.to_path_buf(),
			relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
			name: path
				.file_name()
				.map(|name| name.to_string_lossy().into_owned())
				.unwrap_or_default(),
			extension,
			asset_type,
			size,
			last_modified,
			is_directory,
		}
	}
}

/// Recursively scan `root`, returning one record per entry (the root
/// itself is not included).
///
/// Returns an empty vector and logs an error when `root` does not exist
/// or is not a directory; unreadable entries are skipped and the scan
/// continues.
pub fn scan_directory(root: impl AsRef<Path>) -> Vec<FileInfo> {
	let root = root.as_ref();
	if !root.is_dir() {
		error!(path = %root.display(), "scan root does not exist or is not a directory");
		return Vec::new();
	}

	info!(root = %root.display(), "scanning directory");
	let mut records = Vec::new();
	for entry in WalkDir::new(root).min_depth(1) {
		match entry {
			Ok(entry) => records.push(FileInfo::from_path(root, entry.path())),
			Err(err) => warn!(%err, "skipping unreadable entry during scan"),
		}
	}
	info!(root = %root.display(), count = records.len(), "scan complete");
	records
}
