//! SQLite persistence for asset records.
//!
//! One `assets` table keyed by unique `full_path`. The connection has an
//! explicit open/close lifecycle; every accessor fails with
//! [`CoreError::DatabaseClosed`] once `close` has been called.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use tracing::{info, warn};

use crate::scanner::FileInfo;
use crate::{AssetType, CoreError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS assets (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL,
	extension TEXT,
	full_path TEXT UNIQUE NOT NULL,
	relative_path TEXT NOT NULL,
	size INTEGER NOT NULL,
	last_modified TEXT NOT NULL,
	is_directory INTEGER NOT NULL,
	asset_type TEXT NOT NULL,
	created_at TEXT DEFAULT CURRENT_TIMESTAMP,
	updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_assets_full_path ON assets(full_path);
CREATE INDEX IF NOT EXISTS idx_assets_relative_path ON assets(relative_path);
CREATE INDEX IF NOT EXISTS idx_assets_asset_type ON assets(asset_type);
CREATE INDEX IF NOT EXISTS idx_assets_extension ON assets(extension);
";

const INSERT_SQL: &str = "
INSERT OR REPLACE INTO assets
	(name, extension, full_path, relative_path, size, last_modified, is_directory, asset_type, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
";

const SELECT_COLUMNS: &str =
	"name, extension, full_path, relative_path, size, last_modified, is_directory, asset_type";

pub struct AssetDatabase {
	conn: Option<Connection>,
}

impl AssetDatabase {
	pub fn new() -> Self {
		Self { conn: None }
	}

	/// Open (or create) the database file at `path`, creating parent
	/// directories as needed. Re-initializing an open database closes the
	/// previous connection first.
	pub fn initialize(&mut self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		if self.conn.is_some() {
			self.close();
		}
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}

		let conn = Connection::open(path)?;
		// WAL keeps readers unblocked while the drain thread writes. The
		// pragma reports the resulting mode as a row, hence query_row.
		conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
		conn.execute_batch("PRAGMA foreign_keys = ON;")?;
		conn.execute_batch(SCHEMA)?;
		info!(path = %path.display(), "asset database opened");
		self.conn = Some(conn);
		Ok(())
	}

	/// In-memory database, mainly for tests.
	pub fn in_memory() -> Result<Self> {
		let conn = Connection::open_in_memory()?;
		conn.execute_batch(SCHEMA)?;
		Ok(Self { conn: Some(conn) })
	}

	pub fn close(&mut self) {
		if self.conn.take().is_some() {
			info!("asset database closed");
		}
	}

	pub fn is_open(&self) -> bool {
		self.conn.is_some()
	}

	fn conn(&self) -> Result<&Connection> {
		self.conn.as_ref().ok_or(CoreError::DatabaseClosed)
	}

	/// Insert or replace one record, keyed on `full_path`.
	pub fn insert_asset(&self, file: &FileInfo) -> Result<()> {
		let mut stmt = self.conn()?.prepare_cached(INSERT_SQL)?;
		execute_with_file(&mut stmt, file)?;
		Ok(())
	}

	pub fn update_asset(&self, file: &FileInfo) -> Result<()> {
		let mut stmt = self.conn()?.prepare_cached(
			"UPDATE assets SET
				name = ?1, extension = ?2, relative_path = ?4, size = ?5,
				last_modified = ?6, is_directory = ?7, asset_type = ?8,
				updated_at = CURRENT_TIMESTAMP
			WHERE full_path = ?3",
		)?;
		let updated = execute_with_file(&mut stmt, file)?;
		if updated == 0 {
			warn!(path = %file.full_path.display(), "update targeted an unknown asset");
		}
		Ok(())
	}

	pub fn delete_asset(&self, full_path: impl AsRef<Path>) -> Result<()> {
		self.conn()?.execute(
			"DELETE FROM assets WHERE full_path = ?1",
			params![path_str(full_path.as_ref())],
		)?;
		Ok(())
	}

	/// All records in a single transaction; used for seeding after a scan.
	pub fn insert_assets_batch(&mut self, files: &[FileInfo]) -> Result<()> {
		let conn = self.conn.as_mut().ok_or(CoreError::DatabaseClosed)?;
		let tx = conn.transaction()?;
		{
			let mut stmt = tx.prepare(INSERT_SQL)?;
			for file in files {
				execute_with_file(&mut stmt, file)?;
			}
		}
		tx.commit()?;
		info!(count = files.len(), "batch insert committed");
		Ok(())
	}

	pub fn get_asset_by_path(&self, full_path: impl AsRef<Path>) -> Result<Option<FileInfo>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM assets WHERE full_path = ?1");
		let asset = self
			.conn()?
			.query_row(&sql, params![path_str(full_path.as_ref())], row_to_file_info)
			.optional()?;
		Ok(asset)
	}

	pub fn get_all_assets(&self) -> Result<Vec<FileInfo>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM assets ORDER BY relative_path");
		let mut stmt = self.conn()?.prepare(&sql)?;
		let assets = stmt
			.query_map([], row_to_file_info)?
			.collect::<rusqlite::Result<Vec<_>>>()?;
		Ok(assets)
	}

	pub fn get_assets_by_type(&self, asset_type: AssetType) -> Result<Vec<FileInfo>> {
		let sql =
			format!("SELECT {SELECT_COLUMNS} FROM assets WHERE asset_type = ?1 ORDER BY relative_path");
		let mut stmt = self.conn()?.prepare(&sql)?;
		let assets = stmt
			.query_map(params![asset_type.to_string()], row_to_file_info)?
			.collect::<rusqlite::Result<Vec<_>>>()?;
		Ok(assets)
	}

	/// Case-insensitive substring match on the entry name.
	pub fn search_assets_by_name(&self, term: &str) -> Result<Vec<FileInfo>> {
		let sql = format!(
			"SELECT {SELECT_COLUMNS} FROM assets WHERE name LIKE ?1 ORDER BY relative_path"
		);
		let mut stmt = self.conn()?.prepare(&sql)?;
		let pattern = format!("%{term}%");
		let assets = stmt
			.query_map(params![pattern], row_to_file_info)?
			.collect::<rusqlite::Result<Vec<_>>>()?;
		Ok(assets)
	}

	pub fn clear_all_assets(&self) -> Result<()> {
		self.conn()?.execute("DELETE FROM assets", [])?;
		Ok(())
	}

	pub fn get_total_asset_count(&self) -> Result<i64> {
		let count = self
			.conn()?
			.query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
		Ok(count)
	}

	/// Total size of all indexed files; directories do not contribute.
	pub fn get_total_size(&self) -> Result<u64> {
		let total: i64 = self.conn()?.query_row(
			"SELECT COALESCE(SUM(size), 0) FROM assets WHERE is_directory = 0",
			[],
			|row| row.get(0),
		)?;
		Ok(total as u64)
	}
}

impl Default for AssetDatabase {
	fn default() -> Self {
		Self::new()
	}
}

fn path_str(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}

/// Bind a record to a statement whose parameters follow the
/// [`INSERT_SQL`] order (the update statement reuses the same order, with
/// `full_path` addressing its WHERE clause).
fn execute_with_file(stmt: &mut Statement<'_>, file: &FileInfo) -> rusqlite::Result<usize> {
	stmt.execute(params![
		file.name,
		file.extension,
		path_str(&file.full_path),
		path_str(&file.relative_path),
		file.size as i64,
		file.last_modified.to_rfc3339(),
		file.is_directory,
		file.asset_type.to_string(),
	])
}

fn row_to_file_info(row: &Row<'_>) -> rusqlite::Result<FileInfo> {
	let size: i64 = row.get(4)?;
	let last_modified: String = row.get(5)?;
	let asset_type: String = row.get(7)?;

	Ok(FileInfo {
		name: row.get(0)?,
		extension: row.get(1)?,
		full_path: PathBuf::from(row.get::<_, String>(2)?),
		relative_path: PathBuf::from(row.get::<_, String>(3)?),
		size: size as u64,
		// Stored values written by us always parse; anything hand-edited
		// degrades instead of failing the whole query.
		last_modified: DateTime::parse_from_rfc3339(&last_modified)
			.map(|dt| dt.with_timezone(&Utc))
			.unwrap_or(DateTime::UNIX_EPOCH),
		is_directory: row.get(6)?,
		asset_type: asset_type.parse().unwrap_or(AssetType::Unknown),
	})
}
