//! Per-provider hash cache
//!
//! Stores `(mtime, size) -> hash-by-type` so the local filesystem provider
//! can skip re-hashing files that haven't changed since the last run.
//! Grounded on the teacher's `ChildCache` (same redb + bincode shape,
//! re-keyed from per-chunk lists to a single hash-by-type map since this
//! engine hashes whole files, not content-defined chunks).

use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
	pub mtime_secs: i64,
	pub size: u64,
	/// hash_type -> hex digest
	pub hashes: BTreeMap<String, String>,
}

const FILES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Hash cache backed by a redb database, one per provider root.
pub struct HashCache {
	db: redb::Database,
}

impl HashCache {
	pub fn open(db_path: &Path) -> Result<Self, Box<dyn Error>> {
		let db = redb::Database::create(db_path)?;
		{
			let write_txn = db.begin_write()?;
			let _ = write_txn.open_table(FILES_TABLE)?;
			write_txn.commit()?;
		}
		Ok(HashCache { db })
	}

	/// Return the cached hash for `path` under `hash_type` if the entry is
	/// still valid for `(mtime_secs, size)`.
	pub fn get(
		&self,
		rel_path: &str,
		mtime_secs: i64,
		size: u64,
		hash_type: &str,
	) -> Result<Option<String>, Box<dyn Error>> {
		let read_txn = self.db.begin_read()?;
		let table = read_txn.open_table(FILES_TABLE)?;
		let Some(raw) = table.get(rel_path)? else { return Ok(None) };
		let entry: CacheEntry = bincode::deserialize(&raw.value().to_vec())?;
		if entry.mtime_secs != mtime_secs || entry.size != size {
			return Ok(None);
		}
		Ok(entry.hashes.get(hash_type).cloned())
	}

	/// Record a freshly computed hash for `path`, merging with any hashes
	/// already cached for the same `(mtime_secs, size)`.
	pub fn put(
		&self,
		rel_path: &str,
		mtime_secs: i64,
		size: u64,
		hash_type: &str,
		digest: &str,
	) -> Result<(), Box<dyn Error>> {
		let mut entry = {
			let read_txn = self.db.begin_read()?;
			let table = read_txn.open_table(FILES_TABLE)?;
			match table.get(rel_path)? {
				Some(raw) => {
					let cached: CacheEntry = bincode::deserialize(&raw.value().to_vec())?;
					if cached.mtime_secs == mtime_secs && cached.size == size {
						cached
					} else {
						CacheEntry { mtime_secs, size, hashes: BTreeMap::new() }
					}
				}
				None => CacheEntry { mtime_secs, size, hashes: BTreeMap::new() },
			}
		};
		entry.hashes.insert(hash_type.to_string(), digest.to_string());

		let bytes = bincode::serialize(&entry)?;
		let write_txn = self.db.begin_write()?;
		{
			let mut table = write_txn.open_table(FILES_TABLE)?;
			table.insert(rel_path, bytes.as_slice())?;
		}
		write_txn.commit()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn put_then_get_round_trips() {
		let tmp = TempDir::new().unwrap();
		let cache = HashCache::open(&tmp.path().join("cache.redb")).unwrap();
		cache.put("file.txt", 100, 1024, "sha256", "abc123").unwrap();
		assert_eq!(cache.get("file.txt", 100, 1024, "sha256").unwrap(), Some("abc123".to_string()));
	}

	#[test]
	fn mtime_change_invalidates_entry() {
		let tmp = TempDir::new().unwrap();
		let cache = HashCache::open(&tmp.path().join("cache.redb")).unwrap();
		cache.put("file.txt", 100, 1024, "sha256", "abc123").unwrap();
		assert_eq!(cache.get("file.txt", 200, 1024, "sha256").unwrap(), None);
	}

	#[test]
	fn size_change_invalidates_entry() {
		let tmp = TempDir::new().unwrap();
		let cache = HashCache::open(&tmp.path().join("cache.redb")).unwrap();
		cache.put("file.txt", 100, 1024, "sha256", "abc123").unwrap();
		assert_eq!(cache.get("file.txt", 100, 2048, "sha256").unwrap(), None);
	}

	#[test]
	fn distinct_hash_types_coexist() {
		let tmp = TempDir::new().unwrap();
		let cache = HashCache::open(&tmp.path().join("cache.redb")).unwrap();
		cache.put("file.txt", 100, 1024, "sha256", "plain").unwrap();
		cache.put("file.txt", 100, 1024, "sha256-blocked", "blocked").unwrap();
		assert_eq!(cache.get("file.txt", 100, 1024, "sha256").unwrap(), Some("plain".to_string()));
		assert_eq!(
			cache.get("file.txt", 100, 1024, "sha256-blocked").unwrap(),
			Some("blocked".to_string())
		);
	}
}

// vim: ts=4
