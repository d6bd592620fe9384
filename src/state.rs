//! State model and persistence: `FileState`, `StorageState`, `SyncPairState`

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-file record keyed by normalized relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
	/// Original relative path as reported by the provider (may differ in
	/// case/NFC from the state-map key).
	pub path: String,
	/// Hex digest, meaningful only under `hash_type`.
	pub content_hash: String,
	/// Tag identifying the hash algorithm (see `crate::hash`).
	pub hash_type: String,
	/// Opaque optimistic-concurrency token; empty if the provider has none.
	#[serde(default)]
	pub revision: String,
}

impl FileState {
	pub fn new(path: impl Into<String>, content_hash: impl Into<String>, hash_type: impl Into<String>) -> Self {
		FileState {
			path: path.into(),
			content_hash: content_hash.into(),
			hash_type: hash_type.into(),
			revision: String::new(),
		}
	}

	pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
		self.revision = revision.into();
		self
	}
}

/// Mapping from normalized relative path to `FileState`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageState {
	pub files: BTreeMap<String, FileState>,
}

impl StorageState {
	pub fn new() -> Self {
		StorageState::default()
	}

	pub fn insert(&mut self, key: impl Into<String>, state: FileState) {
		self.files.insert(key.into(), state);
	}

	pub fn get(&self, key: &str) -> Option<&FileState> {
		self.files.get(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<FileState> {
		self.files.remove(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.files.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}
}

/// Ordered pair of snapshots persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPairState {
	#[serde(default = "default_version")]
	pub version: u32,
	pub source: StorageState,
	pub destination: StorageState,
}

fn default_version() -> u32 {
	1
}

impl SyncPairState {
	pub fn new(source: StorageState, destination: StorageState) -> Self {
		SyncPairState { version: 1, source, destination }
	}
}

/// Persistent manager for a single sync pair's snapshot file.
pub struct StateManager {
	state_dir: PathBuf,
	pair_handle: String,
}

impl StateManager {
	pub fn new(state_dir: PathBuf, pair_handle: impl Into<String>) -> Self {
		StateManager { state_dir, pair_handle: pair_handle.into() }
	}

	/// Load the persisted snapshot, or `None` if absent or corrupt.
	///
	/// A corrupt state file is treated as "no baseline" rather than a fatal
	/// error: the next run simply re-derives everything as Added/Removed.
	pub async fn load(&self) -> Option<SyncPairState> {
		let path = self.state_path();
		let contents = tokio::fs::read_to_string(&path).await.ok()?;
		serde_json::from_str(&contents).ok()
	}

	/// Save the snapshot atomically (write to a temp file, then rename).
	pub async fn save(&self, state: &SyncPairState) -> Result<(), StateError> {
		let path = self.state_path();
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		}

		let json = serde_json::to_string_pretty(state)
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		let tmp_path = path.with_extension("json.tmp");
		tokio::fs::write(&tmp_path, json)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		tokio::fs::rename(&tmp_path, &path)
			.await
			.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;

		Ok(())
	}

	/// Delete the persisted snapshot, if any.
	pub async fn clear(&self) -> Result<(), StateError> {
		let path = self.state_path();
		if path.exists() {
			tokio::fs::remove_file(&path)
				.await
				.map_err(|e| StateError::SaveFailed { source: Box::new(e) })?;
		}
		Ok(())
	}

	pub fn state_path(&self) -> PathBuf {
		self.state_dir.join(&self.pair_handle)
	}

	/// Acquire an exclusive lock on this pair's state directory.
	pub async fn lock(&self) -> Result<StateLock, StateError> {
		tokio::fs::create_dir_all(&self.state_dir)
			.await
			.map_err(|e| StateError::LockFailed { message: e.to_string() })?;

		let lock_path = self.state_dir.join(format!(".{}.lock", self.pair_handle));

		if lock_path.exists() {
			return Err(StateError::LockFailed {
				message: format!(
					"sync already in progress for this pair (lock file exists): {}",
					lock_path.display()
				),
			});
		}

		let pid = std::process::id();
		tokio::fs::write(&lock_path, pid.to_string())
			.await
			.map_err(|e| StateError::LockFailed { message: e.to_string() })?;

		Ok(StateLock { path: lock_path })
	}
}

/// RAII guard removing the lock file on drop (success or failure).
pub struct StateLock {
	path: PathBuf,
}

impl Drop for StateLock {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(&self.path);
	}
}

/// Compute the on-disk filename for a sync pair, per SPEC_FULL.md §6:
/// `hash_dict({src, dst, filter, depth})`.
pub fn pair_handle(src_handle: &str, dst_handle: &str, filter: &str, depth: Option<usize>) -> String {
	#[derive(Serialize)]
	struct Key<'a> {
		src: &'a str,
		dst: &'a str,
		filter: &'a str,
		depth: Option<usize>,
	}
	crate::hash::hash_dict(&Key { src: src_handle, dst: dst_handle, filter, depth })
		.unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn round_trips_through_save_and_load() {
		let tmp = TempDir::new().unwrap();
		let manager = StateManager::new(tmp.path().to_path_buf(), "pair-abc");

		let mut src = StorageState::new();
		src.insert("foo.txt", FileState::new("foo.txt", "deadbeef", "sha256"));
		let dst = StorageState::new();

		let state = SyncPairState::new(src, dst);
		manager.save(&state).await.unwrap();

		let loaded = manager.load().await.unwrap();
		assert_eq!(loaded.source, state.source);
		assert_eq!(loaded.destination, state.destination);
	}

	#[tokio::test]
	async fn missing_state_file_loads_as_none() {
		let tmp = TempDir::new().unwrap();
		let manager = StateManager::new(tmp.path().to_path_buf(), "missing");
		assert!(manager.load().await.is_none());
	}

	#[tokio::test]
	async fn corrupt_state_file_loads_as_none() {
		let tmp = TempDir::new().unwrap();
		let manager = StateManager::new(tmp.path().to_path_buf(), "bad");
		tokio::fs::write(manager.state_path(), b"not json").await.unwrap();
		assert!(manager.load().await.is_none());
	}

	#[tokio::test]
	async fn lock_is_exclusive_and_released_on_drop() {
		let tmp = TempDir::new().unwrap();
		let manager = StateManager::new(tmp.path().to_path_buf(), "pair");
		{
			let _lock = manager.lock().await.unwrap();
			assert!(manager.lock().await.is_err());
		}
		assert!(manager.lock().await.is_ok());
	}

	#[test]
	fn pair_handle_is_order_sensitive_and_stable() {
		let a = pair_handle("src", "dst", "", Some(1));
		let b = pair_handle("src", "dst", "", Some(1));
		let c = pair_handle("dst", "src", "", Some(1));
		assert_eq!(a, b);
		assert_ne!(a, c);
	}
}

// vim: ts=4
