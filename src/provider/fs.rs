//! Local filesystem provider

use crate::cache::HashCache;
use crate::error::ProviderError;
use crate::hash::{self, HASH_TYPE_PLAIN};
use crate::provider::{Provider, ReadStream};
use crate::state::{FileState, StorageState};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// A `Provider` backed by `tokio::fs`, with hash memoization via
/// `HashCache` keyed by `(mtime, size)`.
pub struct FsProvider {
	root: PathBuf,
	cache: Option<Arc<HashCache>>,
}

impl FsProvider {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		FsProvider { root: root.into(), cache: None }
	}

	pub fn with_cache(root: impl Into<PathBuf>, cache_dir: impl AsRef<Path>) -> std::io::Result<Self> {
		std::fs::create_dir_all(cache_dir.as_ref())?;
		let db_path = cache_dir.as_ref().join("hashes.redb");
		let cache = HashCache::open(&db_path)
			.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
		Ok(FsProvider { root: root.into(), cache: Some(Arc::new(cache)) })
	}

	fn abs(&self, rel: &str) -> PathBuf {
		self.root.join(rel)
	}

	async fn walk(root: &Path, dir: &Path, depth: Option<usize>, level: usize, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
		if let Some(max) = depth {
			if level > max {
				return Ok(());
			}
		}
		let mut entries = fs::read_dir(dir).await?;
		while let Some(entry) = entries.next_entry().await? {
			let file_type = entry.file_type().await?;
			if file_type.is_dir() {
				Box::pin(Self::walk(root, &entry.path(), depth, level + 1, out)).await?;
			} else if file_type.is_file() {
				out.push(entry.path());
			}
		}
		Ok(())
	}

	async fn hash_file(&self, rel: &str, abs: &Path) -> Result<String, ProviderError> {
		let metadata = fs::metadata(abs).await?;
		let size = metadata.len();
		let mtime_secs = metadata
			.modified()
			.ok()
			.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
			.map(|d| d.as_secs() as i64)
			.unwrap_or(0);

		if let Some(cache) = &self.cache {
			if let Ok(Some(digest)) = cache.get(rel, mtime_secs, size, HASH_TYPE_PLAIN) {
				return Ok(digest);
			}
		}

		let file = fs::File::open(abs).await?;
		let digest = hash::hash_plain(file).await?;

		if let Some(cache) = &self.cache {
			let _ = cache.put(rel, mtime_secs, size, HASH_TYPE_PLAIN, &digest);
		}

		Ok(digest)
	}
}

#[async_trait]
impl Provider for FsProvider {
	fn handle(&self) -> String {
		format!("FS:{}", self.root.display())
	}

	fn is_case_sensitive(&self) -> bool {
		true
	}

	fn supported_hashes(&self) -> Vec<String> {
		vec![HASH_TYPE_PLAIN.to_string()]
	}

	async fn enumerate(&self, depth: Option<usize>) -> Result<StorageState, ProviderError> {
		let mut paths = Vec::new();
		Self::walk(&self.root, &self.root, depth, 1, &mut paths).await?;

		let mut state = StorageState::new();
		for abs in paths {
			let rel = abs
				.strip_prefix(&self.root)
				.unwrap_or(&abs)
				.to_string_lossy()
				.replace(std::path::MAIN_SEPARATOR, "/");
			let digest = self.hash_file(&rel, &abs).await?;
			state.insert(rel.clone(), FileState::new(rel, digest, HASH_TYPE_PLAIN));
		}
		Ok(state)
	}

	async fn stat(&self, path: &str) -> Result<FileState, ProviderError> {
		let abs = self.abs(path);
		if !abs.exists() {
			return Err(ProviderError::NotFound { path: path.to_string() });
		}
		let digest = self.hash_file(path, &abs).await?;
		Ok(FileState::new(path, digest, HASH_TYPE_PLAIN))
	}

	async fn open_read(&self, path: &str) -> Result<ReadStream, ProviderError> {
		let abs = self.abs(path);
		let file = fs::File::open(&abs)
			.await
			.map_err(|_| ProviderError::NotFound { path: path.to_string() })?;
		Ok(Box::pin(file))
	}

	async fn write(&self, path: &str, mut stream: ReadStream) -> Result<(), ProviderError> {
		let abs = self.abs(path);
		if let Some(parent) = abs.parent() {
			fs::create_dir_all(parent).await?;
		}
		let tmp = abs.with_extension("bisync-tmp");
		{
			let mut tmp_file = fs::File::create(&tmp).await?;
			tokio::io::copy(&mut stream, &mut tmp_file).await?;
		}
		fs::rename(&tmp, &abs).await?;
		Ok(())
	}

	async fn update(
		&self,
		path: &str,
		stream: ReadStream,
		_expected_revision: &str,
	) -> Result<(), ProviderError> {
		// The local filesystem has no revision concept; fall back to a
		// plain atomic write.
		self.write(path, stream).await
	}

	async fn remove_file(&self, path: &str) -> Result<(), ProviderError> {
		let abs = self.abs(path);
		fs::remove_file(&abs)
			.await
			.map_err(|_| ProviderError::NotFound { path: path.to_string() })
	}

	async fn move_file(&self, src: &str, dst: &str) -> Result<(), ProviderError> {
		let abs_src = self.abs(src);
		let abs_dst = self.abs(dst);
		if !abs_src.exists() {
			return Err(ProviderError::NotFound { path: src.to_string() });
		}
		if abs_dst.exists() {
			return Err(ProviderError::AlreadyExists { path: dst.to_string() });
		}
		if let Some(parent) = abs_dst.parent() {
			fs::create_dir_all(parent).await?;
		}
		fs::rename(&abs_src, &abs_dst).await?;
		Ok(())
	}

	async fn compute_hash(&self, path: &str, hash_type: &str) -> Result<String, ProviderError> {
		if hash_type != HASH_TYPE_PLAIN {
			return Err(ProviderError::UnsupportedHash { hash_type: hash_type.to_string() });
		}
		let abs = self.abs(path);
		self.hash_file(path, &abs).await
	}

	async fn clone_provider(&self) -> Result<Box<dyn Provider>, ProviderError> {
		Ok(Box::new(FsProvider { root: self.root.clone(), cache: self.cache.clone() }))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn enumerate_finds_nested_files() {
		let tmp = TempDir::new().unwrap();
		fs::create_dir_all(tmp.path().join("a/b")).await.unwrap();
		fs::write(tmp.path().join("a/b/c.txt"), b"hi").await.unwrap();
		fs::write(tmp.path().join("top.txt"), b"hello").await.unwrap();

		let provider = FsProvider::new(tmp.path());
		let state = provider.enumerate(None).await.unwrap();
		assert_eq!(state.len(), 2);
		assert!(state.contains("a/b/c.txt"));
		assert!(state.contains("top.txt"));
	}

	#[tokio::test]
	async fn enumerate_honors_depth() {
		let tmp = TempDir::new().unwrap();
		fs::create_dir_all(tmp.path().join("a/b")).await.unwrap();
		fs::write(tmp.path().join("top.txt"), b"z").await.unwrap();
		fs::write(tmp.path().join("a/shallow.txt"), b"x").await.unwrap();
		fs::write(tmp.path().join("a/b/deep.txt"), b"y").await.unwrap();

		let provider = FsProvider::new(tmp.path());

		// depth=1: only files directly under the root.
		let depth1 = provider.enumerate(Some(1)).await.unwrap();
		assert!(depth1.contains("top.txt"));
		assert!(!depth1.contains("a/shallow.txt"));
		assert!(!depth1.contains("a/b/deep.txt"));

		// depth=2: adds one level of nesting, still not the third.
		let depth2 = provider.enumerate(Some(2)).await.unwrap();
		assert!(depth2.contains("top.txt"));
		assert!(depth2.contains("a/shallow.txt"));
		assert!(!depth2.contains("a/b/deep.txt"));
	}

	#[tokio::test]
	async fn write_then_read_round_trips() {
		let tmp = TempDir::new().unwrap();
		let provider = FsProvider::new(tmp.path());
		provider.write("nested/file.txt", Box::pin(std::io::Cursor::new(b"payload".to_vec()))).await.unwrap();

		let mut stream = provider.open_read("nested/file.txt").await.unwrap();
		let mut buf = Vec::new();
		tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buf).await.unwrap();
		assert_eq!(buf, b"payload");
	}

	#[tokio::test]
	async fn move_rejects_existing_destination() {
		let tmp = TempDir::new().unwrap();
		let provider = FsProvider::new(tmp.path());
		provider.write("a.txt", Box::pin(std::io::Cursor::new(b"a".to_vec()))).await.unwrap();
		provider.write("b.txt", Box::pin(std::io::Cursor::new(b"b".to_vec()))).await.unwrap();
		let result = provider.move_file("a.txt", "b.txt").await;
		assert!(matches!(result, Err(ProviderError::AlreadyExists { .. })));
	}

	#[tokio::test]
	async fn remove_missing_file_is_not_found() {
		let tmp = TempDir::new().unwrap();
		let provider = FsProvider::new(tmp.path());
		let result = provider.remove_file("missing.txt").await;
		assert!(matches!(result, Err(ProviderError::NotFound { .. })));
	}

	#[tokio::test]
	async fn cache_hit_reuses_hash_for_unchanged_mtime_and_size() {
		// filetime lets the test pin an exact mtime instead of depending on
		// real wall-clock granularity, which on some filesystems is coarser
		// than a test can wait out.
		let tmp = TempDir::new().unwrap();
		let cache_dir = tmp.path().join(".cache");
		let provider = FsProvider::with_cache(tmp.path(), &cache_dir).unwrap();

		let file_path = tmp.path().join("a.txt");
		fs::write(&file_path, b"same size!").await.unwrap();
		let stamp = filetime::FileTime::from_unix_time(1_700_000_000, 0);
		filetime::set_file_mtime(&file_path, stamp).unwrap();

		let first = provider.stat("a.txt").await.unwrap();

		// Swap in different content of the identical length, but keep the
		// same recorded mtime: the cache should hand back the stale digest
		// rather than rehash, demonstrating the `(mtime, size)` memoization
		// this provider relies on to skip rehashing unchanged files.
		fs::write(&file_path, b"different!").await.unwrap();
		filetime::set_file_mtime(&file_path, stamp).unwrap();

		let second = provider.stat("a.txt").await.unwrap();
		assert_eq!(first.content_hash, second.content_hash);
	}
}

// vim: ts=4
