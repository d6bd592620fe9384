//! Simulated cloud object-store provider (the `D` address type)
//!
//! Stands in for a Dropbox-like backend: case-insensitive, revision-token
//! `update`, and a backend-native-only hash set (forcing the content
//! comparator to fall back to local SHA-256 hashing when paired against a
//! provider that doesn't share that hash type). This is a concrete,
//! in-process implementation of the `Provider` contract rather than a real
//! network client; wiring a real backend behind it is out of scope.

use crate::error::ProviderError;
use crate::hash::{self, HASH_TYPE_BLOCKED};
use crate::provider::{Provider, ReadStream};
use crate::state::{FileState, StorageState};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

#[derive(Clone)]
struct Object {
	content: Vec<u8>,
	revision: u64,
}

/// A simulated object-store backend. The `id` distinguishes accounts/roots
/// that otherwise share the same in-process store.
#[derive(Clone)]
pub struct ObjectStoreProvider {
	id: String,
	objects: Arc<Mutex<BTreeMap<String, Object>>>,
}

impl ObjectStoreProvider {
	pub fn new(id: impl Into<String>) -> Self {
		ObjectStoreProvider { id: id.into(), objects: Arc::new(Mutex::new(BTreeMap::new())) }
	}

	fn key(path: &str) -> String {
		path.to_lowercase()
	}

	async fn hash(content: &[u8]) -> String {
		hash::hash_blocked(std::io::Cursor::new(content.to_vec())).await.unwrap_or_default()
	}
}

#[async_trait]
impl Provider for ObjectStoreProvider {
	fn handle(&self) -> String {
		format!("D:{}", self.id)
	}

	fn is_case_sensitive(&self) -> bool {
		false
	}

	fn supported_hashes(&self) -> Vec<String> {
		vec![HASH_TYPE_BLOCKED.to_string()]
	}

	async fn enumerate(&self, _depth: Option<usize>) -> Result<StorageState, ProviderError> {
		let objects = self.objects.lock().unwrap().clone();
		let mut state = StorageState::new();
		for (path, obj) in objects {
			let digest = Self::hash(&obj.content).await;
			state.insert(
				path.clone(),
				FileState::new(path, digest, HASH_TYPE_BLOCKED).with_revision(obj.revision.to_string()),
			);
		}
		Ok(state)
	}

	async fn stat(&self, path: &str) -> Result<FileState, ProviderError> {
		let key = Self::key(path);
		let obj = {
			let objects = self.objects.lock().unwrap();
			objects.get(&key).cloned().ok_or_else(|| ProviderError::NotFound { path: path.to_string() })?
		};
		let digest = Self::hash(&obj.content).await;
		Ok(FileState::new(path, digest, HASH_TYPE_BLOCKED).with_revision(obj.revision.to_string()))
	}

	async fn open_read(&self, path: &str) -> Result<ReadStream, ProviderError> {
		let key = Self::key(path);
		let objects = self.objects.lock().unwrap();
		let obj = objects.get(&key).ok_or_else(|| ProviderError::NotFound { path: path.to_string() })?;
		Ok(Box::pin(std::io::Cursor::new(obj.content.clone())))
	}

	async fn write(&self, path: &str, mut stream: ReadStream) -> Result<(), ProviderError> {
		let mut buf = Vec::new();
		stream.read_to_end(&mut buf).await?;
		let key = Self::key(path);
		let mut objects = self.objects.lock().unwrap();
		let revision = objects.get(&key).map(|o| o.revision + 1).unwrap_or(0);
		objects.insert(key, Object { content: buf, revision });
		Ok(())
	}

	async fn update(
		&self,
		path: &str,
		stream: ReadStream,
		expected_revision: &str,
	) -> Result<(), ProviderError> {
		let key = Self::key(path);
		{
			let objects = self.objects.lock().unwrap();
			if let Some(obj) = objects.get(&key) {
				if obj.revision.to_string() != expected_revision {
					return Err(ProviderError::Conflict { path: path.to_string() });
				}
			}
		}
		self.write(path, stream).await
	}

	async fn remove_file(&self, path: &str) -> Result<(), ProviderError> {
		let key = Self::key(path);
		let mut objects = self.objects.lock().unwrap();
		objects.remove(&key).map(|_| ()).ok_or_else(|| ProviderError::NotFound { path: path.to_string() })
	}

	async fn move_file(&self, src: &str, dst: &str) -> Result<(), ProviderError> {
		let src_key = Self::key(src);
		let dst_key = Self::key(dst);
		let mut objects = self.objects.lock().unwrap();
		if objects.contains_key(&dst_key) {
			return Err(ProviderError::AlreadyExists { path: dst.to_string() });
		}
		let obj = objects.remove(&src_key).ok_or_else(|| ProviderError::NotFound { path: src.to_string() })?;
		objects.insert(dst_key, obj);
		Ok(())
	}

	async fn compute_hash(&self, path: &str, hash_type: &str) -> Result<String, ProviderError> {
		if hash_type != HASH_TYPE_BLOCKED {
			return Err(ProviderError::UnsupportedHash { hash_type: hash_type.to_string() });
		}
		let key = Self::key(path);
		let content = {
			let objects = self.objects.lock().unwrap();
			objects
				.get(&key)
				.ok_or_else(|| ProviderError::NotFound { path: path.to_string() })?
				.content
				.clone()
		};
		Ok(Self::hash(&content).await)
	}

	async fn clone_provider(&self) -> Result<Box<dyn Provider>, ProviderError> {
		Ok(Box::new(self.clone()))
	}
}


// vim: ts=4
