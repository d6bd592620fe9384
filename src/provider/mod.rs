//! Provider contract: the capability set a storage backend must expose.

pub mod address;
pub mod fs;
pub mod object_store;
pub mod sftp;

use crate::error::ProviderError;
use crate::state::{FileState, StorageState};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A stream of bytes read from a provider. Boxed so the trait stays
/// object-safe across heterogeneous backend implementations.
pub type ReadStream = std::pin::Pin<Box<dyn AsyncRead + Send + Unpin>>;
/// A stream of bytes written to a provider.
pub type WriteStream = std::pin::Pin<Box<dyn AsyncWrite + Send + Unpin>>;

/// A pluggable storage backend. Implementations must be safe to use from a
/// single task at a time; the executor obtains one `clone()` per worker
/// rather than sharing an instance across concurrent tasks.
#[async_trait]
pub trait Provider: Send + Sync {
	/// Stable identifier encoding this provider's identity and root,
	/// used to name the persisted snapshot and per-provider cache.
	fn handle(&self) -> String;

	/// Human-readable identifier for logs.
	fn label(&self) -> String {
		self.handle()
	}

	/// Whether this backend folds case when comparing paths.
	fn is_case_sensitive(&self) -> bool;

	/// Hash types this backend can produce without a full local rehash.
	fn supported_hashes(&self) -> Vec<String>;

	/// Enumerate all regular files up to `depth` (unlimited if `None`).
	async fn enumerate(&self, depth: Option<usize>) -> Result<StorageState, ProviderError>;

	/// Stat a single path.
	async fn stat(&self, path: &str) -> Result<FileState, ProviderError>;

	/// Open a file for reading.
	async fn open_read(&self, path: &str) -> Result<ReadStream, ProviderError>;

	/// Write a file, replacing it atomically. Parent directories are
	/// created as needed.
	async fn write(&self, path: &str, stream: ReadStream) -> Result<(), ProviderError>;

	/// Compare-and-swap update guarded by `expected_revision`. Backends that
	/// don't support optimistic concurrency should fall back to `write`.
	async fn update(
		&self,
		path: &str,
		stream: ReadStream,
		expected_revision: &str,
	) -> Result<(), ProviderError>;

	/// Remove a file.
	async fn remove_file(&self, path: &str) -> Result<(), ProviderError>;

	/// Move/rename a file. `dst` must not already exist.
	async fn move_file(&self, src: &str, dst: &str) -> Result<(), ProviderError>;

	/// Compute a digest of the given type for `path`.
	async fn compute_hash(&self, path: &str, hash_type: &str) -> Result<String, ProviderError>;

	/// Produce an independent clone with the same configuration, suitable
	/// for handing to a separate worker task. Async because backends whose
	/// "clone" is really a fresh connection (e.g. a spawned subprocess) need
	/// to do I/O to stand one up.
	async fn clone_provider(&self) -> Result<Box<dyn Provider>, ProviderError>;
}


// vim: ts=4
