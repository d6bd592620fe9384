//! Error types for sync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Helper to reduce `Box::new()` boilerplate when wrapping errors into a
/// variant field.
#[inline]
pub fn boxed_error<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
	Box::new(e)
}

/// Unified error type for sync operations.
///
/// Carries both direct variants for common failures and nested variants for
/// domain-specific errors raised deeper in the engine.
#[derive(Debug)]
pub enum SyncError {
	/// A path expected to exist on a provider was not found.
	NotFound { path: String },

	/// Destination of a move (or a write with create-only semantics) is
	/// already occupied.
	AlreadyExists { path: String },

	/// Two distinct source paths normalized to the same key.
	NormalizationCollision { path_a: String, path_b: String, normalized: String },

	/// The planner could not decide an action for a path.
	Undecidable { path: String, reason: String },

	/// Aggregated failures collected while executing actions.
	ActionFailures { failures: Vec<(String, String)> },

	/// Post-run correctness check found the two sides diverged.
	CorrectnessCheckFailed { only_on_source: Vec<String>, only_on_destination: Vec<String> },

	/// Run was cancelled by the caller.
	Cancelled,

	/// I/O error.
	Io(io::Error),

	/// Invalid configuration.
	InvalidConfig { message: String },

	/// Provider error (nested).
	Provider(ProviderError),

	/// State persistence error (nested).
	State(StateError),

	/// Plan error (nested).
	Plan(PlanError),

	/// Unresolved content conflict (nested).
	Conflict(ConflictError),

	/// Generic error message.
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::NotFound { path } => write!(f, "not found: {}", path),
			SyncError::AlreadyExists { path } => write!(f, "already exists: {}", path),
			SyncError::NormalizationCollision { path_a, path_b, normalized } => write!(
				f,
				"paths '{}' and '{}' both normalize to '{}'",
				path_a, path_b, normalized
			),
			SyncError::Undecidable { path, reason } => {
				write!(f, "cannot plan action for '{}': {}", path, reason)
			}
			SyncError::ActionFailures { failures } => {
				write!(f, "{} action(s) failed:", failures.len())?;
				for (path, message) in failures {
					write!(f, "\n  {}: {}", path, message)?;
				}
				Ok(())
			}
			SyncError::CorrectnessCheckFailed { only_on_source, only_on_destination } => write!(
				f,
				"post-sync check failed: {} path(s) only on source, {} only on destination",
				only_on_source.len(),
				only_on_destination.len()
			),
			SyncError::Cancelled => write!(f, "sync cancelled"),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => write!(f, "invalid configuration: {}", message),
			SyncError::Provider(e) => write!(f, "provider error: {}", e),
			SyncError::State(e) => write!(f, "state error: {}", e),
			SyncError::Plan(e) => write!(f, "plan error: {}", e),
			SyncError::Conflict(e) => write!(f, "conflict error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ProviderError> for SyncError {
	fn from(e: ProviderError) -> Self {
		SyncError::Provider(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

impl From<PlanError> for SyncError {
	fn from(e: PlanError) -> Self {
		SyncError::Plan(e)
	}
}

impl From<ConflictError> for SyncError {
	fn from(e: ConflictError) -> Self {
		SyncError::Conflict(e)
	}
}

/// Errors raised by a [`crate::provider::Provider`] implementation.
#[derive(Debug)]
pub enum ProviderError {
	NotFound { path: String },
	AlreadyExists { path: String },
	Conflict { path: String },
	ConnectionFailed { handle: String, source: Box<dyn Error + Send + Sync> },
	SpawnFailed { cmd: String, source: io::Error },
	ProtocolError { message: String },
	UnsupportedHash { hash_type: String },
	Io(io::Error),
}

impl fmt::Display for ProviderError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProviderError::NotFound { path } => write!(f, "not found: {}", path),
			ProviderError::AlreadyExists { path } => write!(f, "already exists: {}", path),
			ProviderError::Conflict { path } => write!(f, "revision conflict on {}", path),
			ProviderError::ConnectionFailed { handle, source } => {
				write!(f, "failed to connect to {}: {}", handle, source)
			}
			ProviderError::SpawnFailed { cmd, source } => {
				write!(f, "failed to spawn '{}': {}", cmd, source)
			}
			ProviderError::ProtocolError { message } => write!(f, "protocol error: {}", message),
			ProviderError::UnsupportedHash { hash_type } => {
				write!(f, "hash type not supported: {}", hash_type)
			}
			ProviderError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl Error for ProviderError {}

impl From<io::Error> for ProviderError {
	fn from(e: io::Error) -> Self {
		ProviderError::Io(e)
	}
}

/// State persistence errors.
#[derive(Debug)]
pub enum StateError {
	LoadFailed { source: Box<dyn Error + Send + Sync> },
	SaveFailed { source: Box<dyn Error + Send + Sync> },
	LockFailed { message: String },
	Corrupted { message: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { source } => write!(f, "failed to load state: {}", source),
			StateError::SaveFailed { source } => write!(f, "failed to save state: {}", source),
			StateError::LockFailed { message } => write!(f, "lock failed: {}", message),
			StateError::Corrupted { message } => write!(f, "state corrupted: {}", message),
		}
	}
}

impl Error for StateError {}

/// Planning errors.
#[derive(Debug)]
pub enum PlanError {
	Undecidable { path: String, reason: String },
}

impl fmt::Display for PlanError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlanError::Undecidable { path, reason } => {
				write!(f, "cannot plan action for '{}': {}", path, reason)
			}
		}
	}
}

impl Error for PlanError {}

/// Conflict resolution errors.
#[derive(Debug)]
pub enum ConflictError {
	Unresolvable { path: String },
}

impl fmt::Display for ConflictError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConflictError::Unresolvable { path } => {
				write!(f, "cannot resolve conflict on {}: content differs on both sides", path)
			}
		}
	}
}

impl Error for ConflictError {}

// vim: ts=4
