//! Action executor: applies one `SyncAction` and updates in-memory state
//!
//! Grounded on `original_source/src/sync/core.py`'s `Syncer.sync()`
//! action-application loop (upload/download/remove branches), generalized
//! to the full action vocabulary including moves and conflict resolution
//! via `crate::compare`.
//!
//! I/O (`execute_io`) is kept separate from state mutation (`StateEffect`)
//! so a concurrent caller can run the provider calls without holding the
//! `src_state`/`dst_state` locks, per SPEC_FULL.md §5, and only take them
//! for the cheap in-memory update once the I/O has actually succeeded.

use crate::compare;
use crate::error::{ConflictError, ProviderError, SyncError};
use crate::plan::SyncAction;
use crate::provider::Provider;
use crate::state::{FileState, StorageState};

/// The state-map mutation produced by a successful `execute_io` call.
#[derive(Debug, Clone)]
pub enum StateEffect {
	None,
	SetSource { path: String, state: FileState },
	SetDestination { path: String, state: FileState },
	RemoveSource { path: String },
	RemoveDestination { path: String },
	RenameSource { old_path: String, new_path: String },
	RenameDestination { old_path: String, new_path: String },
}

impl StateEffect {
	/// Apply the mutation to the live maps. Cheap and non-blocking; callers
	/// should hold whatever lock guards these maps only for this call, not
	/// for the I/O that produced the effect.
	pub fn apply(self, src_state: &mut StorageState, dst_state: &mut StorageState) {
		match self {
			StateEffect::None => {}
			StateEffect::SetSource { path, state } => {
				src_state.insert(path, state);
			}
			StateEffect::SetDestination { path, state } => {
				dst_state.insert(path, state);
			}
			StateEffect::RemoveSource { path } => {
				src_state.remove(&path);
			}
			StateEffect::RemoveDestination { path } => {
				dst_state.remove(&path);
			}
			StateEffect::RenameSource { old_path, new_path } => {
				if let Some(state) = src_state.remove(&old_path) {
					src_state.insert(new_path, state);
				}
			}
			StateEffect::RenameDestination { old_path, new_path } => {
				if let Some(state) = dst_state.remove(&old_path) {
					dst_state.insert(new_path, state);
				}
			}
		}
	}
}

/// The key under which an action's state should be looked up before the
/// I/O runs (the path itself, or a move's `old_path`).
pub fn lookup_key(action: &SyncAction) -> &str {
	match action {
		SyncAction::Upload { path }
		| SyncAction::Download { path }
		| SyncAction::RemoveOnSource { path }
		| SyncAction::RemoveOnDestination { path }
		| SyncAction::ResolveConflict { path }
		| SyncAction::Noop { path } => path,
		SyncAction::MoveOnSource { old_path, .. } | SyncAction::MoveOnDestination { old_path, .. } => old_path,
	}
}

/// Run the provider I/O for `action`. `src_entry`/`dst_entry` are a
/// point-in-time read of the two sides' `FileState` at `lookup_key(action)`,
/// taken by the caller before calling in; this function touches no shared
/// state and performs no locking of its own, so it is safe to run many of
/// these concurrently as long as each worker has its own provider handles.
pub async fn execute_io(
	action: &SyncAction,
	src_provider: &dyn Provider,
	dst_provider: &dyn Provider,
	src_entry: Option<FileState>,
	dst_entry: Option<FileState>,
) -> Result<StateEffect, SyncError> {
	match action {
		SyncAction::Upload { path } => {
			let src = src_entry.ok_or_else(|| ProviderError::NotFound { path: path.clone() })?;
			let stream = src_provider.open_read(&src.path).await?;

			let existing_revision = dst_entry.map(|s| s.revision).unwrap_or_default();
			if !existing_revision.is_empty() {
				dst_provider.update(&src.path, stream, &existing_revision).await?;
			} else {
				dst_provider.write(&src.path, stream).await?;
			}
			let new_state = dst_provider.stat(&src.path).await?;
			Ok(StateEffect::SetDestination { path: path.clone(), state: new_state })
		}

		SyncAction::Download { path } => {
			let dst = dst_entry.ok_or_else(|| ProviderError::NotFound { path: path.clone() })?;
			let stream = dst_provider.open_read(&dst.path).await?;

			let existing_revision = src_entry.map(|s| s.revision).unwrap_or_default();
			if !existing_revision.is_empty() {
				src_provider.update(&dst.path, stream, &existing_revision).await?;
			} else {
				src_provider.write(&dst.path, stream).await?;
			}
			let new_state = src_provider.stat(&dst.path).await?;
			Ok(StateEffect::SetSource { path: path.clone(), state: new_state })
		}

		SyncAction::RemoveOnSource { path } => {
			src_provider.remove_file(path).await?;
			Ok(StateEffect::RemoveSource { path: path.clone() })
		}

		SyncAction::RemoveOnDestination { path } => {
			dst_provider.remove_file(path).await?;
			Ok(StateEffect::RemoveDestination { path: path.clone() })
		}

		SyncAction::MoveOnSource { old_path, new_path } => {
			src_provider.move_file(old_path, new_path).await?;
			Ok(StateEffect::RenameSource { old_path: old_path.clone(), new_path: new_path.clone() })
		}

		SyncAction::MoveOnDestination { old_path, new_path } => {
			dst_provider.move_file(old_path, new_path).await?;
			Ok(StateEffect::RenameDestination { old_path: old_path.clone(), new_path: new_path.clone() })
		}

		SyncAction::ResolveConflict { path } => {
			let src = src_entry.ok_or_else(|| ProviderError::NotFound { path: path.clone() })?;
			let dst = dst_entry.ok_or_else(|| ProviderError::NotFound { path: path.clone() })?;

			if compare::content_equal(src_provider, &src, dst_provider, &dst).await? {
				Ok(StateEffect::None)
			} else {
				Err(SyncError::Conflict(ConflictError::Unresolvable { path: path.clone() }))
			}
		}

		SyncAction::Noop { .. } => Ok(StateEffect::None),
	}
}

/// Apply a single action end to end against plain (unshared) state maps:
/// read the entries it needs, run the I/O, then apply the resulting
/// mutation. Used where no concurrent access to the maps is possible
/// (tests, and any single-threaded caller); `crate::sync`'s worker pool
/// instead calls `execute_io` and `StateEffect::apply` separately so the
/// state lock is only held for the mutation, not the I/O.
pub async fn execute(
	action: &SyncAction,
	src_provider: &dyn Provider,
	dst_provider: &dyn Provider,
	src_state: &mut StorageState,
	dst_state: &mut StorageState,
) -> Result<(), SyncError> {
	let key = lookup_key(action);
	let src_entry = src_state.get(key).cloned();
	let dst_entry = dst_state.get(key).cloned();
	let effect = execute_io(action, src_provider, dst_provider, src_entry, dst_entry).await?;
	effect.apply(src_state, dst_state);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::test_support::MemoryProvider;

	async fn setup() -> (MemoryProvider, MemoryProvider, StorageState, StorageState) {
		let src = MemoryProvider::new("src", true);
		let dst = MemoryProvider::new("dst", true);
		let src_state = StorageState::new();
		let dst_state = StorageState::new();
		(src, dst, src_state, dst_state)
	}

	#[tokio::test]
	async fn upload_copies_content_and_updates_destination_state() {
		let (src, dst, mut src_state, mut dst_state) = setup().await;
		src.put("a.txt", b"hello");
		src_state = src.enumerate(None).await.unwrap();

		execute(
			&SyncAction::Upload { path: "a.txt".to_string() },
			&src,
			&dst,
			&mut src_state,
			&mut dst_state,
		)
		.await
		.unwrap();

		let mut stream = dst.open_read("a.txt").await.unwrap();
		let mut buf = Vec::new();
		tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buf).await.unwrap();
		assert_eq!(buf, b"hello");
		assert!(dst_state.contains("a.txt"));
	}

	#[tokio::test]
	async fn download_copies_content_and_updates_source_state() {
		let (src, dst, mut src_state, mut dst_state) = setup().await;
		dst.put("a.txt", b"world");
		dst_state = dst.enumerate(None).await.unwrap();

		execute(
			&SyncAction::Download { path: "a.txt".to_string() },
			&src,
			&dst,
			&mut src_state,
			&mut dst_state,
		)
		.await
		.unwrap();

		assert!(src_state.contains("a.txt"));
	}

	#[tokio::test]
	async fn remove_on_source_drops_from_state() {
		let (src, dst, mut src_state, mut dst_state) = setup().await;
		src.put("a.txt", b"x");
		src_state = src.enumerate(None).await.unwrap();

		execute(
			&SyncAction::RemoveOnSource { path: "a.txt".to_string() },
			&src,
			&dst,
			&mut src_state,
			&mut dst_state,
		)
		.await
		.unwrap();

		assert!(!src_state.contains("a.txt"));
		assert!(src.stat("a.txt").await.is_err());
	}

	#[tokio::test]
	async fn resolve_conflict_with_equal_content_succeeds() {
		let (src, dst, mut src_state, mut dst_state) = setup().await;
		src.put("a.txt", b"same");
		dst.put("a.txt", b"same");
		src_state = src.enumerate(None).await.unwrap();
		dst_state = dst.enumerate(None).await.unwrap();

		let result = execute(
			&SyncAction::ResolveConflict { path: "a.txt".to_string() },
			&src,
			&dst,
			&mut src_state,
			&mut dst_state,
		)
		.await;
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn resolve_conflict_with_differing_content_fails() {
		let (src, dst, mut src_state, mut dst_state) = setup().await;
		src.put("a.txt", b"one");
		dst.put("a.txt", b"two");
		src_state = src.enumerate(None).await.unwrap();
		dst_state = dst.enumerate(None).await.unwrap();

		let result = execute(
			&SyncAction::ResolveConflict { path: "a.txt".to_string() },
			&src,
			&dst,
			&mut src_state,
			&mut dst_state,
		)
		.await;
		assert!(matches!(result, Err(SyncError::Conflict(_))));
	}

	#[tokio::test]
	async fn move_on_destination_relocates_entry() {
		let (src, dst, mut src_state, mut dst_state) = setup().await;
		dst.put("old.txt", b"x");
		dst_state = dst.enumerate(None).await.unwrap();

		execute(
			&SyncAction::MoveOnDestination { old_path: "old.txt".to_string(), new_path: "new.txt".to_string() },
			&src,
			&dst,
			&mut src_state,
			&mut dst_state,
		)
		.await
		.unwrap();

		assert!(!dst_state.contains("old.txt"));
		assert!(dst_state.contains("new.txt"));
		assert!(dst.stat("new.txt").await.is_ok());
	}

	#[tokio::test]
	async fn execute_io_does_not_touch_state_maps() {
		let (src, dst, mut src_state, _dst_state) = setup().await;
		src.put("a.txt", b"hello");
		src_state = src.enumerate(None).await.unwrap();
		let entry = src_state.get("a.txt").cloned();

		let effect = execute_io(&SyncAction::Upload { path: "a.txt".to_string() }, &src, &dst, entry, None)
			.await
			.unwrap();

		assert!(matches!(effect, StateEffect::SetDestination { .. }));
	}
}

// vim: ts=4
