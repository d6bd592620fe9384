//! Action planner: `(src diff, dst diff) -> SyncAction`
//!
//! New module: the teacher's engine never modeled bidirectional per-file
//! actions as a finite matrix. The action vocabulary is grounded on
//! `original_source/src/sync/core.py`'s `SyncAction` StrEnum, extended with
//! `Moved`/`RaiseError` per SPEC_FULL.md §4.7.

use crate::diff::{Diff, DiffSet};
use crate::error::{PlanError, SyncError};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
	Upload { path: String },
	Download { path: String },
	RemoveOnSource { path: String },
	RemoveOnDestination { path: String },
	MoveOnSource { old_path: String, new_path: String },
	MoveOnDestination { old_path: String, new_path: String },
	ResolveConflict { path: String },
	Noop { path: String },
}

/// Plan actions for every path touched on either side. Returns the ordered
/// action list, or an aggregate `SyncError::ActionFailures`-shaped error if
/// any path is undecidable (the caller is expected to surface all of them
/// at once rather than abort on the first).
pub fn plan(src_diff: &DiffSet, dst_diff: &DiffSet) -> Result<Vec<SyncAction>, SyncError> {
	let mut paths: BTreeSet<&String> = BTreeSet::new();
	paths.extend(src_diff.changes.keys());
	paths.extend(dst_diff.changes.keys());

	let mut actions = Vec::new();
	let mut errors = Vec::new();

	for path in paths {
		let src = src_diff.get(path);
		let dst = dst_diff.get(path);
		match plan_one(path, src, dst) {
			Ok(Some(action)) => actions.push(action),
			Ok(None) => {}
			Err(e) => errors.push((path.clone(), e.to_string())),
		}
	}

	if !errors.is_empty() {
		return Err(SyncError::ActionFailures { failures: errors });
	}

	actions.sort_by_key(sort_key);
	Ok(actions)
}

fn sort_key(action: &SyncAction) -> String {
	match action {
		SyncAction::Upload { path }
		| SyncAction::Download { path }
		| SyncAction::RemoveOnSource { path }
		| SyncAction::RemoveOnDestination { path }
		| SyncAction::ResolveConflict { path }
		| SyncAction::Noop { path } => path.clone(),
		SyncAction::MoveOnSource { old_path, .. } | SyncAction::MoveOnDestination { old_path, .. } => {
			old_path.clone()
		}
	}
}

/// Classify a single path's `(src, dst)` diff pair into an action, per the
/// matrix in SPEC_FULL.md §4.7. `None` means "no change on that side".
fn plan_one(path: &str, src: Option<&Diff>, dst: Option<&Diff>) -> Result<Option<SyncAction>, PlanError> {
	use Diff::*;

	let undecidable = |reason: &str| {
		Err(PlanError::Undecidable { path: path.to_string(), reason: reason.to_string() })
	};

	match (src, dst) {
		(None, None) => Ok(None),

		(None, Some(Added)) => Ok(Some(SyncAction::Download { path: path.to_string() })),
		(None, Some(Removed)) => Ok(Some(SyncAction::RemoveOnSource { path: path.to_string() })),
		(None, Some(Changed)) => Ok(Some(SyncAction::Download { path: path.to_string() })),
		(None, Some(Moved { new_path })) => {
			Ok(Some(SyncAction::MoveOnSource { old_path: path.to_string(), new_path: new_path.clone() }))
		}

		(Some(Added), None) => Ok(Some(SyncAction::Upload { path: path.to_string() })),
		(Some(Added), Some(Added)) => Ok(Some(SyncAction::ResolveConflict { path: path.to_string() })),
		(Some(Added), Some(_)) => undecidable("added on source while destination shows a change to a path source never had a baseline for"),

		(Some(Removed), None) => Ok(Some(SyncAction::RemoveOnDestination { path: path.to_string() })),
		(Some(Removed), Some(Removed)) => Ok(Some(SyncAction::Noop { path: path.to_string() })),
		(Some(Removed), Some(Changed)) => undecidable("removed on source, changed on destination"),
		(Some(Removed), Some(_)) => undecidable("removed on source while destination diverged"),

		(Some(Changed), None) => Ok(Some(SyncAction::Upload { path: path.to_string() })),
		(Some(Changed), Some(Removed)) => undecidable("changed on source, removed on destination"),
		(Some(Changed), Some(Changed)) => Ok(Some(SyncAction::ResolveConflict { path: path.to_string() })),
		(Some(Changed), Some(_)) => undecidable("changed on source while destination diverged"),

		(Some(Moved { new_path }), None) => {
			Ok(Some(SyncAction::MoveOnDestination { old_path: path.to_string(), new_path: new_path.clone() }))
		}
		(Some(Moved { new_path: src_new }), Some(Moved { new_path: dst_new })) => {
			if src_new == dst_new {
				Ok(Some(SyncAction::Noop { path: path.to_string() }))
			} else {
				undecidable(&format!(
					"moved to different locations: source -> {}, destination -> {}",
					src_new, dst_new
				))
			}
		}
		(Some(Moved { .. }), Some(_)) => undecidable("moved on source while destination diverged"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	fn diffset(entries: &[(&str, Diff)]) -> DiffSet {
		let mut changes = BTreeMap::new();
		for (path, diff) in entries {
			changes.insert(path.to_string(), diff.clone());
		}
		DiffSet { changes }
	}

	#[test]
	fn upload_on_source_only_add() {
		let src = diffset(&[("a", Diff::Added)]);
		let dst = diffset(&[]);
		let actions = plan(&src, &dst).unwrap();
		assert_eq!(actions, vec![SyncAction::Upload { path: "a".to_string() }]);
	}

	#[test]
	fn download_on_destination_only_add() {
		let src = diffset(&[]);
		let dst = diffset(&[("a", Diff::Added)]);
		let actions = plan(&src, &dst).unwrap();
		assert_eq!(actions, vec![SyncAction::Download { path: "a".to_string() }]);
	}

	#[test]
	fn mutual_same_target_move_is_noop() {
		let src = diffset(&[("a", Diff::Moved { new_path: "b".to_string() })]);
		let dst = diffset(&[("a", Diff::Moved { new_path: "b".to_string() })]);
		let actions = plan(&src, &dst).unwrap();
		assert_eq!(actions, vec![SyncAction::Noop { path: "a".to_string() }]);
	}

	#[test]
	fn diverging_move_is_undecidable() {
		let src = diffset(&[("a", Diff::Moved { new_path: "b".to_string() })]);
		let dst = diffset(&[("a", Diff::Moved { new_path: "c".to_string() })]);
		let result = plan(&src, &dst);
		assert!(result.is_err());
	}

	#[test]
	fn both_changed_resolves_conflict() {
		let src = diffset(&[("a", Diff::Changed)]);
		let dst = diffset(&[("a", Diff::Changed)]);
		let actions = plan(&src, &dst).unwrap();
		assert_eq!(actions, vec![SyncAction::ResolveConflict { path: "a".to_string() }]);
	}

	#[test]
	fn both_removed_is_noop() {
		let src = diffset(&[("a", Diff::Removed)]);
		let dst = diffset(&[("a", Diff::Removed)]);
		let actions = plan(&src, &dst).unwrap();
		assert_eq!(actions, vec![SyncAction::Noop { path: "a".to_string() }]);
	}

	#[test]
	fn removed_then_changed_is_undecidable() {
		let src = diffset(&[("a", Diff::Removed)]);
		let dst = diffset(&[("a", Diff::Changed)]);
		assert!(plan(&src, &dst).is_err());
	}

	#[test]
	fn errors_are_aggregated_not_short_circuited() {
		let src = diffset(&[
			("a", Diff::Removed),
			("b", Diff::Moved { new_path: "x".to_string() }),
		]);
		let dst = diffset(&[
			("a", Diff::Changed),
			("b", Diff::Moved { new_path: "y".to_string() }),
		]);
		match plan(&src, &dst) {
			Err(SyncError::ActionFailures { failures }) => assert_eq!(failures.len(), 2),
			other => panic!("expected aggregated failures, got {:?}", other),
		}
	}
}

// vim: ts=4
