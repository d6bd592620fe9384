//! Diff engine: classify per-side changes and detect moves
//!
//! Grounded on `original_source/src/sync/core.py`'s `StorageStateDiff.compute`
//! for the basic added/removed/changed pass, and on
//! `original_source/src/sync/diff.py`'s bucket-by-hash idea for move
//! detection. The pairing algorithm itself is new: the original bucketer
//! only handles buckets of exactly two entries; this one pairs arbitrarily
//! large buckets greedily by minimum filename edit distance.

use crate::logging::warn;
use crate::state::StorageState;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff {
	Added,
	Removed,
	Changed,
	Moved { new_path: String },
}

/// Per-path classification of one side's current state against its
/// baseline snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiffSet {
	pub changes: BTreeMap<String, Diff>,
}

impl DiffSet {
	pub fn get(&self, path: &str) -> Option<&Diff> {
		self.changes.get(path)
	}
}

/// Compute `current` vs. `baseline`, including the move-detection pass.
pub fn compute(current: &StorageState, baseline: &StorageState) -> DiffSet {
	let mut changes = BTreeMap::new();
	let mut added: Vec<String> = Vec::new();
	let mut removed: Vec<String> = Vec::new();

	for (path, state) in &current.files {
		match baseline.files.get(path) {
			None => added.push(path.clone()),
			Some(base_state) => {
				if state.content_hash != base_state.content_hash {
					changes.insert(path.clone(), Diff::Changed);
				}
			}
		}
	}

	for path in baseline.files.keys() {
		if !current.files.contains_key(path) {
			removed.push(path.clone());
		}
	}

	detect_moves(&mut added, &mut removed, current, baseline, &mut changes);

	for path in added {
		changes.insert(path, Diff::Added);
	}
	for path in removed {
		changes.insert(path, Diff::Removed);
	}

	DiffSet { changes }
}

fn detect_moves(
	added: &mut Vec<String>,
	removed: &mut Vec<String>,
	current: &StorageState,
	baseline: &StorageState,
	changes: &mut BTreeMap<String, Diff>,
) {
	// Bucket by content hash.
	let mut added_buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for path in added.iter() {
		if let Some(state) = current.files.get(path) {
			added_buckets.entry(state.content_hash.clone()).or_default().push(path.clone());
		}
	}
	let mut removed_buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for path in removed.iter() {
		if let Some(state) = baseline.files.get(path) {
			removed_buckets.entry(state.content_hash.clone()).or_default().push(path.clone());
		}
	}

	let mut paired_added = std::collections::BTreeSet::new();
	let mut paired_removed = std::collections::BTreeSet::new();

	for (hash, removed_paths) in removed_buckets.iter_mut() {
		let Some(added_paths) = added_buckets.get_mut(hash) else { continue };
		if added_paths.len() != removed_paths.len() {
			warn!(
				hash = %hash,
				added = added_paths.len(),
				removed = removed_paths.len(),
				"unbalanced move-candidate bucket, leaving entries as add/remove"
			);
			continue;
		}

		removed_paths.sort();
		let mut remaining_added = added_paths.clone();

		for removed_path in removed_paths.iter() {
			if remaining_added.is_empty() {
				break;
			}
			let removed_name = filename(removed_path);
			let mut best_idx = 0;
			let mut best_dist = usize::MAX;
			for (idx, candidate) in remaining_added.iter().enumerate() {
				let dist = levenshtein(removed_name, filename(candidate));
				if dist < best_dist || (dist == best_dist && *candidate < remaining_added[best_idx]) {
					best_dist = dist;
					best_idx = idx;
				}
			}
			let new_path = remaining_added.remove(best_idx);
			changes.insert(removed_path.clone(), Diff::Moved { new_path: new_path.clone() });
			paired_removed.insert(removed_path.clone());
			paired_added.insert(new_path);
		}
	}

	added.retain(|p| !paired_added.contains(p));
	removed.retain(|p| !paired_removed.contains(p));
}

fn filename(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

fn levenshtein(a: &str, b: &str) -> usize {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();
	let mut row: Vec<usize> = (0..=b.len()).collect();

	for i in 1..=a.len() {
		let mut prev_diag = row[0];
		row[0] = i;
		for j in 1..=b.len() {
			let tmp = row[j];
			row[j] = if a[i - 1] == b[j - 1] {
				prev_diag
			} else {
				1 + prev_diag.min(row[j]).min(row[j - 1])
			};
			prev_diag = tmp;
		}
	}
	row[b.len()]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::FileState;

	fn state(entries: &[(&str, &str)]) -> StorageState {
		let mut s = StorageState::new();
		for (path, hash) in entries {
			s.insert(*path, FileState::new(*path, *hash, "sha256"));
		}
		s
	}

	#[test]
	fn diff_of_identical_states_is_empty() {
		let s = state(&[("a", "h1"), ("b", "h2")]);
		let diff = compute(&s, &s);
		assert!(diff.changes.is_empty());
	}

	#[test]
	fn detects_added_removed_changed() {
		let baseline = state(&[("keep", "h1"), ("gone", "h2"), ("changed", "h3")]);
		let current = state(&[("keep", "h1"), ("changed", "h3b"), ("new", "h4")]);
		let diff = compute(&current, &baseline);
		assert_eq!(diff.get("new"), Some(&Diff::Added));
		assert_eq!(diff.get("gone"), Some(&Diff::Removed));
		assert_eq!(diff.get("changed"), Some(&Diff::Changed));
		assert!(diff.get("keep").is_none());
	}

	#[test]
	fn detects_single_move() {
		let baseline = state(&[("foo/file-is-named-like-this", "samehash")]);
		let current = state(&[("bar/file_is_named_like_this", "samehash")]);
		let diff = compute(&current, &baseline);
		assert_eq!(
			diff.get("foo/file-is-named-like-this"),
			Some(&Diff::Moved { new_path: "bar/file_is_named_like_this".to_string() })
		);
		assert_eq!(diff.changes.len(), 1);
	}

	#[test]
	fn unbalanced_bucket_falls_back_to_add_remove() {
		let baseline = state(&[("a", "h"), ("b", "h")]);
		let current = state(&[("c", "h")]);
		let diff = compute(&current, &baseline);
		assert_eq!(diff.get("c"), Some(&Diff::Added));
		assert_eq!(diff.get("a"), Some(&Diff::Removed));
		assert_eq!(diff.get("b"), Some(&Diff::Removed));
	}

	#[test]
	fn many_to_many_bucket_pairs_by_filename_distance() {
		let baseline = state(&[("x/aaa", "h"), ("x/zzz", "h")]);
		let current = state(&[("y/aab", "h"), ("y/zzy", "h")]);
		let diff = compute(&current, &baseline);
		assert_eq!(diff.get("x/aaa"), Some(&Diff::Moved { new_path: "y/aab".to_string() }));
		assert_eq!(diff.get("x/zzz"), Some(&Diff::Moved { new_path: "y/zzy".to_string() }));
	}

	#[test]
	fn levenshtein_basic_cases() {
		assert_eq!(levenshtein("", ""), 0);
		assert_eq!(levenshtein("abc", "abc"), 0);
		assert_eq!(levenshtein("abc", "abd"), 1);
		assert_eq!(levenshtein("kitten", "sitting"), 3);
	}
}

// vim: ts=4
