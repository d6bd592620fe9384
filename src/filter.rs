//! Filter: ordered glob include/exclude list
//!
//! Grounded on the teacher's `src/exclusion/patterns.rs` for per-atom glob
//! compilation via `globset`, wrapped in new ordered-evaluation logic: the
//! teacher's `ExclusionEngine` evaluates an aggregate, unordered `GlobSet`,
//! which can't express the ordered negation-short-circuit semantics this
//! spec calls for.

use crate::state::StorageState;
use globset::{GlobBuilder, GlobMatcher};

struct Atom {
	matcher: GlobMatcher,
	negated: bool,
}

/// A compiled ordered filter.
pub struct Filter {
	atoms: Vec<Atom>,
	default_include: bool,
}

impl Filter {
	/// Parse a comma/semicolon-separated list of glob atoms, each
	/// optionally prefixed `!` for negation. An empty string compiles to
	/// the always-include filter.
	pub fn parse(spec: &str) -> Result<Self, globset::Error> {
		let spec = spec.trim();
		if spec.is_empty() {
			return Ok(Filter { atoms: Vec::new(), default_include: true });
		}

		let mut atoms = Vec::new();
		let mut default_include = true;
		for (i, raw) in spec.split([',', ';']).map(str::trim).filter(|s| !s.is_empty()).enumerate() {
			let (negated, pattern) =
				if let Some(stripped) = raw.strip_prefix('!') { (true, stripped) } else { (false, raw) };
			if i == 0 {
				default_include = negated;
			}
			let matcher = GlobBuilder::new(pattern).case_insensitive(true).build()?.compile_matcher();
			atoms.push(Atom { matcher, negated });
		}
		Ok(Filter { atoms, default_include })
	}

	/// Evaluate the filter against a single relative path. A positive
	/// match sets the verdict to include but keeps scanning (a later
	/// negative atom can still exclude); a negative match returns
	/// exclude immediately.
	pub fn includes(&self, path: &str) -> bool {
		let mut verdict = self.default_include;
		for atom in &self.atoms {
			if atom.matcher.is_match(path) {
				if atom.negated {
					return false;
				}
				verdict = true;
			}
		}
		verdict
	}

	/// Filter a `StorageState` in place, keeping only included paths.
	pub fn apply(&self, state: &StorageState) -> StorageState {
		let mut out = StorageState::new();
		for (key, file_state) in &state.files {
			if self.includes(key) {
				out.insert(key.clone(), file_state.clone());
			}
		}
		out
	}
}


// vim: ts=4
