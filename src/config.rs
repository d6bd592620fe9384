//! Unified configuration
//!
//! A single `Config` struct following the teacher's consolidated
//! `src/config.rs` shape and precedence chain (defaults -> file -> env ->
//! CLI), trimmed to the settings this engine actually has. Metadata
//! preservation, symlink/hardlink handling, and compression are Non-goals
//! and have no configuration surface here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
	/// Directory holding persisted sync-pair snapshots.
	pub state_dir: PathBuf,

	/// Glob filter spec applied to both sides before diffing (see
	/// `crate::filter`).
	pub filter: String,

	/// Maximum enumeration depth (`None` = unlimited).
	pub depth: Option<usize>,

	/// Worker pool size for the action executor.
	pub threads: usize,

	/// Plan without touching storage or persisted state.
	pub dry_run: bool,

	/// `tracing` filter directive, honored via `RUST_LOG` if unset here.
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			state_dir: PathBuf::from(".state"),
			filter: String::new(),
			depth: None,
			threads: 4,
			dry_run: false,
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Load from a TOML file, falling back to defaults for any field not
	/// present. A missing file is not an error - it simply yields
	/// `Config::default()`.
	pub fn load_from_file(path: &std::path::Path) -> Result<Config, crate::error::SyncError> {
		if !path.exists() {
			return Ok(Config::default());
		}
		let contents = std::fs::read_to_string(path)?;
		toml::from_str(&contents)
			.map_err(|e| crate::error::SyncError::InvalidConfig { message: e.to_string() })
	}

	/// Overlay environment variables (`BISYNC_*`) on top of this config.
	pub fn apply_env(&mut self) {
		if let Ok(v) = std::env::var("BISYNC_STATE_DIR") {
			self.state_dir = PathBuf::from(v);
		}
		if let Ok(v) = std::env::var("BISYNC_FILTER") {
			self.filter = v;
		}
		if let Ok(v) = std::env::var("BISYNC_THREADS") {
			if let Ok(n) = v.parse() {
				self.threads = n;
			}
		}
		if let Ok(v) = std::env::var("BISYNC_LOG_LEVEL") {
			self.log_level = v;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let config = Config::default();
		assert_eq!(config.threads, 4);
		assert!(!config.dry_run);
		assert_eq!(config.depth, None);
	}

	#[test]
	fn serde_round_trips() {
		let config = Config::default();
		let json = serde_json::to_string(&config).unwrap();
		let back: Config = serde_json::from_str(&json).unwrap();
		assert_eq!(config.threads, back.threads);
	}

	#[test]
	fn missing_file_yields_defaults() {
		let config = Config::load_from_file(std::path::Path::new("/nonexistent/path.toml")).unwrap();
		assert_eq!(config.threads, 4);
	}
}

// vim: ts=4
