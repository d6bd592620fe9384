//! Provider-address grammar: `<type> key=value [key=value ...]`
//!
//! Three types are recognized: `FS` (local filesystem), `D` (simulated
//! cloud object store), `SFTP` (subprocess-based remote transfer). Grounded
//! on the teacher's `ConnectionType::detect` "classify then dispatch" shape
//! in `connection.rs`, rewritten for this spec's explicit typed-key-value
//! grammar rather than a colon-delimited `host:path` form.

use crate::error::SyncError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderAddress {
	Fs { root: String, cache_dir: String },
	ObjectStore { root: String, id: String, access_token: Option<String> },
	Sftp { host: String, user: String, root: String, key: Option<String>, pass: Option<String>, port: u16 },
}

/// Parse a provider-address string, e.g. `FS root=/data/a` or
/// `SFTP host=example.com user=alice root=/home/alice/data port=2222`.
pub fn parse(address: &str) -> Result<ProviderAddress, SyncError> {
	let mut parts = address.split_whitespace();
	let kind = parts.next().ok_or_else(|| SyncError::InvalidConfig {
		message: "empty provider address".to_string(),
	})?;

	let mut options: BTreeMap<String, String> = BTreeMap::new();
	for part in parts {
		let (key, value) = part.split_once('=').ok_or_else(|| SyncError::InvalidConfig {
			message: format!("malformed option '{}', expected key=value", part),
		})?;
		options.insert(key.to_string(), value.to_string());
	}

	let kind_upper = kind.to_ascii_uppercase();
	let known_keys: &[&str] = match kind_upper.as_str() {
		"FS" => &["root", "cache_dir"],
		"D" => &["root", "id", "access_token", "refresh_token", "app_key", "app_secret"],
		"SFTP" => &["host", "user", "root", "key", "pass", "port"],
		_ => &[],
	};
	for key in options.keys() {
		if !known_keys.contains(&key.as_str()) {
			return Err(SyncError::InvalidConfig {
				message: format!("unrecognized option '{}' for provider type '{}'", key, kind_upper),
			});
		}
	}

	match kind_upper.as_str() {
		"FS" => {
			let root = require(&options, "root")?;
			let cache_dir = options.get("cache_dir").cloned().unwrap_or_else(|| ".cache".to_string());
			Ok(ProviderAddress::Fs { root, cache_dir })
		}
		"D" => {
			let root = require(&options, "root")?;
			let id = require(&options, "id")?;
			let access_token = options.get("access_token").cloned();
			if access_token.is_none()
				&& (options.get("refresh_token").is_none()
					|| options.get("app_key").is_none()
					|| options.get("app_secret").is_none())
			{
				return Err(SyncError::InvalidConfig {
					message: "D provider needs access_token, or refresh_token+app_key+app_secret"
						.to_string(),
				});
			}
			Ok(ProviderAddress::ObjectStore { root, id, access_token })
		}
		"SFTP" => {
			let host = require(&options, "host")?;
			let user = require(&options, "user")?;
			let root = require(&options, "root")?;
			let key = options.get("key").cloned();
			let pass = options.get("pass").cloned();
			let port = match options.get("port") {
				Some(p) => p.parse().map_err(|_| SyncError::InvalidConfig {
					message: format!("invalid port '{}'", p),
				})?,
				None => 22,
			};
			Ok(ProviderAddress::Sftp { host, user, root, key, pass, port })
		}
		other => Err(SyncError::InvalidConfig {
			message: format!("unknown provider type '{}', expected FS, D, or SFTP", other),
		}),
	}
}

fn require(options: &BTreeMap<String, String>, key: &str) -> Result<String, SyncError> {
	options
		.get(key)
		.cloned()
		.ok_or_else(|| SyncError::InvalidConfig { message: format!("missing required option '{}'", key) })
}


// vim: ts=4
