//! Streaming content hashing
//!
//! Two hash types are recognized throughout the engine:
//!
//! - `sha256` — a plain streaming SHA-256 over the whole file.
//! - `sha256-blocked` — "backend-native" SHA-256: the file is split into
//!   4 MiB blocks, each block is hashed independently, and the concatenation
//!   of the raw block digests is hashed once more. This lets a backend that
//!   already has per-block digests on hand (e.g. a chunked object store)
//!   report a matching hash without re-reading the whole object.

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HASH_TYPE_PLAIN: &str = "sha256";
pub const HASH_TYPE_BLOCKED: &str = "sha256-blocked";

const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Stream-hash `reader` with plain SHA-256, returning a lowercase hex digest.
pub async fn hash_plain(mut reader: impl AsyncRead + Unpin) -> std::io::Result<String> {
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; 64 * 1024];
	loop {
		let n = reader.read(&mut buf).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize()))
}

/// Stream-hash `reader` with the 4 MiB-block backend-native variant.
pub async fn hash_blocked(mut reader: impl AsyncRead + Unpin) -> std::io::Result<String> {
	let mut block_digests = Vec::new();
	let mut buf = vec![0u8; BLOCK_SIZE];
	loop {
		let mut filled = 0;
		while filled < buf.len() {
			let n = reader.read(&mut buf[filled..]).await?;
			if n == 0 {
				break;
			}
			filled += n;
		}
		if filled == 0 {
			break;
		}
		let mut block_hasher = Sha256::new();
		block_hasher.update(&buf[..filled]);
		block_digests.extend_from_slice(&block_hasher.finalize());
		if filled < buf.len() {
			break;
		}
	}
	let mut outer = Sha256::new();
	outer.update(&block_digests);
	Ok(hex::encode(outer.finalize()))
}

/// Hash a value by canonical JSON encoding (sorted keys) followed by
/// SHA-256. Used to derive a stable snapshot filename from
/// `{src, dst, filter, depth}`.
pub fn hash_dict<T: serde::Serialize>(value: &T) -> std::io::Result<String> {
	let canonical = canonical_json(value)?;
	let mut hasher = Sha256::new();
	hasher.update(canonical.as_bytes());
	Ok(hex::encode(hasher.finalize()))
}

fn canonical_json<T: serde::Serialize>(value: &T) -> std::io::Result<String> {
	let json = serde_json::to_value(value)
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
	Ok(sort_keys(&json).to_string())
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
	match value {
		serde_json::Value::Object(map) => {
			let mut sorted = serde_json::Map::new();
			let mut keys: Vec<&String> = map.keys().collect();
			keys.sort();
			for k in keys {
				sorted.insert(k.clone(), sort_keys(&map[k]));
			}
			serde_json::Value::Object(sorted)
		}
		serde_json::Value::Array(items) => {
			serde_json::Value::Array(items.iter().map(sort_keys).collect())
		}
		other => other.clone(),
	}
}


// vim: ts=4
