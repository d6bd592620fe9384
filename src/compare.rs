//! Content comparator: cross-provider "are these files identical?"
//!
//! New module; grounded on the `Provider::supported_hashes` capability
//! discovery (itself modeled on the teacher's capability structs in
//! `src/metadata/capabilities.rs`, not carried into the final tree).

use crate::error::ProviderError;
use crate::hash;
use crate::provider::Provider;
use crate::state::FileState;

/// Decide whether `src` and `dst` already hold identical content, per
/// SPEC_FULL.md §4.8: negotiate a shared hash type, preferring one already
/// on record for either side; fall back to downloading and hashing locally
/// with plain SHA-256 if the providers share no hash type.
pub async fn content_equal(
	src_provider: &dyn Provider,
	src_state: &FileState,
	dst_provider: &dyn Provider,
	dst_state: &FileState,
) -> Result<bool, ProviderError> {
	let shared = pick_hash_type(src_provider, dst_provider, src_state, dst_state);

	let (src_digest, dst_digest) = match shared {
		Some(hash_type) => {
			let src_digest = if src_state.hash_type == hash_type {
				src_state.content_hash.clone()
			} else {
				src_provider.compute_hash(&src_state.path, &hash_type).await?
			};
			let dst_digest = if dst_state.hash_type == hash_type {
				dst_state.content_hash.clone()
			} else {
				dst_provider.compute_hash(&dst_state.path, &hash_type).await?
			};
			(src_digest, dst_digest)
		}
		None => {
			let src_stream = src_provider.open_read(&src_state.path).await?;
			let dst_stream = dst_provider.open_read(&dst_state.path).await?;
			let src_digest = hash::hash_plain(src_stream).await?;
			let dst_digest = hash::hash_plain(dst_stream).await?;
			(src_digest, dst_digest)
		}
	};

	Ok(src_digest == dst_digest)
}

fn pick_hash_type(
	src_provider: &dyn Provider,
	dst_provider: &dyn Provider,
	src_state: &FileState,
	dst_state: &FileState,
) -> Option<String> {
	let src_supported = src_provider.supported_hashes();
	let dst_supported = dst_provider.supported_hashes();

	let mut candidates: Vec<&String> =
		src_supported.iter().filter(|h| dst_supported.contains(h)).collect();
	if candidates.is_empty() {
		return None;
	}
	candidates.sort();

	let score = |hash_type: &str| -> i32 {
		let mut s = 0;
		if src_state.hash_type == hash_type {
			s += 1;
		}
		if dst_state.hash_type == hash_type {
			s += 1;
		}
		s
	};

	candidates.into_iter().max_by_key(|h| (score(h), std::cmp::Reverse((*h).clone()))).cloned()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::test_support::MemoryProvider;

	#[tokio::test]
	async fn identical_content_compares_equal() {
		let src = MemoryProvider::new("src", true);
		let dst = MemoryProvider::new("dst", true);
		src.put("a.txt", b"same content");
		dst.put("a.txt", b"same content");

		let src_state = src.stat("a.txt").await.unwrap();
		let dst_state = dst.stat("a.txt").await.unwrap();

		assert!(content_equal(&src, &src_state, &dst, &dst_state).await.unwrap());
	}

	#[tokio::test]
	async fn different_content_compares_unequal() {
		let src = MemoryProvider::new("src", true);
		let dst = MemoryProvider::new("dst", true);
		src.put("a.txt", b"one");
		dst.put("a.txt", b"two");

		let src_state = src.stat("a.txt").await.unwrap();
		let dst_state = dst.stat("a.txt").await.unwrap();

		assert!(!content_equal(&src, &src_state, &dst, &dst_state).await.unwrap());
	}

	#[tokio::test]
	async fn prefers_hash_type_already_on_record() {
		let src = MemoryProvider::new("src", true);
		let dst = MemoryProvider::new("dst", true);
		src.put("a.txt", b"payload");
		dst.put("a.txt", b"payload");

		let src_state = src.stat("a.txt").await.unwrap();
		let dst_state = dst.stat("a.txt").await.unwrap();
		assert_eq!(src_state.hash_type, crate::hash::HASH_TYPE_PLAIN);

		assert!(content_equal(&src, &src_state, &dst, &dst_state).await.unwrap());
	}
}

// vim: ts=4
