//! End-to-end tests driving the public `SyncBuilder` API against real
//! `FsProvider` instances backed by temp directories, rather than the
//! in-memory test double used by the unit tests in `src/sync.rs`.

use bisync::provider::fs::FsProvider;
use bisync::sync::SyncBuilder;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &[u8]) {
	let path = dir.join(rel);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, content).unwrap();
}

fn read(dir: &Path, rel: &str) -> Vec<u8> {
	fs::read(dir.join(rel)).unwrap()
}

#[tokio::test]
async fn new_files_propagate_both_ways_on_first_run() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let state_dir = TempDir::new().unwrap();

	write(src_dir.path(), "only_on_source.txt", b"from source");
	write(dst_dir.path(), "only_on_destination.txt", b"from destination");

	let result = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();

	assert_eq!(result.uploaded, 1);
	assert_eq!(result.downloaded, 1);
	assert_eq!(read(dst_dir.path(), "only_on_source.txt"), b"from source");
	assert_eq!(read(src_dir.path(), "only_on_destination.txt"), b"from destination");
}

#[tokio::test]
async fn repeated_runs_converge_to_a_fixpoint() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let state_dir = TempDir::new().unwrap();

	write(src_dir.path(), "a.txt", b"hello");

	let first = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();
	assert_eq!(first.uploaded, 1);

	let second = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();
	assert_eq!(second.actions.len(), 0, "a no-op second run should plan nothing");
}

#[tokio::test]
async fn deletion_on_one_side_removes_on_the_other() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let state_dir = TempDir::new().unwrap();

	write(src_dir.path(), "keep.txt", b"keep");
	write(src_dir.path(), "doomed.txt", b"bye");

	SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();
	assert!(dst_dir.path().join("doomed.txt").exists());

	fs::remove_file(src_dir.path().join("doomed.txt")).unwrap();

	let result = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();

	assert_eq!(result.removed_on_destination, 1);
	assert!(!dst_dir.path().join("doomed.txt").exists());
	assert!(dst_dir.path().join("keep.txt").exists());
}

#[tokio::test]
async fn rename_on_source_is_detected_as_a_move() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let state_dir = TempDir::new().unwrap();

	write(src_dir.path(), "original.txt", b"this content is long enough to be a confident move match");

	SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();

	fs::rename(src_dir.path().join("original.txt"), src_dir.path().join("renamed.txt")).unwrap();

	let result = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.sync()
		.await
		.unwrap();

	assert_eq!(result.moved_on_destination, 1);
	assert!(dst_dir.path().join("renamed.txt").exists());
	assert!(!dst_dir.path().join("original.txt").exists());
}

#[tokio::test]
async fn dry_run_plans_without_touching_either_provider() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let state_dir = TempDir::new().unwrap();

	write(src_dir.path(), "pending.txt", b"not yet synced");

	let result = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.dry_run(true)
		.sync()
		.await
		.unwrap();

	assert_eq!(result.uploaded, 1);
	assert!(!dst_dir.path().join("pending.txt").exists());
}

#[tokio::test]
async fn filter_excludes_matching_paths_from_the_sync() {
	let src_dir = TempDir::new().unwrap();
	let dst_dir = TempDir::new().unwrap();
	let state_dir = TempDir::new().unwrap();

	write(src_dir.path(), "keep.txt", b"keep");
	write(src_dir.path(), "secret.env", b"password=hunter2");

	let result = SyncBuilder::new()
		.source(Box::new(FsProvider::new(src_dir.path())))
		.destination(Box::new(FsProvider::new(dst_dir.path())))
		.state_dir(state_dir.path())
		.filter("*,!*.env")
		.sync()
		.await
		.unwrap();

	assert_eq!(result.uploaded, 1);
	assert!(dst_dir.path().join("keep.txt").exists());
	assert!(!dst_dir.path().join("secret.env").exists());
}
