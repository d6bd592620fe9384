//! Syncer orchestration: builder API plus the end-to-end run loop
//!
//! Grounded on the teacher's `src/sync.rs` `SyncBuilder` (builder shape and
//! method names kept where they still apply) and
//! `original_source/src/sync/core.py`'s `Syncer.sync()` top-level
//! load-diff-plan-execute-persist flow.

use crate::diff;
use crate::error::SyncError;
use crate::exec;
use crate::filter::Filter;
use crate::logging::{info, warn};
use crate::path::normalize;
use crate::plan::{self, SyncAction};
use crate::provider::Provider;
use crate::state::{pair_handle, StateManager, StorageState, SyncPairState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Per-run outcome summary.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
	pub uploaded: usize,
	pub downloaded: usize,
	pub removed_on_source: usize,
	pub removed_on_destination: usize,
	pub moved_on_source: usize,
	pub moved_on_destination: usize,
	pub conflicts_resolved: usize,
	pub noops: usize,
	/// The planned (or, for a non-dry run, executed) actions, for callers
	/// that want the detail behind the summary counts.
	pub actions: Vec<SyncAction>,
}

impl SyncResult {
	fn record(&mut self, action: &SyncAction) {
		match action {
			SyncAction::Upload { .. } => self.uploaded += 1,
			SyncAction::Download { .. } => self.downloaded += 1,
			SyncAction::RemoveOnSource { .. } => self.removed_on_source += 1,
			SyncAction::RemoveOnDestination { .. } => self.removed_on_destination += 1,
			SyncAction::MoveOnSource { .. } => self.moved_on_source += 1,
			SyncAction::MoveOnDestination { .. } => self.moved_on_destination += 1,
			SyncAction::ResolveConflict { .. } => self.conflicts_resolved += 1,
			SyncAction::Noop { .. } => self.noops += 1,
		}
	}
}

/// Fluent configuration for a sync run between exactly two providers.
pub struct SyncBuilder {
	source: Option<Box<dyn Provider>>,
	destination: Option<Box<dyn Provider>>,
	state_dir: PathBuf,
	filter: String,
	depth: Option<usize>,
	threads: usize,
	dry_run: bool,
	cancel: Arc<AtomicBool>,
}

impl SyncBuilder {
	pub fn new() -> Self {
		SyncBuilder {
			source: None,
			destination: None,
			state_dir: PathBuf::from(".state"),
			filter: String::new(),
			depth: None,
			threads: 4,
			dry_run: false,
			cancel: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn source(mut self, provider: Box<dyn Provider>) -> Self {
		self.source = Some(provider);
		self
	}

	pub fn destination(mut self, provider: Box<dyn Provider>) -> Self {
		self.destination = Some(provider);
		self
	}

	pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
		self.state_dir = path.into();
		self
	}

	pub fn filter(mut self, spec: impl Into<String>) -> Self {
		self.filter = spec.into();
		self
	}

	pub fn depth(mut self, depth: usize) -> Self {
		self.depth = Some(depth);
		self
	}

	pub fn threads(mut self, threads: usize) -> Self {
		self.threads = threads.max(1);
		self
	}

	pub fn dry_run(mut self, enabled: bool) -> Self {
		self.dry_run = enabled;
		self
	}

	/// Share a cancellation flag with the caller. Setting it (e.g. from a
	/// Ctrl-C handler) stops the worker pool from picking up further
	/// actions; in-flight actions finish and the run returns
	/// `SyncError::Cancelled` without persisting the snapshot.
	pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
		self.cancel = cancel;
		self
	}

	/// Run the sync to completion.
	pub async fn sync(self) -> Result<SyncResult, SyncError> {
		let source = self.source.ok_or_else(|| SyncError::InvalidConfig {
			message: "source provider is required".to_string(),
		})?;
		let destination = self.destination.ok_or_else(|| SyncError::InvalidConfig {
			message: "destination provider is required".to_string(),
		})?;

		run_cancellable(
			source,
			destination,
			&self.state_dir,
			&self.filter,
			self.depth,
			self.threads,
			self.dry_run,
			self.cancel,
		)
		.await
	}
}

impl Default for SyncBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Run one sync between `source` and `destination`, per SPEC_FULL.md §4.10.
pub async fn run(
	source: Box<dyn Provider>,
	destination: Box<dyn Provider>,
	state_dir: &std::path::Path,
	filter_spec: &str,
	depth: Option<usize>,
	threads: usize,
	dry_run: bool,
) -> Result<SyncResult, SyncError> {
	run_cancellable(source, destination, state_dir, filter_spec, depth, threads, dry_run, Arc::new(AtomicBool::new(false)))
		.await
}

/// Like [`run`], but cooperatively cancellable via a shared flag. Workers
/// stop picking up new actions once `cancel` is set; the snapshot is not
/// persisted and the run ends in `SyncError::Cancelled`.
#[allow(clippy::too_many_arguments)]
pub async fn run_cancellable(
	source: Box<dyn Provider>,
	destination: Box<dyn Provider>,
	state_dir: &std::path::Path,
	filter_spec: &str,
	depth: Option<usize>,
	threads: usize,
	dry_run: bool,
	cancel: Arc<AtomicBool>,
) -> Result<SyncResult, SyncError> {
	let handle = pair_handle(&source.handle(), &destination.handle(), filter_spec, depth);
	let manager = StateManager::new(state_dir.to_path_buf(), handle);
	let _lock = manager.lock().await?;

	let snapshot = manager.load().await.unwrap_or_default();

	info!(source = %source.label(), destination = %destination.label(), "enumerating");
	let src_current = source.enumerate(depth).await.map_err(crate::error::SyncError::Provider)?;
	let dst_current = destination.enumerate(depth).await.map_err(crate::error::SyncError::Provider)?;

	let filter = Filter::parse(filter_spec).map_err(|e| SyncError::InvalidConfig { message: e.to_string() })?;
	let src_current = filter.apply(&src_current);
	let dst_current = filter.apply(&dst_current);

	let case_insensitive = !source.is_case_sensitive() || !destination.is_case_sensitive();
	let src_current = normalize_state(&src_current, case_insensitive)?;
	let dst_current = normalize_state(&dst_current, case_insensitive)?;
	let src_baseline = normalize_state(&snapshot.source, case_insensitive)?;
	let dst_baseline = normalize_state(&snapshot.destination, case_insensitive)?;

	let src_diff = diff::compute(&src_current, &src_baseline);
	let dst_diff = diff::compute(&dst_current, &dst_baseline);

	let actions = plan::plan(&src_diff, &dst_diff)?;

	if dry_run {
		let mut result = SyncResult::default();
		for action in &actions {
			info!(?action, "would apply");
			result.record(action);
		}
		result.actions = actions;
		return Ok(result);
	}

	let src_state = Arc::new(Mutex::new(src_current));
	let dst_state = Arc::new(Mutex::new(dst_current));

	let (executed, failures) = execute_all(
		actions.clone(),
		source.as_ref(),
		destination.as_ref(),
		&src_state,
		&dst_state,
		threads,
		&cancel,
	)
	.await;

	let mut result = SyncResult::default();
	for action in &executed {
		result.record(action);
	}
	result.actions = executed;

	if cancel.load(Ordering::SeqCst) {
		warn!("sync cancelled; snapshot not persisted");
		return Err(SyncError::Cancelled);
	}

	if !failures.is_empty() {
		return Err(SyncError::ActionFailures { failures });
	}

	let final_src = Arc::try_unwrap(src_state).expect("no outstanding workers").into_inner();
	let final_dst = Arc::try_unwrap(dst_state).expect("no outstanding workers").into_inner();

	let src_keys: std::collections::BTreeSet<_> = final_src.files.keys().cloned().collect();
	let dst_keys: std::collections::BTreeSet<_> = final_dst.files.keys().cloned().collect();
	let only_on_source: Vec<_> = src_keys.difference(&dst_keys).cloned().collect();
	let only_on_destination: Vec<_> = dst_keys.difference(&src_keys).cloned().collect();
	if !only_on_source.is_empty() || !only_on_destination.is_empty() {
		return Err(SyncError::CorrectnessCheckFailed { only_on_source, only_on_destination });
	}

	manager.save(&SyncPairState::new(final_src, final_dst)).await?;

	Ok(result)
}

fn normalize_state(state: &StorageState, case_insensitive: bool) -> Result<StorageState, SyncError> {
	let mut out = StorageState::new();
	for (path, file_state) in &state.files {
		let key = normalize(path, case_insensitive);
		if let Some(existing) = out.files.get(&key) {
			return Err(SyncError::NormalizationCollision {
				path_a: existing.path.clone(),
				path_b: path.clone(),
				normalized: key,
			});
		}
		out.insert(key, file_state.clone());
	}
	Ok(out)
}

/// Execute `actions` with bounded concurrency. Each worker obtains its own
/// provider clone pair once and reuses it for every action it processes,
/// per SPEC_FULL.md §5. Returns the successfully executed actions and any
/// per-path failures collected along the way (both sides observed by
/// peer workers; failures do not stop unrelated work).
async fn execute_all(
	actions: Vec<SyncAction>,
	source: &dyn Provider,
	destination: &dyn Provider,
	src_state: &Arc<Mutex<StorageState>>,
	dst_state: &Arc<Mutex<StorageState>>,
	threads: usize,
	cancel: &Arc<AtomicBool>,
) -> (Vec<SyncAction>, Vec<(String, String)>) {
	let (tx, rx) = mpsc::unbounded_channel();
	for action in actions {
		let _ = tx.send(action);
	}
	drop(tx);

	let rx = Arc::new(Mutex::new(rx));
	let mut workers = Vec::new();

	for _ in 0..threads.max(1) {
		let rx = rx.clone();
		let src_provider = match source.clone_provider().await {
			Ok(p) => p,
			Err(e) => {
				warn!(error = %e, "failed to clone source provider for worker");
				continue;
			}
		};
		let dst_provider = match destination.clone_provider().await {
			Ok(p) => p,
			Err(e) => {
				warn!(error = %e, "failed to clone destination provider for worker");
				continue;
			}
		};
		let src_state = src_state.clone();
		let dst_state = dst_state.clone();
		let cancel = cancel.clone();

		workers.push(tokio::spawn(async move {
			let mut done = Vec::new();
			let mut failed = Vec::new();
			loop {
				if cancel.load(Ordering::SeqCst) {
					break;
				}
				let action = {
					let mut rx = rx.lock().await;
					rx.recv().await
				};
				let Some(action) = action else { break };

				// Read the entries this action needs, then drop both locks
				// before the provider I/O runs so other workers can keep
				// making progress on unrelated paths concurrently.
				let key = exec::lookup_key(&action).to_string();
				let (src_entry, dst_entry) = {
					let src = src_state.lock().await;
					let dst = dst_state.lock().await;
					(src.get(&key).cloned(), dst.get(&key).cloned())
				};

				let result =
					exec::execute_io(&action, src_provider.as_ref(), dst_provider.as_ref(), src_entry, dst_entry)
						.await;

				match result {
					Ok(effect) => {
						{
							let mut src = src_state.lock().await;
							let mut dst = dst_state.lock().await;
							effect.apply(&mut src, &mut dst);
						}
						done.push(action);
					}
					Err(e) => {
						warn!(?action, error = %e, "action failed");
						failed.push((sort_key(&action), e.to_string()));
					}
				}
			}
			(done, failed)
		}));
	}

	let mut executed = Vec::new();
	let mut failures = Vec::new();
	for worker in workers {
		if let Ok((done, failed)) = worker.await {
			executed.extend(done);
			failures.extend(failed);
		}
	}

	// If every worker failed to clone its provider pair, the queue was
	// never drained; surface the stranded actions as failures instead of
	// silently reporting success with nothing executed.
	let mut rx = rx.lock().await;
	while let Ok(action) = rx.try_recv() {
		failures.push((sort_key(&action), "no worker available to execute this action".to_string()));
	}
	drop(rx);

	(executed, failures)
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


// vim: ts=4
