//! # bisync - two-way file tree synchronization
//!
//! Synchronizes a file tree between two pluggable storage providers,
//! tracking a persisted snapshot of each side so that later runs can tell
//! an edit from a delete-and-recreate, and a rename from an unrelated
//! add/remove pair.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use bisync::sync::SyncBuilder;
//! use bisync::provider::fs::FsProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = SyncBuilder::new()
//!         .source(Box::new(FsProvider::new("./a")))
//!         .destination(Box::new(FsProvider::new("./b")))
//!         .sync()
//!         .await?;
//!     println!("uploaded {} files", result.uploaded);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod cache;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod exec;
pub mod filter;
pub mod hash;
pub mod logging;
pub mod path;
pub mod plan;
pub mod provider;
pub mod state;
pub mod sync;

pub use error::{ConflictError, PlanError, ProviderError, StateError, SyncError};
pub use plan::SyncAction;
pub use provider::Provider;
pub use sync::{SyncBuilder, SyncResult};

// vim: ts=4
