//! tetherfs - a context-affine asynchronous filesystem layer
//!
//! Filesystem operations (copy, move, stat, open, positioned read/write,
//! directory listing, permission changes, link management, whole-file
//! read/write) never block the caller: each one executes synchronously
//! against the OS on a background worker thread, and its outcome is
//! delivered back to the *originating* execution context, exactly once.
//! An open [`FileHandle`] is tethered to the context that opened it; use
//! from any other context is a synchronously-reported caller bug.
//!
//! Set TETHERFS_LOG to control logging:
//! - TETHERFS_LOG=off (default) - silent
//! - TETHERFS_LOG=info - pool/context lifecycle
//! - TETHERFS_LOG=debug - per-operation traces

// Execution contexts and outcome routing
pub mod context;

// One-shot outcome future
pub mod completion;

// The context-affine dispatch primitive
pub mod dispatch;

// Error types
pub mod error;

// The filesystem operation surface
pub mod fs;

// Context-bound open file handles
pub mod handle;

// POSIX permission string codec
pub mod perms;

// Background worker threads
pub mod pool;

// File and volume metadata snapshots
pub mod stats;

// Re-export key types
pub use completion::Completion;
pub use context::{Context, ContextId, ContextRegistry};
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use fs::{FileSystem, OpenOptions};
pub use handle::FileHandle;
pub use perms::PermissionSet;
pub use pool::WorkerPool;
pub use stats::{FileStats, FileSystemStats};

#[cfg(test)]
mod tests;
