mod dispatch;

use crate::FileSystem;

/// Service value with a small pool, enough to exercise real concurrency
pub(crate) fn test_fs() -> FileSystem {
    FileSystem::new(2)
}
