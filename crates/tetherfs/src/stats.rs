use crate::error::{Error, Result};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::SystemTime;

/// Immutable snapshot of one file's metadata, captured at stat time.
#[derive(Debug, Clone)]
pub struct FileStats {
    pub size: u64,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub is_directory: bool,
    pub is_regular_file: bool,
    pub is_symlink: bool,
    pub is_other: bool,
}

impl FileStats {
    pub(crate) fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let file_type = meta.file_type();
        FileStats {
            size: meta.len(),
            created: meta.created().ok(),
            modified: meta.modified().ok(),
            accessed: meta.accessed().ok(),
            is_directory: file_type.is_dir(),
            is_regular_file: file_type.is_file(),
            is_symlink: file_type.is_symlink(),
            is_other: !(file_type.is_dir() || file_type.is_file() || file_type.is_symlink()),
        }
    }
}

/// Capacity snapshot of the volume holding a path.
///
/// `free_bytes` is the unallocated space on the volume; `usable_bytes` is
/// the portion of it available to unprivileged callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSystemStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub usable_bytes: u64,
}

pub(crate) fn statvfs(path: &Path) -> Result<FileSystemStats> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::invalid_argument("path contains a NUL byte"))?;
    let mut vfs = std::mem::MaybeUninit::<libc::statvfs>::zeroed();
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), vfs.as_mut_ptr()) };
    if rc != 0 {
        return Err(Error::from_io(path, std::io::Error::last_os_error()));
    }
    let vfs = unsafe { vfs.assume_init() };
    let frsize = vfs.f_frsize as u64;
    Ok(FileSystemStats {
        total_bytes: vfs.f_blocks as u64 * frsize,
        free_bytes: vfs.f_bfree as u64 * frsize,
        usable_bytes: vfs.f_bavail as u64 * frsize,
    })
}
