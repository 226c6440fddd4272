//! The filesystem operation surface
//!
//! `FileSystem` is an explicit service value (no process-wide singleton)
//! holding the dispatcher. Each entry point converts its arguments to
//! owned values, builds one blocking operation, and submits it; tree
//! walks (recursive copy, chmod, delete) run wholly inside their one
//! operation. Callers pass their `&Context` explicitly and await the
//! returned `Completion`.

use crate::completion::Completion;
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::handle::FileHandle;
use crate::perms::PermissionSet;
use crate::stats::{self, FileStats, FileSystemStats};
use regex::Regex;
use std::fs;
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt, symlink};
use std::path::{Path, PathBuf};

/// Flags for [`FileSystem::open`].
///
/// The default mirrors the classic open shape: readable, writable, and
/// create-exclusive, with no write-through durability.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file, failing if it already exists.
    pub create_new: bool,
    /// Write-through at the data level (`O_DSYNC`).
    pub sync: bool,
    /// Write-through at the data and metadata level (`O_SYNC`).
    pub sync_meta: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            read: true,
            write: true,
            create_new: true,
            sync: false,
            sync_meta: false,
        }
    }
}

impl OpenOptions {
    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn sync_meta(mut self, sync_meta: bool) -> Self {
        self.sync_meta = sync_meta;
        self
    }
}

/// Non-blocking filesystem API: every operation executes on a background
/// worker and its outcome is delivered back to the submitting context.
#[derive(Clone)]
pub struct FileSystem {
    dispatcher: Dispatcher,
}

impl FileSystem {
    /// Create a service value with a worker pool of the given size.
    pub fn new(workers: usize) -> Self {
        FileSystem {
            dispatcher: Dispatcher::new(workers),
        }
    }

    /// Create a fresh execution context for a logical caller.
    pub fn register_context(&self) -> Context {
        self.dispatcher.register_context()
    }

    /// Copy `from` to `to`.
    ///
    /// Non-recursive: fails with `AlreadyExists` if `to` exists; a
    /// directory source yields an empty target directory. Recursive:
    /// pre-order walk following links, mirroring directories (tolerating
    /// an existing target only if it is itself a directory) and copying
    /// regular files, failing on any file collision. Best-effort: a
    /// mid-walk failure leaves whatever was already copied.
    pub fn copy(
        &self,
        cx: &Context,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        recursive: bool,
    ) -> Completion<()> {
        let from = from.as_ref().to_path_buf();
        let to = to.as_ref().to_path_buf();
        diagnostics::log_debug!(
            "Dispatching copy {from} -> {to}",
            from: from.display().to_string(),
            to: to.display().to_string()
        );
        self.dispatcher.run_void(cx, move || {
            if recursive {
                copy_tree(&from, &to)
            } else {
                copy_entry(&from, &to)
            }
        })
    }

    /// Move `from` to `to`, failing with `AlreadyExists` if the target
    /// exists and `NotSupported` if the rename crosses a filesystem
    /// boundary.
    pub fn move_file(
        &self,
        cx: &Context,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Completion<()> {
        let from = from.as_ref().to_path_buf();
        let to = to.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || {
            // rename() would silently replace an existing target
            if fs::symlink_metadata(&to).is_ok() {
                return Err(Error::already_exists(&to));
            }
            fs::rename(&from, &to).map_err(|e| match e.raw_os_error() {
                Some(libc::EXDEV) => Error::NotSupported(format!(
                    "atomic move not supported between {} and {}",
                    from.display(),
                    to.display()
                )),
                _ => Error::from_io(&from, e),
            })
        })
    }

    /// Truncate the file at `path` to `len` bytes. A negative length is
    /// rejected before anything touches the filesystem.
    pub fn truncate(&self, cx: &Context, path: impl AsRef<Path>, len: i64) -> Completion<()> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || {
            if len < 0 {
                return Err(Error::invalid_argument(
                    "cannot truncate a file to a negative length",
                ));
            }
            if fs::metadata(&path).is_err() {
                return Err(Error::not_found(&path));
            }
            let file = fs::OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| Error::from_io(&path, e))?;
            file.set_len(len as u64).map_err(|e| Error::from_io(&path, e))
        })
    }

    /// Apply `perms` to `path`. With `dir_perms`, walk the tree applying
    /// `dir_perms` to directories and `perms` to files - directories
    /// typically need the execute bit that files should not carry.
    pub fn chmod(
        &self,
        cx: &Context,
        path: impl AsRef<Path>,
        perms: PermissionSet,
        dir_perms: Option<PermissionSet>,
    ) -> Completion<()> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || match dir_perms {
            Some(dir_perms) => chmod_tree(&path, perms, dir_perms),
            None => set_mode(&path, perms),
        })
    }

    /// Stat the path, following symlinks.
    pub fn stat(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<FileStats> {
        self.stat_impl(cx, path.as_ref().to_path_buf(), true)
    }

    /// Stat the path without following a final symlink.
    pub fn lstat(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<FileStats> {
        self.stat_impl(cx, path.as_ref().to_path_buf(), false)
    }

    fn stat_impl(&self, cx: &Context, path: PathBuf, follow: bool) -> Completion<FileStats> {
        self.dispatcher.run_with_result(cx, move || {
            let meta = if follow {
                fs::metadata(&path)
            } else {
                fs::symlink_metadata(&path)
            };
            let meta = meta.map_err(|e| Error::from_io(&path, e))?;
            Ok(FileStats::from_metadata(&meta))
        })
    }

    /// Create a hard link at `link` pointing to `existing`.
    pub fn link(
        &self,
        cx: &Context,
        link: impl AsRef<Path>,
        existing: impl AsRef<Path>,
    ) -> Completion<()> {
        let link = link.as_ref().to_path_buf();
        let existing = existing.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || {
            fs::hard_link(&existing, &link).map_err(|e| Error::from_io(&link, e))
        })
    }

    /// Create a symbolic link at `link` pointing to `existing`.
    pub fn symlink(
        &self,
        cx: &Context,
        link: impl AsRef<Path>,
        existing: impl AsRef<Path>,
    ) -> Completion<()> {
        let link = link.as_ref().to_path_buf();
        let existing = existing.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || {
            symlink(&existing, &link).map_err(|e| Error::from_io(&link, e))
        })
    }

    /// Read the target of a symbolic link; `NotALink` if the path is not
    /// one.
    pub fn read_symlink(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<PathBuf> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher.run_with_result(cx, move || {
            fs::read_link(&path).map_err(|e| match e.raw_os_error() {
                Some(libc::EINVAL) => Error::not_a_link(&path),
                _ => Error::from_io(&path, e),
            })
        })
    }

    /// Delete `path`.
    ///
    /// Non-recursive: `NotFound` if missing, `NotEmpty` for a non-empty
    /// directory. Recursive: post-order walk deleting files first and
    /// emptied directories after; the first I/O error aborts the walk.
    pub fn delete(&self, cx: &Context, path: impl AsRef<Path>, recursive: bool) -> Completion<()> {
        let path = path.as_ref().to_path_buf();
        diagnostics::log_debug!(
            "Dispatching delete of {path} (recursive={recursive})",
            path: path.display().to_string(),
            recursive: recursive
        );
        self.dispatcher.run_void(cx, move || {
            if recursive {
                delete_tree(&path)
            } else {
                delete_entry(&path)
            }
        })
    }

    /// Remove a single file or symlink. Alias for non-recursive delete.
    pub fn unlink(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<()> {
        self.delete(cx, path, false)
    }

    /// Create a directory at `path`, failing with `AlreadyExists` if it
    /// exists. With `create_parents`, missing ancestors are created too;
    /// `perms`, if given, applies to every directory this call creates.
    pub fn mkdir(
        &self,
        cx: &Context,
        path: impl AsRef<Path>,
        perms: Option<PermissionSet>,
        create_parents: bool,
    ) -> Completion<()> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || {
            if fs::symlink_metadata(&path).is_ok() {
                return Err(Error::already_exists(&path));
            }
            let mut missing = vec![path.clone()];
            if create_parents {
                let mut cursor = path.as_path();
                while let Some(parent) = cursor.parent() {
                    if parent.as_os_str().is_empty() || parent.exists() {
                        break;
                    }
                    missing.push(parent.to_path_buf());
                    cursor = parent;
                }
            }
            for dir in missing.iter().rev() {
                fs::create_dir(dir).map_err(|e| Error::from_io(dir, e))?;
                if let Some(perms) = perms {
                    set_mode(dir, perms)?;
                }
            }
            Ok(())
        })
    }

    /// List a directory as canonical absolute paths.
    ///
    /// `filter`, if given, is a regex matched against whole file names
    /// (not a glob on the final segment). Missing path is `NotFound`; a
    /// non-directory is `NotADirectory`.
    pub fn read_dir(
        &self,
        cx: &Context,
        path: impl AsRef<Path>,
        filter: Option<&str>,
    ) -> Completion<Vec<PathBuf>> {
        let path = path.as_ref().to_path_buf();
        let filter = filter.map(str::to_string);
        self.dispatcher.run_with_result(cx, move || {
            let meta = fs::metadata(&path).map_err(|e| Error::from_io(&path, e))?;
            if !meta.is_dir() {
                return Err(Error::not_a_directory(&path));
            }
            let pattern = match filter {
                // Whole-name match semantics, like Pattern.matches
                Some(f) => Some(Regex::new(&format!("\\A(?:{f})\\z")).map_err(|e| {
                    Error::invalid_argument(format!("invalid file name filter: {e}"))
                })?),
                None => None,
            };
            let dir = fs::canonicalize(&path).map_err(|e| Error::from_io(&path, e))?;
            let mut paths = Vec::new();
            for entry in fs::read_dir(&path).map_err(|e| Error::from_io(&path, e))? {
                let entry = entry.map_err(|e| Error::from_io(&path, e))?;
                if let Some(re) = &pattern {
                    if !re.is_match(&entry.file_name().to_string_lossy()) {
                        continue;
                    }
                }
                // A dangling symlink has no canonical form; list it under
                // the canonical directory rather than failing the listing.
                let resolved = match fs::canonicalize(entry.path()) {
                    Ok(canonical) => canonical,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        dir.join(entry.file_name())
                    }
                    Err(e) => return Err(Error::from_io(entry.path(), e)),
                };
                paths.push(resolved);
            }
            Ok(paths)
        })
    }

    /// Open a file and return a handle tethered to the calling context.
    ///
    /// Fails with `InvalidArgument` when neither read nor write is
    /// requested; `create_new` is create-exclusive. Optional `perms` set
    /// the creation mode.
    pub fn open(
        &self,
        cx: &Context,
        path: impl AsRef<Path>,
        perms: Option<PermissionSet>,
        options: OpenOptions,
    ) -> Completion<FileHandle> {
        let path = path.as_ref().to_path_buf();
        // The handle is tethered to whoever submitted the open, decided
        // here and not when the worker gets around to it.
        let owner = cx.id();
        let dispatcher = self.dispatcher.clone();
        diagnostics::log_debug!(
            "Dispatching open of {path} for {owner}",
            path: path.display().to_string(),
            owner: owner.to_string()
        );
        self.dispatcher.run_with_result(cx, move || {
            if !options.read && !options.write {
                return Err(Error::invalid_argument(
                    "cannot open a file for neither reading nor writing",
                ));
            }
            let mut std_options = fs::OpenOptions::new();
            std_options.read(options.read).write(options.write);
            if options.create_new {
                std_options.create_new(true);
            }
            let mut flags = 0;
            if options.sync {
                flags |= libc::O_DSYNC;
            }
            if options.sync_meta {
                flags |= libc::O_SYNC;
            }
            if flags != 0 {
                std_options.custom_flags(flags);
            }
            if let Some(perms) = perms {
                std_options.mode(perms.mode());
            }
            let file = std_options.open(&path).map_err(|e| Error::from_io(&path, e))?;
            Ok(FileHandle::new(file, owner, path, dispatcher))
        })
    }

    /// Read a whole file into memory, independent of any handle.
    pub fn read_file(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<Vec<u8>> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher
            .run_with_result(cx, move || fs::read(&path).map_err(|e| Error::from_io(&path, e)))
    }

    /// Write a whole file in one go, creating or truncating it.
    pub fn write_file(
        &self,
        cx: &Context,
        path: impl AsRef<Path>,
        data: impl Into<Vec<u8>>,
    ) -> Completion<()> {
        let path = path.as_ref().to_path_buf();
        let data = data.into();
        self.dispatcher
            .run_void(cx, move || fs::write(&path, &data).map_err(|e| Error::from_io(&path, e)))
    }

    /// Create an empty file, failing with `AlreadyExists` if present.
    pub fn create_file(
        &self,
        cx: &Context,
        path: impl AsRef<Path>,
        perms: Option<PermissionSet>,
    ) -> Completion<()> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher.run_void(cx, move || {
            let mut options = fs::OpenOptions::new();
            options.write(true).create_new(true);
            if let Some(perms) = perms {
                options.mode(perms.mode());
            }
            options
                .open(&path)
                .map(|_| ())
                .map_err(|e| Error::from_io(&path, e))
        })
    }

    /// Whether the path exists (following symlinks). Never fails.
    pub fn exists(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<bool> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher.run_with_result(cx, move || Ok(path.exists()))
    }

    /// Capacity of the volume containing `path`.
    pub fn fs_stats(&self, cx: &Context, path: impl AsRef<Path>) -> Completion<FileSystemStats> {
        let path = path.as_ref().to_path_buf();
        self.dispatcher
            .run_with_result(cx, move || stats::statvfs(&path))
    }
}

fn set_mode(path: &Path, perms: PermissionSet) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(perms.mode()))
        .map_err(|e| Error::from_io(path, e))
}

fn chmod_tree(path: &Path, file_perms: PermissionSet, dir_perms: PermissionSet) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::from_io(path, e))?;
    if meta.is_dir() {
        set_mode(path, dir_perms)?;
        for entry in fs::read_dir(path).map_err(|e| Error::from_io(path, e))? {
            let entry = entry.map_err(|e| Error::from_io(path, e))?;
            chmod_tree(&entry.path(), file_perms, dir_perms)?;
        }
        Ok(())
    } else {
        set_mode(path, file_perms)
    }
}

/// Non-recursive copy: a directory source becomes an empty target
/// directory, a file source is copied create-exclusive.
fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::metadata(from).map_err(|e| Error::from_io(from, e))?;
    if meta.is_dir() {
        fs::create_dir(to).map_err(|e| Error::from_io(to, e))
    } else {
        copy_file(from, to)
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let mut src = fs::File::open(from).map_err(|e| Error::from_io(from, e))?;
    let mut dst = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(|e| Error::from_io(to, e))?;
    io::copy(&mut src, &mut dst).map_err(|e| Error::from_io(to, e))?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::metadata(from).map_err(|e| Error::from_io(from, e))?;
    if meta.is_dir() {
        match fs::create_dir(to) {
            Ok(()) => {}
            // An existing target directory is tolerated when mirroring
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && to.is_dir() => {}
            Err(e) => return Err(Error::from_io(to, e)),
        }
        for entry in fs::read_dir(from).map_err(|e| Error::from_io(from, e))? {
            let entry = entry.map_err(|e| Error::from_io(from, e))?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        copy_file(from, to)
    }
}

fn delete_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::from_io(path, e))?;
    let result = if meta.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::from_io(path, e))
}

fn delete_tree(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::from_io(path, e))?;
    if meta.is_dir() {
        for entry in fs::read_dir(path).map_err(|e| Error::from_io(path, e))? {
            let entry = entry.map_err(|e| Error::from_io(path, e))?;
            delete_tree(&entry.path())?;
        }
        fs::remove_dir(path).map_err(|e| Error::from_io(path, e))
    } else {
        fs::remove_file(path).map_err(|e| Error::from_io(path, e))
    }
}
