use crate::completion::Completion;
use crate::context::{Context, ContextId};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One open descriptor, bound for its whole life to the context that
/// opened it.
///
/// Every operation takes the caller's `&Context` and checks it against the
/// opener synchronously, before anything reaches the worker pool; a
/// mismatch is a caller bug and comes back as an immediate
/// `Err(ContextViolation)`. That guard is the only sync error these
/// methods produce - everything else travels through the completion.
///
/// Positioned reads and writes may be issued concurrently from the owning
/// context without waiting for prior ones. `close` must not be issued
/// while other operations on the handle are outstanding; ordering within
/// the owning context is the caller's responsibility. After `close`,
/// operations resolve to `HandleClosed` without touching the pool.
pub struct FileHandle {
    file: Mutex<Option<Arc<File>>>,
    owner: ContextId,
    path: PathBuf,
    dispatcher: Dispatcher,
}

impl FileHandle {
    pub(crate) fn new(
        file: File,
        owner: ContextId,
        path: PathBuf,
        dispatcher: Dispatcher,
    ) -> Self {
        FileHandle {
            file: Mutex::new(Some(Arc::new(file))),
            owner,
            path,
            dispatcher,
        }
    }

    /// The context this handle is tethered to.
    pub fn owner(&self) -> ContextId {
        self.owner
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.slot().is_none()
    }

    fn check_context(&self, cx: &Context) -> Result<()> {
        if cx.id() != self.owner {
            return Err(Error::ContextViolation {
                owner: self.owner,
                caller: cx.id(),
            });
        }
        Ok(())
    }

    fn slot(&self) -> Option<Arc<File>> {
        self.file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Read up to `length` bytes starting at `position`. A read past the
    /// end of the file returns the bytes that were available.
    pub fn read(&self, cx: &Context, position: u64, length: usize) -> Result<Completion<Vec<u8>>> {
        self.check_context(cx)?;
        let Some(file) = self.slot() else {
            return Ok(Completion::settled(cx, Err(Error::HandleClosed)));
        };
        let path = self.path.clone();
        Ok(self.dispatcher.run_with_result(cx, move || {
            let mut buf = vec![0u8; length];
            let mut filled = 0;
            while filled < length {
                match file.read_at(&mut buf[filled..], position + filled as u64) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(Error::from_io(&path, e)),
                }
            }
            buf.truncate(filled);
            Ok(buf)
        }))
    }

    /// Write the whole buffer at `position`.
    pub fn write(&self, cx: &Context, data: Vec<u8>, position: u64) -> Result<Completion<()>> {
        self.check_context(cx)?;
        let Some(file) = self.slot() else {
            return Ok(Completion::settled(cx, Err(Error::HandleClosed)));
        };
        let path = self.path.clone();
        Ok(self.dispatcher.run_void(cx, move || {
            file.write_all_at(&data, position)
                .map_err(|e| Error::from_io(&path, e))
        }))
    }

    /// Flush written data to the device; with `metadata_too`, flush file
    /// metadata as well.
    pub fn sync(&self, cx: &Context, metadata_too: bool) -> Result<Completion<()>> {
        self.check_context(cx)?;
        let Some(file) = self.slot() else {
            return Ok(Completion::settled(cx, Err(Error::HandleClosed)));
        };
        let path = self.path.clone();
        Ok(self.dispatcher.run_void(cx, move || {
            let result = if metadata_too {
                file.sync_all()
            } else {
                file.sync_data()
            };
            result.map_err(|e| Error::from_io(&path, e))
        }))
    }

    /// Close the handle. The transition to closed is immediate (later
    /// operations fail fast); releasing the descriptor happens on a worker.
    pub fn close(&self, cx: &Context) -> Result<Completion<()>> {
        self.check_context(cx)?;
        let taken = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        match taken {
            None => Ok(Completion::settled(cx, Err(Error::HandleClosed))),
            Some(file) => Ok(self.dispatcher.run_void(cx, move || {
                drop(file);
                Ok(())
            })),
        }
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("owner", &self.owner)
            .field("closed", &self.is_closed())
            .finish()
    }
}
