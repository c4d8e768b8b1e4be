//! Per-client handler.
//!
//! A [`Session`] is created for every client connection by
//! [`FileService::new_session`]. It is the operation boundary: each call runs
//! the matching [`FileService`] operation, logs the call and its outcome, and
//! returns the signed result code sent back to the client. No error crosses
//! this boundary.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use remora_types::{DirEntry, DirTree, FileAttr, OpenMode, Whence};

use crate::error::fold;
use crate::service::FileService;
use crate::table::Fd;

/// One client's view of the shared file service.
#[derive(Debug)]
pub struct Session {
    id: u64,
    service: Arc<FileService>,
    /// Descriptors opened through this session and not yet closed by it.
    opened: Mutex<BTreeSet<Fd>>,
}

impl Session {
    pub(crate) fn new(id: u64, service: Arc<FileService>) -> Self {
        tracing::info!(session = id, "session started");
        Self {
            id,
            service,
            opened: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn service(&self) -> &Arc<FileService> {
        &self.service
    }

    /// Descriptors this session opened and still holds, in allocation order.
    pub fn open_descriptors(&self) -> Vec<Fd> {
        self.opened.lock().iter().copied().collect()
    }

    /// `open`: a positive descriptor, or a negative errno.
    pub async fn open(&self, path: Option<&str>, mode: OpenMode) -> i32 {
        tracing::debug!(session = self.id, ?path, %mode, "open");
        let result = self.service.open(path, mode).await;
        match &result {
            Ok(fd) => {
                self.opened.lock().insert(*fd);
                tracing::debug!(session = self.id, fd, "open -> {fd}");
                *fd
            }
            Err(e) => {
                tracing::debug!(session = self.id, ?path, errno = %e.errno(), "open failed: {e}");
                e.errno().as_neg()
            }
        }
    }

    /// `close`: 0, or a negative errno.
    pub async fn close(&self, fd: Fd) -> i32 {
        tracing::debug!(session = self.id, fd, "close");
        let result = self.service.close(fd);
        if result.is_ok() {
            self.opened.lock().remove(&fd);
        }
        self.finish("close", fd, &result, |_| 0) as i32
    }

    /// `write`: bytes written, or a negative errno.
    pub async fn write(&self, fd: Fd, data: &[u8]) -> i64 {
        tracing::debug!(session = self.id, fd, len = data.len(), "write");
        let result = self.service.write(fd, data).await;
        self.finish("write", fd, &result, |n| *n as i64)
    }

    /// `read`: bytes read (0 at end-of-file) and the data, or a negative
    /// errno and no data.
    pub async fn read(&self, fd: Fd, capacity: Option<u64>) -> (i64, Vec<u8>) {
        tracing::debug!(session = self.id, fd, ?capacity, "read");
        let result = self.service.read(fd, capacity).await;
        let code = self.finish("read", fd, &result, |buf| buf.len() as i64);
        (code, result.unwrap_or_default())
    }

    /// `lseek`: the new absolute position, or a negative errno.
    pub async fn lseek(&self, fd: Fd, offset: i64, whence: Whence) -> i64 {
        tracing::debug!(session = self.id, fd, offset, %whence, "lseek");
        let result = self.service.lseek(fd, offset, whence).await;
        self.finish("lseek", fd, &result, |pos| *pos as i64)
    }

    /// `unlink`: 0, or a negative errno.
    pub async fn unlink(&self, path: Option<&str>) -> i32 {
        tracing::debug!(session = self.id, ?path, "unlink");
        let result = self.service.unlink(path).await;
        self.finish("unlink", path, &result, |_| 0) as i32
    }

    /// `stat`: 0 and the attributes, or a negative errno.
    pub async fn stat(&self, path: Option<&str>) -> (i32, Option<FileAttr>) {
        tracing::debug!(session = self.id, ?path, "stat");
        let result = self.service.stat(path).await;
        let code = self.finish("stat", path, &result, |_| 0) as i32;
        (code, result.ok())
    }

    /// `getdirentries`: record bytes returned (0 at the end), the base for
    /// the next call, and the entries. On failure a negative errno, the base
    /// unchanged, and no entries.
    pub async fn get_dir_entries(
        &self,
        fd: Fd,
        nbytes: u64,
        base: u64,
    ) -> (i64, u64, Vec<DirEntry>) {
        tracing::debug!(session = self.id, fd, nbytes, base, "getdirentries");
        let result = self.service.get_dir_entries(fd, nbytes, base).await;
        let code = self.finish("getdirentries", fd, &result, |listing| listing.bytes as i64);
        match result {
            Ok(listing) => (code, listing.next_base, listing.entries),
            Err(_) => (code, base, Vec::new()),
        }
    }

    /// `getdirtree`: 0 and the tree, or a negative errno.
    pub async fn get_dir_tree(&self, path: Option<&str>) -> (i32, Option<DirTree>) {
        tracing::debug!(session = self.id, ?path, "getdirtree");
        let result = self.service.get_dir_tree(path).await;
        let code = self.finish("getdirtree", path, &result, |_| 0) as i32;
        (code, result.ok())
    }

    /// Session-end notification.
    ///
    /// Descriptors are process-wide, so by default nothing is closed. With
    /// `close_on_session_end` set, every descriptor this session still holds
    /// is closed; ones another session already closed are skipped.
    pub async fn client_done(self) {
        let held = std::mem::take(&mut *self.opened.lock());
        if self.service.config().close_on_session_end {
            let mut closed = 0usize;
            for fd in &held {
                if self.service.close(*fd).is_ok() {
                    closed += 1;
                }
            }
            tracing::info!(session = self.id, closed, "session ended, descriptors released");
        } else {
            tracing::info!(session = self.id, held = held.len(), "session ended");
        }
    }

    /// Fold `result` into its code and log the outcome against `subject`,
    /// the descriptor or path the call named.
    fn finish<T>(
        &self,
        op: &'static str,
        subject: impl Debug,
        result: &crate::FsResult<T>,
        ok: impl FnOnce(&T) -> i64,
    ) -> i64 {
        let code = fold(result, ok);
        match result {
            Ok(_) => tracing::debug!(session = self.id, ?subject, "{op} -> {code}"),
            Err(e) => {
                tracing::debug!(session = self.id, ?subject, errno = %e.errno(), "{op} failed: {e}")
            }
        }
        code
    }
}
