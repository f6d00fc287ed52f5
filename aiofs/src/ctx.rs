/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The submission context shared by every file.
//!
//! A context pins the backend choice for its lifetime, owns the
//! completion-key table, enforces the io_uring queue-depth bound, and carries
//! the buffer-allocation policy (alignment plus optional pool hooks). All
//! shared state sits behind one mutex; the per-file mutex is always acquired
//! after it, never before.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

#[cfg(unix)]
use std::collections::HashMap;

use crate::{
    backend::Engine,
    buffer::{BufPoller, BufReleaser, IoBuf},
    error::{Error, Result},
    lock::LockExt,
};

#[cfg(unix)]
use crate::backend::InFlight;

#[cfg(unix)]
use crate::file::{FileInner, Op};

/// Which kernel mechanism a context drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Linux io_uring.
    IoUring,
    /// Linux AIO or POSIX AIO.
    Aio,
    /// Windows overlapped I/O.
    Overlapped,
}

/// Synchronous operations at or below this size go through the raw
/// read/write syscall instead of the std blocking path.
const DEFAULT_SAME_THREAD_LIMIT: usize = 64 * 1024;

pub(crate) struct CtxInner {
    pub(crate) engine: Engine,
    /// In-flight operation count; bounded by the queue depth on io_uring.
    pub(crate) current: usize,
    /// Completion key -> in-flight record. The record owns the submitted
    /// buffer and the backend control block for the kernel's lifetime of the
    /// operation.
    #[cfg(unix)]
    pub(crate) ops: HashMap<u64, InFlight>,
}

/// Process-wide submission context. Create one with [`Ctx::builder`] and
/// share it as an `Arc` between files.
pub struct Ctx {
    backend: Backend,
    sz: usize,
    align: usize,
    #[cfg_attr(windows, allow(dead_code))]
    same_thread_limit: usize,
    buf_poller: Option<Box<BufPoller>>,
    buf_releaser: Option<Box<BufReleaser>>,
    #[cfg_attr(windows, allow(dead_code))]
    next_id: AtomicU64,
    cq_overflow: AtomicU64,
    pub(crate) inner: Mutex<CtxInner>,
}

impl Ctx {
    /// Start building a context with the given queue depth.
    pub fn builder(queue_depth: usize) -> CtxBuilder {
        CtxBuilder {
            sz: queue_depth,
            same_thread_limit: DEFAULT_SAME_THREAD_LIMIT,
            buf_poller: None,
            buf_releaser: None,
            backend: None,
        }
    }

    /// The backend selected at creation.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Buffer alignment required by the backend (512 for Linux AIO, 1
    /// otherwise).
    pub fn align(&self) -> usize {
        self.align
    }

    /// Queue depth the context was created with.
    pub fn queue_depth(&self) -> usize {
        self.sz
    }

    /// Completion-queue overflow count reported by the kernel (io_uring
    /// only; always zero elsewhere).
    pub fn cq_overflow(&self) -> u64 {
        self.cq_overflow.load(Ordering::Relaxed)
    }

    /// Whether the backend cannot accept another submission right now. Only
    /// io_uring has a hard in-flight bound.
    pub fn busy(&self) -> bool {
        if self.backend != Backend::IoUring {
            return false;
        }
        let inner = self.lock_inner();
        inner.current >= self.sz
    }

    /// Drain the backend's completion source and apply every completion to
    /// its file. Cheap when nothing is pending; never blocks.
    pub fn harvest(&self) -> Result<()> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                let mut inner = self.lock_inner();
                match self.backend {
                    Backend::IoUring => crate::backend::uring::harvest(self, &mut inner),
                    Backend::Aio => crate::backend::aio::harvest(self, &mut inner),
                    Backend::Overlapped => Ok(()),
                }
            } else if #[cfg(any(target_os = "macos", target_os = "freebsd"))] {
                let mut inner = self.lock_inner();
                crate::backend::posix::harvest(&mut inner)
            } else {
                // Overlapped completions are polled per file.
                Ok(())
            }
        }
    }

    /// Allocate a buffer of `len` bytes satisfying the backend alignment,
    /// preferring the pool hook when one is installed.
    pub fn alloc_buf(&self, len: usize) -> Result<IoBuf> {
        if let Some(poller) = &self.buf_poller {
            if let Some(mut buf) = poller(len, self.align) {
                if buf.capacity() >= len && (buf.as_ptr() as usize) % self.align == 0 {
                    buf.set_len(len);
                    return Ok(buf);
                }
                // Pooled buffer is short or badly aligned for this backend.
                self.release_buf(buf);
            }
        }
        IoBuf::alloc(len, self.align)
    }

    /// Zero a buffer and hand it to the pool hook, or drop it.
    pub fn release_buf(&self, mut buf: IoBuf) {
        buf.zero();
        if let Some(releaser) = &self.buf_releaser {
            releaser(buf);
        }
    }

    /// Whether a synchronous operation of `len` bytes should use the std
    /// blocking path instead of the raw syscall. (Windows sync I/O always
    /// goes through the blocking path.)
    #[cfg(unix)]
    pub(crate) fn use_blocking_path(&self, len: usize) -> bool {
        len > self.same_thread_limit
    }

    #[cfg(unix)]
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, CtxInner> {
        self.inner.lock_ignore_poison()
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn note_cq_overflow(&self, value: u64) {
        let previous = self.cq_overflow.swap(value, Ordering::Relaxed);
        if value > previous {
            tracing::warn!(overflow = value, "io_uring completion queue overflowed");
        }
    }

    /// Submit one operation at the file's logical position. Exactly one
    /// operation per file may be in flight; the caller has already verified
    /// that through `check_async_result`.
    #[cfg(unix)]
    pub(crate) fn submit(&self, file: &Arc<FileInner>, op: Op, buf: IoBuf) -> Result<()> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                match self.backend {
                    Backend::IoUring => crate::backend::uring::submit(self, file, op, buf),
                    Backend::Aio => crate::backend::aio::submit(self, file, op, buf),
                    Backend::Overlapped => file.park(buf, Error::NotSupported),
                }
            } else {
                crate::backend::posix::submit(self, file, op, buf)
            }
        }
    }
}

impl std::fmt::Debug for Ctx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ctx")
            .field("backend", &self.backend)
            .field("queue_depth", &self.sz)
            .field("align", &self.align)
            .finish()
    }
}

/// Builder for [`Ctx`].
pub struct CtxBuilder {
    sz: usize,
    same_thread_limit: usize,
    buf_poller: Option<Box<BufPoller>>,
    buf_releaser: Option<Box<BufReleaser>>,
    backend: Option<Backend>,
}

impl CtxBuilder {
    /// Synchronous operations larger than `limit` bytes are dispatched to the
    /// std blocking path; smaller ones issue the raw syscall directly.
    pub fn same_thread_limit(mut self, limit: usize) -> Self {
        self.same_thread_limit = limit;
        self
    }

    /// Install buffer pool hooks. The poller may return `None` (or an
    /// undersized buffer) to fall back to a fresh allocation; released
    /// buffers are zeroed before the releaser sees them.
    pub fn buffer_pool<P, R>(mut self, poller: P, releaser: R) -> Self
    where
        P: Fn(usize, usize) -> Option<IoBuf> + Send + Sync + 'static,
        R: Fn(IoBuf) + Send + Sync + 'static,
    {
        self.buf_poller = Some(Box::new(poller));
        self.buf_releaser = Some(Box::new(releaser));
        self
    }

    /// Force a specific backend instead of probing. Fails with
    /// [`Error::NotSupported`] if the host cannot provide it.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Probe the host, set up the backend, and produce the shared context.
    ///
    /// On Linux, io_uring is preferred; any setup failure (including a queue
    /// depth that is not a power of two) falls back to kernel AIO.
    pub fn build(self) -> Result<Arc<Ctx>> {
        let (engine, backend, align) = Self::select_engine(self.sz, self.backend)?;
        Ok(Arc::new(Ctx {
            backend,
            sz: self.sz,
            align,
            same_thread_limit: self.same_thread_limit,
            buf_poller: self.buf_poller,
            buf_releaser: self.buf_releaser,
            next_id: AtomicU64::new(1),
            cq_overflow: AtomicU64::new(0),
            inner: Mutex::new(CtxInner {
                engine,
                current: 0,
                #[cfg(unix)]
                ops: HashMap::new(),
            }),
        }))
    }

    #[cfg(target_os = "linux")]
    fn select_engine(sz: usize, forced: Option<Backend>) -> Result<(Engine, Backend, usize)> {
        use crate::backend::{aio, uring};
        match forced {
            None => match uring::init(sz) {
                Ok(ring) => Ok((Engine::Uring(ring), Backend::IoUring, 1)),
                Err(err) => {
                    tracing::debug!(%err, "io_uring unavailable, falling back to kernel AIO");
                    Ok((Engine::Aio(aio::init(sz)?), Backend::Aio, aio::ALIGN))
                }
            },
            Some(Backend::IoUring) => Ok((Engine::Uring(uring::init(sz)?), Backend::IoUring, 1)),
            Some(Backend::Aio) => Ok((Engine::Aio(aio::init(sz)?), Backend::Aio, aio::ALIGN)),
            Some(Backend::Overlapped) => Err(Error::NotSupported),
        }
    }

    #[cfg(any(target_os = "macos", target_os = "freebsd"))]
    fn select_engine(_sz: usize, forced: Option<Backend>) -> Result<(Engine, Backend, usize)> {
        match forced {
            None | Some(Backend::Aio) => Ok((Engine, Backend::Aio, 1)),
            Some(_) => Err(Error::NotSupported),
        }
    }

    #[cfg(windows)]
    fn select_engine(_sz: usize, forced: Option<Backend>) -> Result<(Engine, Backend, usize)> {
        match forced {
            None | Some(Backend::Overlapped) => Ok((Engine, Backend::Overlapped, 1)),
            Some(_) => Err(Error::NotSupported),
        }
    }
}
