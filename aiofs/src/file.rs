/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The per-file handle and its completion state machine.
//!
//! A file opened in `Async` mode carries at most one outstanding operation.
//! Submission records the operation as incomplete; completion is discovered
//! by polling (`last_op`, or anything that runs `check_async_result`), which
//! drains the backend's completion source and applies the result to the
//! file's state. The logical position is tracked by the library and advances
//! only on successful completion; async backends address the file by
//! explicit offsets, so the kernel cursor is realigned lazily
//! (`check_async_seek`) before any synchronous call on an async handle.

use std::{
    fmt, fs,
    io::{Read, Seek, SeekFrom, Write},
    mem::ManuallyDrop,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    buffer::IoBuf,
    ctx::Ctx,
    error::{Error, Result},
    lock::LockExt,
};

#[cfg(target_os = "linux")]
use crate::ctx::Backend;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

#[cfg(windows)]
use aiofs_platform::OVERLAPPED;

/// How a file is driven: blocking syscalls, or submit-then-poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Sync = 0x1,
    Async = 0x2,
}

/// Kind of the last submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Unknown = 0,
    Read = 1,
    Write = 2,
}

/// What polling the last operation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Still in flight; poll again.
    Pending,
    /// Completed with the given transfer size.
    Done { bytes: usize },
    /// Completed at end of file (a read returned zero bytes for a nonzero
    /// request).
    Eof,
}

/// Result and buffer of the most recent async operation.
pub(crate) struct LastOpState {
    pub(crate) op: Op,
    pub(crate) complete: bool,
    /// Transferred bytes, or a negated errno from the kernel.
    pub(crate) result: i64,
    pub(crate) eof: bool,
    /// The submitted buffer, handed back after harvest (for reads it carries
    /// the kernel-written bytes). Also used to park a buffer whose
    /// submission was rejected.
    pub(crate) data: Option<IoBuf>,
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        /// A heap-pinned `OVERLAPPED` block. The kernel writes through the
        /// raw pointer while an operation is outstanding; the box keeps the
        /// address stable for that whole window.
        pub(crate) struct OvBox(Box<OVERLAPPED>);

        unsafe impl Send for OvBox {}

        impl OvBox {
            fn new() -> Self {
                OvBox(Box::new(unsafe { std::mem::zeroed() }))
            }

            pub(crate) fn as_mut_ptr(&mut self) -> *mut OVERLAPPED {
                &mut *self.0
            }
        }

        /// Per-file overlapped bookkeeping: one block per direction plus the
        /// progress counters the poll path accumulates into.
        pub(crate) struct WinState {
            pub(crate) read_ov: OvBox,
            pub(crate) write_ov: OvBox,
            /// Bytes observed across polls of the current operation.
            pub(crate) processed: u64,
            /// Requested transfer size of the current operation.
            pub(crate) to_rw: u64,
            /// Block inside `GetOverlappedResult` instead of polling.
            pub(crate) wait: bool,
            /// Owned buffer of the outstanding async operation.
            pub(crate) inflight: Option<IoBuf>,
        }

        impl WinState {
            fn new() -> Self {
                WinState {
                    read_ov: OvBox::new(),
                    write_ov: OvBox::new(),
                    processed: 0,
                    to_rw: 0,
                    wait: false,
                    inflight: None,
                }
            }
        }
    }
}

/// Mutable per-file state, guarded by the file mutex.
pub(crate) struct FileState {
    /// Library-tracked offset for the next operation; independent of the
    /// kernel file-descriptor cursor in async mode.
    pub(crate) pos: u64,
    /// The kernel cursor must be realigned to `pos` before the next
    /// synchronous call.
    pub(crate) last_sync_seek: bool,
    pub(crate) last: LastOpState,
    #[cfg(windows)]
    pub(crate) win: WinState,
}

impl FileState {
    fn new() -> Self {
        FileState {
            pos: 0,
            last_sync_seek: false,
            last: LastOpState {
                op: Op::Unknown,
                // The first real operation must not be gated on a prior
                // completion.
                complete: true,
                result: 0,
                eof: false,
                data: None,
            },
            #[cfg(windows)]
            win: WinState::new(),
        }
    }
}

pub(crate) struct FileInner {
    pub(crate) ctx: Arc<Ctx>,
    /// Manually dropped so the handle is closed explicitly (and failures
    /// logged) instead of through `fs::File`'s silent destructor.
    pub(crate) fd: ManuallyDrop<fs::File>,
    path: PathBuf,
    mode: Mode,
    pub(crate) state: Mutex<FileState>,
}

impl Drop for FileInner {
    fn drop(&mut self) {
        // This is the only place the handle leaves the ManuallyDrop; the
        // struct is being destroyed and `fd` is not touched again.
        let fd = unsafe { ManuallyDrop::take(&mut self.fd) };

        #[cfg(unix)]
        {
            use std::os::unix::io::IntoRawFd;
            if unsafe { libc::close(fd.into_raw_fd()) } < 0 {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %std::io::Error::last_os_error(),
                    "failed to close file handle"
                );
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::io::IntoRawHandle;
            if let Err(error) = unsafe { aiofs_platform::close_handle(fd.into_raw_handle()) } {
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "failed to close file handle"
                );
            }
        }

        #[cfg(not(any(unix, windows)))]
        drop(fd);
    }
}

/// Options controlling how a file is opened; a thin portable mirror of
/// `std::fs::OpenOptions` so the backend-specific flags stay internal.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    append: bool,
    create: bool,
    create_new: bool,
    truncate: bool,
    #[cfg_attr(windows, allow(dead_code))]
    perm: u32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        OpenOptions {
            read: false,
            write: false,
            append: false,
            create: false,
            create_new: false,
            truncate: false,
            perm: 0o666,
        }
    }

    pub fn read(&mut self, read: bool) -> &mut Self {
        self.read = read;
        self
    }

    pub fn write(&mut self, write: bool) -> &mut Self {
        self.write = write;
        self
    }

    pub fn append(&mut self, append: bool) -> &mut Self {
        self.append = append;
        self
    }

    pub fn create(&mut self, create: bool) -> &mut Self {
        self.create = create;
        self
    }

    pub fn create_new(&mut self, create_new: bool) -> &mut Self {
        self.create_new = create_new;
        self
    }

    pub fn truncate(&mut self, truncate: bool) -> &mut Self {
        self.truncate = truncate;
        self
    }

    /// Unix permission bits applied when the file is created; ignored on
    /// Windows.
    pub fn perm(&mut self, perm: u32) -> &mut Self {
        self.perm = perm;
        self
    }

    fn to_std(&self, ctx: &Ctx, mode: Mode) -> fs::OpenOptions {
        let mut opts = fs::OpenOptions::new();
        opts.read(self.read)
            .write(self.write)
            .append(self.append)
            .create(self.create)
            .create_new(self.create_new)
            .truncate(self.truncate);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(self.perm);
        }

        #[cfg(target_os = "linux")]
        if mode == Mode::Async && ctx.backend() == Backend::Aio {
            use std::os::unix::fs::OpenOptionsExt;
            // Kernel AIO is only asynchronous past the page cache.
            opts.custom_flags(libc::O_DIRECT);
        }

        #[cfg(windows)]
        {
            let _ = ctx;
            if mode == Mode::Async {
                use std::os::windows::fs::OpenOptionsExt;
                opts.custom_flags(aiofs_platform::FILE_FLAG_OVERLAPPED);
            }
        }

        #[cfg(not(any(target_os = "linux", windows)))]
        let _ = (ctx, mode);

        opts
    }
}

/// A file handle driving one of the context's backends.
pub struct File {
    inner: Arc<FileInner>,
}

impl File {
    /// Open `path` with the given options in `Sync` or `Async` mode.
    ///
    /// Async mode adds the backend-specific open flags (`O_DIRECT` for Linux
    /// AIO, `FILE_FLAG_OVERLAPPED` on Windows) and starts the completion
    /// state machine in the idle state.
    pub fn open(
        ctx: &Arc<Ctx>,
        path: impl AsRef<Path>,
        options: &OpenOptions,
        mode: Mode,
    ) -> Result<File> {
        let path = path.as_ref().to_path_buf();
        let fd = options.to_std(ctx, mode).open(&path)?;
        Ok(File {
            inner: Arc::new(FileInner {
                ctx: Arc::clone(ctx),
                fd: ManuallyDrop::new(fd),
                path,
                mode,
                state: Mutex::new(FileState::new()),
            }),
        })
    }

    /// Open read-write, creating and truncating: the common scratch-file
    /// shape.
    pub fn create(ctx: &Arc<Ctx>, path: impl AsRef<Path>, mode: Mode) -> Result<File> {
        File::open(
            ctx,
            path,
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true),
            mode,
        )
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The context this file submits through.
    pub fn ctx(&self) -> &Arc<Ctx> {
        &self.inner.ctx
    }

    /// Write `buf` at the logical position.
    ///
    /// Async mode submits and returns zero bytes; the transfer size is
    /// reported by [`File::last_op`] once the completion has been harvested,
    /// and the buffer comes back through [`File::take_buffer`]. If the
    /// submission is rejected the buffer is parked for `take_buffer`
    /// immediately. Sync mode performs the write before returning.
    pub fn write(&self, buf: IoBuf) -> Result<usize> {
        match self.inner.mode {
            Mode::Async => self.rw_async(Op::Write, buf),
            Mode::Sync => self.rw_sync_owned(Op::Write, buf),
        }
    }

    /// Read into `buf` from the logical position. Same contract as
    /// [`File::write`]; after completion the kernel-written bytes are visible
    /// in the buffer returned by [`File::take_buffer`].
    pub fn read(&self, buf: IoBuf) -> Result<usize> {
        match self.inner.mode {
            Mode::Async => self.rw_async(Op::Read, buf),
            Mode::Sync => self.rw_sync_owned(Op::Read, buf),
        }
    }

    /// Write synchronously, bypassing the async machinery. On an async
    /// handle any pending kernel-cursor realignment is flushed first.
    pub fn write_sync(&self, data: &[u8]) -> Result<usize> {
        self.inner.write_sync_impl(data)
    }

    /// Read synchronously, bypassing the async machinery. Returns
    /// [`Error::Eof`] when zero bytes arrive for a nonzero request.
    pub fn read_sync(&self, data: &mut [u8]) -> Result<usize> {
        self.inner.read_sync_impl(data)
    }

    /// Poll the last async operation.
    ///
    /// Sync files report `Done` with zero bytes unconditionally. A negative
    /// kernel result surfaces as [`Error::Async`] carrying the errno.
    pub fn last_op(&self) -> Result<Completion> {
        self.inner.last_op_impl()
    }

    /// Recover the buffer of the last completed (or rejected) operation.
    ///
    /// Returns `None` while an operation is in flight. A buffer left
    /// unclaimed is dropped when the next submission completes.
    pub fn take_buffer(&self) -> Option<IoBuf> {
        self.inner.state.lock_ignore_poison().last.data.take()
    }

    /// Logical position, after draining any already-completed async result.
    /// Never blocks on an in-flight operation.
    pub fn pos(&self) -> u64 {
        if self.inner.mode == Mode::Async {
            let _ = self.inner.check_async_result();
        }
        self.inner.state.lock_ignore_poison().pos
    }

    /// Seek the handle and the logical position.
    ///
    /// In async mode an in-flight operation must have completed first;
    /// otherwise the call fails with [`Error::NotCompleted`]. Resets the
    /// last-operation tag.
    pub fn seek(&self, from: SeekFrom) -> Result<u64> {
        self.inner.seek_impl(from)
    }

    /// OS metadata for the file, available only while no async operation is
    /// outstanding.
    pub fn stat(&self) -> Result<fs::Metadata> {
        self.inner.check_async_result()?;
        {
            let state = self.inner.state.lock_ignore_poison();
            if !state.last.complete {
                return Err(Error::NotCompleted);
            }
        }
        Ok(self.inner.fd.metadata()?)
    }

    /// Close the handle.
    ///
    /// Drains any completed async result, then drops the handle's reference,
    /// which runs the explicit close (logging failures at `warn!`). The OS
    /// descriptor stays open only while an in-flight record still holds a
    /// reference, until its completion is harvested.
    pub fn close(self) -> Result<()> {
        if self.inner.mode == Mode::Async {
            let _ = self.inner.check_async_result();
        }
        drop(self.inner);
        Ok(())
    }

    fn rw_async(&self, op: Op, buf: IoBuf) -> Result<usize> {
        let inner = &self.inner;
        if let Err(err) = inner.check_async_result() {
            return inner.park(buf, err);
        }
        if buf.is_empty() {
            // Nothing to hand to the kernel; complete on the spot.
            let mut state = inner.state.lock_ignore_poison();
            state.last.op = op;
            state.last.complete = true;
            state.last.result = 0;
            state.last.eof = false;
            state.last.data = Some(buf);
            return Ok(0);
        }
        if inner.ctx.busy() {
            return inner.park(buf, Error::CtxBusy);
        }
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                inner.ctx.submit(inner, op, buf)?;
                Ok(0)
            } else {
                crate::backend::overlapped::submit_buf(inner, op, buf)
            }
        }
    }

    fn rw_sync_owned(&self, op: Op, mut buf: IoBuf) -> Result<usize> {
        let res = match op {
            Op::Write => self.inner.write_sync_impl(&buf),
            Op::Read => self.inner.read_sync_impl(&mut buf),
            Op::Unknown => Err(Error::UnknownOperation),
        };
        // Ownership always round-trips through the last-op slot.
        self.inner.state.lock_ignore_poison().last.data = Some(buf);
        res
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.inner.path)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

impl FileInner {
    /// Park a buffer whose submission was rejected so the caller can recover
    /// it with `take_buffer`, and fail with `err`.
    pub(crate) fn park<T>(&self, buf: IoBuf, err: Error) -> Result<T> {
        self.state.lock_ignore_poison().last.data = Some(buf);
        Err(err)
    }

    pub(crate) fn last_op_impl(&self) -> Result<Completion> {
        if self.mode == Mode::Sync {
            return Ok(Completion::Done { bytes: 0 });
        }
        match self.check_async_result() {
            Err(Error::NotCompleted) => return Ok(Completion::Pending),
            Err(Error::Eof) => return Ok(Completion::Eof),
            Err(err) => return Err(err),
            Ok(()) => {}
        }
        let state = self.state.lock_ignore_poison();
        if !state.last.complete {
            return Ok(Completion::Pending);
        }
        if state.last.eof {
            return Ok(Completion::Eof);
        }
        Ok(Completion::Done {
            bytes: state.last.result.max(0) as usize,
        })
    }

    /// The central state-machine step: discover whether the outstanding
    /// operation completed, harvesting the backend if necessary.
    #[cfg(unix)]
    pub(crate) fn check_async_result(&self) -> Result<()> {
        if self.mode == Mode::Sync {
            return Ok(());
        }
        {
            let state = self.state.lock_ignore_poison();
            if state.last.op == Op::Unknown {
                return Ok(());
            }
            if state.last.complete {
                return Self::completed_result(&state);
            }
        }
        // Harvest with the file lock released; the harvest path takes the
        // context lock first, then this file's lock.
        self.ctx.harvest()?;
        let state = self.state.lock_ignore_poison();
        if !state.last.complete {
            return Err(Error::NotCompleted);
        }
        Self::completed_result(&state)
    }

    #[cfg(unix)]
    fn completed_result(state: &FileState) -> Result<()> {
        if state.last.result < 0 {
            return Err(Error::Async(-state.last.result));
        }
        Ok(())
    }

    /// Windows flavor: completion state lives in the per-file `OVERLAPPED`
    /// blocks, so the poll happens here rather than in a context-wide
    /// harvest.
    #[cfg(windows)]
    pub(crate) fn check_async_result(&self) -> Result<()> {
        if self.mode == Mode::Sync {
            return Ok(());
        }
        let mut state = self.state.lock_ignore_poison();
        crate::backend::overlapped::poll(self, &mut state)?;
        if state.last.result < 0 {
            return Err(Error::Async(-state.last.result));
        }
        Ok(())
    }

    /// Realign the kernel cursor with the logical position before a
    /// synchronous call on an async handle.
    pub(crate) fn check_async_seek(&self) -> Result<()> {
        if let Err(Error::NotCompleted) = self.check_async_result() {
            return Err(Error::NotCompleted);
        }
        let mut state = self.state.lock_ignore_poison();
        if state.last_sync_seek {
            (&*self.fd).seek(SeekFrom::Start(state.pos))?;
            state.last_sync_seek = false;
        }
        Ok(())
    }

    fn seek_impl(&self, from: SeekFrom) -> Result<u64> {
        if self.mode == Mode::Sync {
            let end = (&*self.fd).seek(from)?;
            let mut state = self.state.lock_ignore_poison();
            state.pos = Self::resolve_pos(state.pos, from, end);
            return Ok(state.pos);
        }

        self.check_async_result()?;
        let mut state = self.state.lock_ignore_poison();
        if !state.last.complete {
            return Ok(state.pos);
        }
        let end = (&*self.fd).seek(from)?;
        state.pos = Self::resolve_pos(state.pos, from, end);
        state.last.op = Op::Unknown;
        Ok(state.pos)
    }

    /// The logical position moves per `whence`; only a seek-from-end takes
    /// the kernel's answer, since the kernel cursor does not track the
    /// logical position in async mode.
    fn resolve_pos(current: u64, from: SeekFrom, os_result: u64) -> u64 {
        match from {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => (current as i64 + delta).max(0) as u64,
            SeekFrom::End(_) => os_result,
        }
    }

    #[cfg(unix)]
    fn write_sync_impl(&self, data: &[u8]) -> Result<usize> {
        if self.mode == Mode::Async {
            self.check_async_seek()?;
        }
        if !self.ctx.use_blocking_path(data.len()) {
            let n = unsafe { libc::write(self.fd.as_raw_fd(), data.as_ptr().cast(), data.len()) };
            if n < 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
            let n = n as usize;
            self.state.lock_ignore_poison().pos += n as u64;
            if n != data.len() {
                return Err(Error::ShortWrite { written: n });
            }
            return Ok(n);
        }
        (&*self.fd).write_all(data)?;
        let mut state = self.state.lock_ignore_poison();
        state.pos += data.len() as u64;
        state.last.op = Op::Unknown;
        Ok(data.len())
    }

    #[cfg(unix)]
    fn read_sync_impl(&self, data: &mut [u8]) -> Result<usize> {
        if self.mode == Mode::Async {
            self.check_async_seek()?;
        }
        if !self.ctx.use_blocking_path(data.len()) {
            let n = unsafe { libc::read(self.fd.as_raw_fd(), data.as_mut_ptr().cast(), data.len()) };
            if n < 0 {
                return Err(Error::Io(std::io::Error::last_os_error()));
            }
            if n == 0 && !data.is_empty() {
                return Err(Error::Eof);
            }
            self.state.lock_ignore_poison().pos += n as u64;
            return Ok(n as usize);
        }
        let n = (&*self.fd).read(data)?;
        if n == 0 && !data.is_empty() {
            return Err(Error::Eof);
        }
        let mut state = self.state.lock_ignore_poison();
        state.pos += n as u64;
        state.last.op = Op::Unknown;
        Ok(n)
    }

    #[cfg(windows)]
    fn write_sync_impl(&self, data: &[u8]) -> Result<usize> {
        if self.mode == Mode::Async {
            self.check_async_seek()?;
            return self.rw_sync_overlapped(Op::Write, data.as_ptr() as *mut u8, data.len());
        }
        (&*self.fd).write_all(data)?;
        let mut state = self.state.lock_ignore_poison();
        state.pos += data.len() as u64;
        state.last.op = Op::Unknown;
        Ok(data.len())
    }

    #[cfg(windows)]
    fn read_sync_impl(&self, data: &mut [u8]) -> Result<usize> {
        if self.mode == Mode::Async {
            self.check_async_seek()?;
            return self.rw_sync_overlapped(Op::Read, data.as_mut_ptr(), data.len());
        }
        let n = (&*self.fd).read(data)?;
        if n == 0 && !data.is_empty() {
            return Err(Error::Eof);
        }
        let mut state = self.state.lock_ignore_poison();
        state.pos += n as u64;
        state.last.op = Op::Unknown;
        Ok(n)
    }

    /// Submit overlapped and block-spin until the completion lands: the
    /// synchronous surface over an overlapped handle.
    #[cfg(windows)]
    fn rw_sync_overlapped(&self, op: Op, ptr: *mut u8, len: usize) -> Result<usize> {
        self.check_async_result()?;
        crate::backend::overlapped::submit_slice(self, op, ptr, len)?;
        self.state.lock_ignore_poison().win.wait = true;

        let result = loop {
            match self.last_op_impl() {
                Ok(Completion::Pending) => std::thread::yield_now(),
                Ok(Completion::Done { bytes }) => break Ok(bytes),
                Ok(Completion::Eof) => break Err(Error::Eof),
                Err(err) => break Err(err),
            }
        };

        let mut state = self.state.lock_ignore_poison();
        state.win.wait = false;
        state.last.op = Op::Unknown;
        drop(state);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> Arc<Ctx> {
        Ctx::builder(8).build().expect("context")
    }

    fn scratch_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    #[test]
    fn sync_mode_round_trip_with_seek() {
        let ctx = test_ctx();
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("sync.bin"), Mode::Sync).expect("create");

        let payload: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(file.write_sync(&payload).expect("write"), 1024);
        assert_eq!(file.pos(), 1024);

        assert_eq!(file.seek(SeekFrom::Start(512)).expect("seek"), 512);
        let mut out = vec![0u8; 1024];
        let n = file.read_sync(&mut out).expect("read");
        assert_eq!(n, 512);
        assert_eq!(&out[..512], &payload[512..]);
        assert_eq!(file.pos(), 1024);

        assert!(matches!(
            file.read_sync(&mut out).unwrap_err(),
            Error::Eof
        ));
    }

    #[test]
    fn sync_read_on_empty_file_is_eof() {
        let ctx = test_ctx();
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("empty.bin"), Mode::Sync).expect("create");

        let mut out = vec![0u8; 128];
        assert!(matches!(file.read_sync(&mut out).unwrap_err(), Error::Eof));
        assert_eq!(file.pos(), 0);
    }

    #[test]
    fn sync_mode_last_op_is_always_done() {
        let ctx = test_ctx();
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("lastop.bin"), Mode::Sync).expect("create");
        assert_eq!(file.last_op().expect("last_op"), Completion::Done { bytes: 0 });
    }

    #[test]
    fn blocking_path_resets_the_operation_tag() {
        let ctx = Ctx::builder(8)
            .same_thread_limit(0)
            .build()
            .expect("context");
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("blocking.bin"), Mode::Sync).expect("create");

        assert_eq!(file.write_sync(b"through std").expect("write"), 11);
        assert_eq!(file.pos(), 11);
        assert_eq!(file.seek(SeekFrom::Start(0)).expect("seek"), 0);

        let mut out = vec![0u8; 11];
        assert_eq!(file.read_sync(&mut out).expect("read"), 11);
        assert_eq!(&out, b"through std");
    }

    #[test]
    fn owned_buffer_round_trips_through_take_buffer_in_sync_mode() {
        let ctx = test_ctx();
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("owned.bin"), Mode::Sync).expect("create");

        let mut buf = ctx.alloc_buf(16).expect("alloc");
        buf.copy_from_slice(b"0123456789abcdef");
        assert_eq!(file.write(buf).expect("write"), 16);

        let returned = file.take_buffer().expect("buffer returned");
        assert_eq!(&*returned, b"0123456789abcdef");
    }

    #[test]
    fn stat_reports_the_written_length() {
        let ctx = test_ctx();
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("stat.bin"), Mode::Sync).expect("create");
        file.write_sync(&[0xAA; 300]).expect("write");
        assert_eq!(file.stat().expect("stat").len(), 300);
    }

    #[test]
    fn seek_from_end_takes_the_kernel_answer() {
        let ctx = test_ctx();
        let dir = scratch_dir();
        let file = File::create(&ctx, dir.path().join("seek_end.bin"), Mode::Sync).expect("create");
        file.write_sync(&[1u8; 100]).expect("write");
        assert_eq!(file.seek(SeekFrom::End(-40)).expect("seek"), 60);
        assert_eq!(file.pos(), 60);
    }
}
