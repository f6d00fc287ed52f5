/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Raw Linux AIO: `io_setup`, `io_submit`, `io_getevents`, `io_destroy`.
//!
//! The kernel interface is consumed through `libc::syscall` since glibc does
//! not expose wrappers for the native (non-POSIX) AIO family. `libc` provides
//! the `iocb` control block; the completion record is mirrored here.

use std::{io, os::unix::io::RawFd};

/// Opaque kernel AIO context identifier produced by `io_setup`.
pub type AioContext = libc::c_ulong;

pub const IOCB_CMD_PREAD: u16 = 0;
pub const IOCB_CMD_PWRITE: u16 = 1;

/// Completion record filled by `io_getevents`. Mirrors the kernel's
/// `struct io_event`, which `libc` does not provide.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IoEvent {
    /// The `aio_data` field of the originating `iocb`.
    pub data: u64,
    /// Address of the originating `iocb`.
    pub obj: u64,
    /// Result code: transferred bytes, or a negated errno.
    pub res: i64,
    /// Secondary result.
    pub res2: i64,
}

/// Create a kernel AIO context able to hold `nr_events` in-flight operations.
pub fn io_setup(nr_events: usize) -> io::Result<AioContext> {
    let mut ctx: AioContext = 0;
    let ret = unsafe {
        libc::syscall(
            libc::SYS_io_setup,
            nr_events as libc::c_long,
            &mut ctx as *mut AioContext,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ctx)
}

/// Tear down a kernel AIO context. Teardown failures are logged; there is
/// nothing a caller could do with them.
pub fn io_destroy(ctx: AioContext) {
    let ret = unsafe { libc::syscall(libc::SYS_io_destroy, ctx) };
    if ret < 0 {
        tracing::warn!(error = %io::Error::last_os_error(), "io_destroy failed");
    }
}

/// Submit the given control blocks, returning how many the kernel accepted.
///
/// # Safety
///
/// Every `iocb` and the buffer it points at must stay valid (and must not
/// move) until the corresponding completion has been reaped with
/// [`io_getevents`].
pub unsafe fn io_submit(ctx: AioContext, iocbs: &mut [*mut libc::iocb]) -> io::Result<usize> {
    if iocbs.is_empty() {
        return Ok(0);
    }
    let ret = unsafe {
        libc::syscall(
            libc::SYS_io_submit,
            ctx,
            iocbs.len() as libc::c_long,
            iocbs.as_mut_ptr(),
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as usize)
}

/// Reap up to `events.len()` completions without blocking (zero timeout),
/// returning how many were written into `events`.
pub fn io_getevents(ctx: AioContext, min_nr: usize, events: &mut [IoEvent]) -> io::Result<usize> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let ret = unsafe {
        libc::syscall(
            libc::SYS_io_getevents,
            ctx,
            min_nr as libc::c_long,
            events.len() as libc::c_long,
            events.as_mut_ptr(),
            &mut ts as *mut libc::timespec,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as usize)
}

/// Populate a control block for a positional read or write.
///
/// `data` is echoed back verbatim in [`IoEvent::data`], which the engine uses
/// as the completion key.
pub fn prep_rw(
    opcode: u16,
    fd: RawFd,
    buf: *mut u8,
    len: usize,
    offset: i64,
    data: u64,
) -> libc::iocb {
    let mut cb: libc::iocb = unsafe { std::mem::zeroed() };
    cb.aio_data = data;
    cb.aio_lio_opcode = opcode;
    cb.aio_fildes = fd as u32;
    cb.aio_buf = buf as u64;
    cb.aio_nbytes = len as u64;
    cb.aio_offset = offset;
    cb
}
