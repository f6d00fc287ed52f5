/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! POSIX AIO wrappers for the BSDs and Darwin.
//!
//! The control block is `libc::aiocb`; the kernel identifies an in-flight
//! operation by the block's address, so a block must live at a stable heap
//! address from submission until `aio_return` has been called.

use std::{io, os::unix::io::RawFd};

use libc::c_void;

/// Allocate a zeroed control block describing a positional read or write of
/// `len` bytes at `offset`.
pub fn new_aiocb(fd: RawFd, buf: *mut u8, len: usize, offset: i64) -> Box<libc::aiocb> {
    let mut cb: Box<libc::aiocb> = Box::new(unsafe { std::mem::zeroed() });
    cb.aio_fildes = fd;
    cb.aio_buf = buf as *mut c_void;
    cb.aio_nbytes = len;
    cb.aio_offset = offset;
    cb
}

/// Queue an asynchronous read described by `cb`.
///
/// # Safety
///
/// `cb` and the buffer it points at must stay valid and immovable until the
/// operation has completed and [`aio_return`] has been called.
pub unsafe fn aio_read(cb: *mut libc::aiocb) -> io::Result<()> {
    if unsafe { libc::aio_read(cb) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Queue an asynchronous write described by `cb`.
///
/// # Safety
///
/// Same contract as [`aio_read`].
pub unsafe fn aio_write(cb: *mut libc::aiocb) -> io::Result<()> {
    if unsafe { libc::aio_write(cb) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Completion status of the operation described by `cb`: `EINPROGRESS` while
/// pending, `0` on success, an errno value on failure, or `-1` if `cb` does
/// not describe a queued operation.
///
/// # Safety
///
/// `cb` must point at a control block previously queued with [`aio_read`] or
/// [`aio_write`] and not yet reaped with [`aio_return`].
pub unsafe fn aio_error(cb: *mut libc::aiocb) -> libc::c_int {
    unsafe { libc::aio_error(cb) }
}

/// Reap a completed operation, returning the transferred byte count. May be
/// called exactly once per completed control block.
///
/// # Safety
///
/// `cb` must point at a control block whose [`aio_error`] status is no longer
/// `EINPROGRESS`.
pub unsafe fn aio_return(cb: *mut libc::aiocb) -> isize {
    unsafe { libc::aio_return(cb) as isize }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    use super::*;

    #[test]
    fn read_round_trip() {
        let mut tmp = tempfile::NamedTempFile::new().expect("temp file");
        tmp.write_all(b"posix aio payload").expect("write");
        tmp.flush().expect("flush");

        let file = tmp.reopen().expect("reopen");
        let mut buf = vec![0u8; 17];
        let mut cb = new_aiocb(file.as_raw_fd(), buf.as_mut_ptr(), buf.len(), 0);
        unsafe { aio_read(&mut *cb) }.expect("aio_read");

        loop {
            match unsafe { aio_error(&mut *cb) } {
                libc::EINPROGRESS => std::thread::yield_now(),
                0 => break,
                other => panic!("aio_error returned {other}"),
            }
        }

        let n = unsafe { aio_return(&mut *cb) };
        assert_eq!(n, 17);
        assert_eq!(&buf, b"posix aio payload");
    }
}
