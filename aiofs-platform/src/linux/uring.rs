/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The `io_uring_enter` doorbell.
//!
//! Ring setup and the shared SQ/CQ/SQE mappings are managed by the `io-uring`
//! crate. The engine still rings the doorbell through this raw wrapper so the
//! syscall can be issued on the ring's file descriptor after the context lock
//! has been released.

use std::{io, os::unix::io::RawFd, ptr};

/// Hand `to_submit` prepared submission-queue entries to the kernel.
///
/// Returns the number of entries the kernel consumed. Does not wait for
/// completions (`min_complete` is zero and no flags are set).
pub fn io_uring_enter(fd: RawFd, to_submit: u32) -> io::Result<u32> {
    let ret = unsafe {
        libc::syscall(
            libc::SYS_io_uring_enter,
            fd as libc::c_long,
            to_submit as libc::c_long,
            0 as libc::c_long,
            0 as libc::c_long,
            ptr::null::<libc::sigset_t>(),
            0 as libc::c_long,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as u32)
}
