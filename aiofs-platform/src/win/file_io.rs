/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Unsafe wrappers around the overlapped flavors of `ReadFile`, `WriteFile`
//! and `GetOverlappedResult`.
//!
//! The wrappers translate the Win32 return-value/`GetLastError` protocol into
//! Rust enums so the engine can pattern-match on the three interesting
//! outcomes (completed synchronously, still pending, end of file) and treat
//! everything else as an `io::Error`.

use std::{io, os::windows::io::RawHandle, ptr};

use windows_sys::Win32::{
    Foundation::{
        CloseHandle, GetLastError, ERROR_HANDLE_EOF, ERROR_IO_INCOMPLETE, ERROR_IO_PENDING,
        HANDLE,
    },
    Storage::FileSystem::{ReadFile, WriteFile},
    System::IO::GetOverlappedResult,
};

use super::{DWORD, OVERLAPPED};

/// Outcome of queueing an overlapped read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwOutcome {
    /// The kernel finished the transfer before returning; the byte count was
    /// written through the `transferred` out-parameter.
    Completed,
    /// The operation was queued and is outstanding.
    Pending,
    /// The read started at or past end of file.
    Eof,
}

/// Outcome of polling an outstanding overlapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The operation finished; the byte count was written through the
    /// `transferred` out-parameter.
    Done,
    /// Still in flight.
    Pending,
    /// The operation hit end of file.
    Eof,
}

/// Zero `ov` and fill its offset pair from a 64-bit file position.
///
/// # Safety
///
/// `ov` must point at a writable `OVERLAPPED` block that is not currently in
/// use by an outstanding operation.
pub unsafe fn prep_overlapped(ov: *mut OVERLAPPED, offset: u64) {
    unsafe {
        ptr::write(ov, std::mem::zeroed());
        (*ov).Anonymous.Anonymous.Offset = offset as u32;
        (*ov).Anonymous.Anonymous.OffsetHigh = (offset >> 32) as u32;
    }
}

/// Queue an overlapped read of `len` bytes into `buf`.
///
/// # Safety
///
/// The buffer and the `OVERLAPPED` block must stay valid and unmodified until
/// the operation completes (observed through [`get_overlapped_result`]), and
/// `handle` must have been opened with `FILE_FLAG_OVERLAPPED`.
pub unsafe fn read_file(
    handle: RawHandle,
    buf: *mut u8,
    len: DWORD,
    transferred: &mut DWORD,
    ov: *mut OVERLAPPED,
) -> io::Result<RwOutcome> {
    let ok = unsafe { ReadFile(handle as HANDLE, buf, len, transferred, ov) };
    if ok != 0 {
        return Ok(RwOutcome::Completed);
    }
    match unsafe { GetLastError() } {
        ERROR_IO_PENDING => Ok(RwOutcome::Pending),
        ERROR_HANDLE_EOF => Ok(RwOutcome::Eof),
        error => Err(io::Error::from_raw_os_error(error as i32)),
    }
}

/// Queue an overlapped write of `len` bytes from `buf`.
///
/// # Safety
///
/// Same contract as [`read_file`].
pub unsafe fn write_file(
    handle: RawHandle,
    buf: *const u8,
    len: DWORD,
    transferred: &mut DWORD,
    ov: *mut OVERLAPPED,
) -> io::Result<RwOutcome> {
    let ok = unsafe { WriteFile(handle as HANDLE, buf, len, transferred, ov) };
    if ok != 0 {
        return Ok(RwOutcome::Completed);
    }
    match unsafe { GetLastError() } {
        ERROR_IO_PENDING => Ok(RwOutcome::Pending),
        ERROR_HANDLE_EOF => Ok(RwOutcome::Eof),
        error => Err(io::Error::from_raw_os_error(error as i32)),
    }
}

/// Poll (or, with `wait`, block on) an outstanding overlapped operation.
///
/// `ERROR_IO_INCOMPLETE` is the documented status for a still-running
/// operation polled without waiting; `ERROR_IO_PENDING` is accepted as well
/// since older kernels have been observed returning it here.
///
/// # Safety
///
/// `ov` must be the same `OVERLAPPED` block that was passed to [`read_file`]
/// or [`write_file`] on `handle`, still pinned in place.
pub unsafe fn get_overlapped_result(
    handle: RawHandle,
    ov: *mut OVERLAPPED,
    transferred: &mut DWORD,
    wait: bool,
) -> io::Result<PollStatus> {
    let ok = unsafe {
        GetOverlappedResult(handle as HANDLE, ov, transferred, if wait { 1 } else { 0 })
    };
    if ok != 0 {
        return Ok(PollStatus::Done);
    }
    match unsafe { GetLastError() } {
        ERROR_IO_PENDING | ERROR_IO_INCOMPLETE => Ok(PollStatus::Pending),
        ERROR_HANDLE_EOF => Ok(PollStatus::Eof),
        error => Err(io::Error::from_raw_os_error(error as i32)),
    }
}

/// Close a native handle, surfacing the failure instead of swallowing it.
///
/// # Safety
///
/// `handle` must be a valid open handle owned by the caller, with no
/// operation outstanding on it; it must not be used after this call.
pub unsafe fn close_handle(handle: RawHandle) -> io::Result<()> {
    if unsafe { CloseHandle(handle as HANDLE) } == 0 {
        let error = unsafe { GetLastError() };
        return Err(io::Error::from_raw_os_error(error as i32));
    }
    Ok(())
}
