/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Windows overlapped-I/O adapter.
//!
//! Unlike the Unix backends there is no process-wide completion source: each
//! file owns one `OVERLAPPED` block per direction, filled at submission and
//! polled with `GetOverlappedResult`. Harvest is therefore a per-file poll
//! driven by `check_async_result`, and the context's completion-key table is
//! not involved.

use std::os::windows::io::AsRawHandle;

use aiofs_platform::{PollStatus, RwOutcome, DWORD, OVERLAPPED};

use crate::{
    buffer::IoBuf,
    error::{Error, Result},
    file::{FileInner, FileState, Op},
    lock::LockExt,
};

/// Queue an owned buffer; the async path. On success the buffer is parked in
/// the per-file in-flight slot (or, for a synchronous completion, directly in
/// the last-op slot) and the call reports zero bytes per the async contract.
pub(crate) fn submit_buf(file: &FileInner, op: Op, mut buf: IoBuf) -> Result<usize> {
    let mut state = file.state.lock_ignore_poison();
    let ptr = buf.as_mut_ptr();
    let len = buf.len();
    match submit_inner(file, &mut state, op, ptr, len) {
        Ok(true) => {
            // Completed before ReadFile/WriteFile returned.
            state.last.data = Some(buf);
            Ok(0)
        }
        Ok(false) => {
            state.win.inflight = Some(buf);
            Ok(0)
        }
        Err(err) => {
            state.last.data = Some(buf);
            Err(err)
        }
    }
}

/// Queue a borrowed buffer; the sync-wrapping-async path. The caller blocks
/// on completion before its borrow ends, so no ownership transfer is needed.
pub(crate) fn submit_slice(file: &FileInner, op: Op, ptr: *mut u8, len: usize) -> Result<()> {
    let mut state = file.state.lock_ignore_poison();
    submit_inner(file, &mut state, op, ptr, len).map(|_| ())
}

/// Fill the direction's `OVERLAPPED` block and hand the transfer to the
/// kernel. Returns whether the operation completed synchronously.
fn submit_inner(
    file: &FileInner,
    state: &mut FileState,
    op: Op,
    ptr: *mut u8,
    len: usize,
) -> Result<bool> {
    let len32 = u32::try_from(len).map_err(|_| Error::BadSize)?;
    let handle = file.fd.as_raw_handle();

    state.win.wait = false;
    state.win.processed = 0;
    state.win.to_rw = len as u64;
    state.last_sync_seek = true;
    state.last.op = op;
    state.last.complete = false;
    state.last.eof = false;
    state.last.result = 0;

    let offset = state.pos;
    let ov: *mut OVERLAPPED = match op {
        Op::Read => state.win.read_ov.as_mut_ptr(),
        Op::Write => state.win.write_ov.as_mut_ptr(),
        Op::Unknown => {
            reset_idle(state);
            return Err(Error::UnknownOperation);
        }
    };
    unsafe { aiofs_platform::prep_overlapped(ov, offset) };

    let mut n: DWORD = 0;
    let outcome = match op {
        Op::Read => unsafe { aiofs_platform::read_file(handle, ptr, len32, &mut n, ov) },
        Op::Write => unsafe { aiofs_platform::write_file(handle, ptr, len32, &mut n, ov) },
        Op::Unknown => unreachable!("rejected above"),
    };

    match outcome {
        Ok(RwOutcome::Completed) => {
            state.win.processed = u64::from(n);
            state.last.complete = true;
            state.last.result = i64::from(n);
            state.last.eof = op == Op::Read && n == 0 && state.win.to_rw > 0;
            state.pos += u64::from(n);
            Ok(true)
        }
        Ok(RwOutcome::Pending) => Ok(false),
        Ok(RwOutcome::Eof) => {
            state.last.complete = true;
            state.last.result = 0;
            state.last.eof = true;
            Err(Error::Eof)
        }
        Err(err) => {
            reset_idle(state);
            Err(Error::Io(err))
        }
    }
}

fn reset_idle(state: &mut FileState) {
    state.last.complete = true;
    state.last.op = Op::Unknown;
    state.last.eof = false;
}

/// Poll (or block on, when the sync-wrapping-async path set `wait`) the
/// outstanding operation. Called with the file lock held; this is the Windows
/// flavor of harvest.
pub(crate) fn poll(file: &FileInner, state: &mut FileState) -> Result<()> {
    if state.last.complete {
        state.win.processed = 0;
        return Ok(());
    }
    let ov: *mut OVERLAPPED = match state.last.op {
        Op::Read => state.win.read_ov.as_mut_ptr(),
        Op::Write => state.win.write_ov.as_mut_ptr(),
        Op::Unknown => return Ok(()),
    };
    let wait = state.win.wait;
    let mut n: DWORD = 0;
    let status =
        unsafe { aiofs_platform::get_overlapped_result(file.fd.as_raw_handle(), ov, &mut n, wait) };
    state.win.processed += u64::from(n);

    match status {
        Ok(PollStatus::Pending) => Err(Error::NotCompleted),
        Ok(PollStatus::Done) => {
            state.last.complete = true;
            state.pos += state.win.processed;
            state.last.result = i64::from(n);
            state.last.eof = state.last.op == Op::Read && n == 0 && state.win.to_rw > 0;
            if let Some(buf) = state.win.inflight.take() {
                state.last.data = Some(buf);
            }
            Ok(())
        }
        Ok(PollStatus::Eof) => {
            state.last.complete = true;
            state.last.eof = true;
            if let Some(buf) = state.win.inflight.take() {
                state.last.data = Some(buf);
            }
            Err(Error::Eof)
        }
        Err(err) => {
            state.last.complete = true;
            if let Some(buf) = state.win.inflight.take() {
                state.last.data = Some(buf);
            }
            Err(Error::Io(err))
        }
    }
}
