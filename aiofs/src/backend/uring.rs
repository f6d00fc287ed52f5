/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! io_uring adapter.
//!
//! Ring setup and the shared SQ/CQ/SQE mappings come from the `io-uring`
//! crate (the setup syscall collapses the SQ and CQ mappings on kernels that
//! advertise single-mmap; the crate handles both layouts). Submission pushes
//! one SQE under the context lock and rings the `io_uring_enter` doorbell
//! after the lock is released; harvest drains the completion queue and
//! applies each CQE to its file through the completion-key table.

use std::{os::unix::io::AsRawFd, sync::Arc};

use io_uring::{opcode, types, IoUring};

use crate::{
    backend::{Control, Engine, InFlight},
    buffer::IoBuf,
    ctx::{Ctx, CtxInner},
    error::{Error, Result},
    file::{FileInner, Op},
    lock::LockExt,
};

/// Create a ring with `entries` submission slots.
///
/// The queue depth must be a positive power of two; the kernel would silently
/// round odd values up, which would let more operations in flight than the
/// context accounts for.
pub(crate) fn init(entries: usize) -> Result<IoUring> {
    if entries == 0 || !entries.is_power_of_two() {
        return Err(Error::BadSize);
    }
    let entries = u32::try_from(entries).map_err(|_| Error::BadSize)?;
    IoUring::new(entries).map_err(|err| {
        if err.raw_os_error() == Some(libc::ENOSYS) {
            Error::NotSupported
        } else {
            Error::Io(err)
        }
    })
}

pub(crate) fn submit(ctx: &Ctx, file: &Arc<FileInner>, op: Op, mut buf: IoBuf) -> Result<()> {
    let len = match u32::try_from(buf.len()) {
        Ok(len) => len,
        Err(_) => return file.park(buf, Error::BadSize),
    };
    let id = ctx.next_id();
    let fd = file.fd.as_raw_fd();

    let mut inner = ctx.lock_inner();
    let CtxInner {
        engine,
        current,
        ops,
    } = &mut *inner;
    let Engine::Uring(ring) = engine else {
        drop(inner);
        return file.park(buf, Error::NotSupported);
    };
    if *current >= ctx.queue_depth() {
        drop(inner);
        return file.park(buf, Error::CtxBusy);
    }

    let mut state = file.state.lock_ignore_poison();
    let offset = state.pos;
    let entry = match op {
        Op::Read => opcode::Read::new(types::Fd(fd), buf.as_mut_ptr(), len)
            .offset(offset)
            .build()
            .user_data(id),
        Op::Write => opcode::Write::new(types::Fd(fd), buf.as_ptr(), len)
            .offset(offset)
            .build()
            .user_data(id),
        Op::Unknown => {
            drop(state);
            drop(inner);
            return file.park(buf, Error::UnknownOperation);
        }
    };
    if unsafe { ring.submission().push(&entry) }.is_err() {
        drop(state);
        drop(inner);
        return file.park(buf, Error::NotSubmittedIoUring);
    }
    state.last_sync_seek = true;
    state.last.op = op;
    state.last.complete = false;
    state.last.eof = false;
    state.last.result = 0;
    drop(state);

    *current += 1;
    ops.insert(
        id,
        InFlight {
            file: Arc::clone(file),
            op,
            buf,
            offset,
            ctl: Control::Uring,
        },
    );
    let ring_fd = ring.as_raw_fd();
    drop(inner);

    // Doorbell outside the context lock; the SQE was already published.
    //
    // On doorbell failure the operation stays registered: the SQE sits in
    // the shared ring and any later doorbell may still hand it to the
    // kernel, so the record (and its buffer) must stay pinned until a
    // harvest observes the completion.
    match aiofs_platform::io_uring_enter(ring_fd, 1) {
        Ok(0) => Err(Error::FailedSq),
        Ok(_) => Ok(()),
        Err(err) => Err(Error::Io(err)),
    }
}

pub(crate) fn harvest(ctx: &Ctx, inner: &mut CtxInner) -> Result<()> {
    let CtxInner {
        engine,
        current,
        ops,
    } = inner;
    let Engine::Uring(ring) = engine else {
        return Err(Error::NotSupported);
    };

    let cq = ring.completion();
    let overflow = cq.overflow();
    if overflow > 0 {
        ctx.note_cq_overflow(u64::from(overflow));
    }
    for cqe in cq {
        let Some(rec) = ops.remove(&cqe.user_data()) else {
            continue;
        };
        *current = current.saturating_sub(1);
        let res = cqe.result();

        let mut state = rec.file.state.lock_ignore_poison();
        if rec.op == Op::Read {
            state.last.eof = !rec.buf.is_empty() && res == 0;
        }
        state.last.result = i64::from(res);
        if res >= 0 {
            // The SQE carried an absolute offset; the CQE result is relative.
            state.pos += res as u64;
        }
        state.last.complete = true;
        state.last.data = Some(rec.buf);
    }
    Ok(())
}
