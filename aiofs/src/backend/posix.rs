/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! POSIX AIO adapter for the BSDs and Darwin.
//!
//! The kernel identifies an operation by the address of its `aiocb`, so the
//! control block is boxed and kept inside the in-flight record. There is no
//! completion queue to drain: harvest walks the table and asks `aio_error`
//! about each outstanding block, reaping finished ones with `aio_return`.

use std::{os::unix::io::AsRawFd, sync::Arc};

use crate::{
    backend::InFlight,
    buffer::IoBuf,
    ctx::{Ctx, CtxInner},
    error::{Error, Result},
    file::{FileInner, Op},
    lock::LockExt,
};

/// A heap-pinned `aiocb`. The raw buffer pointer inside is only dereferenced
/// by the kernel while the surrounding in-flight record owns the buffer.
pub(crate) struct PinnedAiocb(Box<libc::aiocb>);

unsafe impl Send for PinnedAiocb {}

impl PinnedAiocb {
    fn as_mut_ptr(&mut self) -> *mut libc::aiocb {
        &mut *self.0
    }
}

pub(crate) fn submit(ctx: &Ctx, file: &Arc<FileInner>, op: Op, mut buf: IoBuf) -> Result<()> {
    let id = ctx.next_id();
    let fd = file.fd.as_raw_fd();

    // The file lock is taken before any per-file state is touched, including
    // the sync-seek flag.
    let mut state = file.state.lock_ignore_poison();
    let offset = state.pos;
    let mut cb = aiofs_platform::new_aiocb(fd, buf.as_mut_ptr(), buf.len(), offset as i64);
    let cb_ptr: *mut libc::aiocb = &mut *cb;
    let queued = match op {
        Op::Read => unsafe { aiofs_platform::aio_read(cb_ptr) },
        Op::Write => unsafe { aiofs_platform::aio_write(cb_ptr) },
        Op::Unknown => {
            drop(state);
            return file.park(buf, Error::UnknownOperation);
        }
    };
    if queued.is_err() {
        drop(state);
        return file.park(buf, Error::NotSubmittedAio);
    }
    state.last_sync_seek = true;
    state.last.op = op;
    state.last.complete = false;
    state.last.eof = false;
    state.last.result = 0;
    drop(state);

    ctx.lock_inner().ops.insert(
        id,
        InFlight {
            file: Arc::clone(file),
            op,
            buf,
            offset,
            ctl: PinnedAiocb(cb),
        },
    );
    Ok(())
}

pub(crate) fn harvest(inner: &mut CtxInner) -> Result<()> {
    let CtxInner { ops, .. } = inner;
    if ops.is_empty() {
        return Ok(());
    }

    let mut ready = Vec::new();
    for (id, rec) in ops.iter_mut() {
        match unsafe { aiofs_platform::aio_error(rec.ctl.as_mut_ptr()) } {
            libc::EINPROGRESS => continue,
            0 => ready.push(*id),
            // Any other status fails the harvest pass; the mapping entries
            // remain until a later pass succeeds.
            _ => return Err(Error::AioError),
        }
    }

    for id in ready {
        let Some(mut rec) = ops.remove(&id) else {
            continue;
        };
        let ret = unsafe { aiofs_platform::aio_return(rec.ctl.as_mut_ptr()) };
        if ret < 0 {
            ops.insert(id, rec);
            return Err(Error::AioError);
        }
        let mut state = rec.file.state.lock_ignore_poison();
        if rec.op == Op::Read {
            state.last.eof = !rec.buf.is_empty() && ret == 0;
        }
        state.last.result = ret as i64;
        state.pos = rec.offset + ret as u64;
        state.last.complete = true;
        state.last.data = Some(rec.buf);
        // Dropping the record frees the aiocb.
    }
    Ok(())
}
