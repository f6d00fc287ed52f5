/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Linux AIO adapter (`io_submit`/`io_getevents`).
//!
//! This backend requires `O_DIRECT` file handles, which makes the kernel's
//! 512-byte alignment contract binding: both the buffer address and the
//! transfer length must be multiples of the context alignment, checked before
//! any side effect. The completion key travels in `iocb.aio_data` and comes
//! back in the event's `data` field.

use std::{os::unix::io::AsRawFd, sync::Arc};

use aiofs_platform::{IoEvent, IOCB_CMD_PREAD, IOCB_CMD_PWRITE};

use crate::{
    backend::{Control, Engine, InFlight},
    buffer::IoBuf,
    ctx::{Ctx, CtxInner},
    error::{Error, Result},
    file::{FileInner, Op},
    lock::LockExt,
};

/// Alignment required by Linux AIO with `O_DIRECT`.
pub(crate) const ALIGN: usize = 512;

/// Largest number of completion events reaped per `io_getevents` call.
const HARVEST_BATCH: usize = 64;

pub(crate) struct AioEngine {
    pub(crate) id: aiofs_platform::AioContext,
}

impl Drop for AioEngine {
    fn drop(&mut self) {
        aiofs_platform::io_destroy(self.id);
    }
}

pub(crate) fn init(queue_depth: usize) -> Result<AioEngine> {
    let id = aiofs_platform::io_setup(queue_depth)?;
    Ok(AioEngine { id })
}

/// Both the buffer start and the transfer length must be multiples of
/// `align`.
pub(crate) fn check_alignment(addr: usize, len: usize, align: usize) -> Result<()> {
    if align > 1 && (addr % align != 0 || len % align != 0) {
        return Err(Error::UnalignedData);
    }
    Ok(())
}

pub(crate) fn submit(ctx: &Ctx, file: &Arc<FileInner>, op: Op, mut buf: IoBuf) -> Result<()> {
    if let Err(err) = check_alignment(buf.as_ptr() as usize, buf.len(), ctx.align()) {
        return file.park(buf, err);
    }
    let cmd = match op {
        Op::Read => IOCB_CMD_PREAD,
        Op::Write => IOCB_CMD_PWRITE,
        Op::Unknown => return file.park(buf, Error::UnknownOperation),
    };
    let id = ctx.next_id();
    let fd = file.fd.as_raw_fd();

    let mut inner = ctx.lock_inner();
    let CtxInner { engine, ops, .. } = &mut *inner;
    let Engine::Aio(aio) = engine else {
        drop(inner);
        return file.park(buf, Error::NotSupported);
    };
    let aio_id = aio.id;

    let mut state = file.state.lock_ignore_poison();
    let offset = state.pos;
    let mut iocb = Box::new(aiofs_platform::prep_rw(
        cmd,
        fd,
        buf.as_mut_ptr(),
        buf.len(),
        offset as i64,
        id,
    ));
    let iocb_ptr: *mut libc::iocb = &mut *iocb;
    state.last_sync_seek = true;
    state.last.op = op;
    state.last.complete = false;
    state.last.eof = false;
    state.last.result = 0;
    drop(state);

    ops.insert(
        id,
        InFlight {
            file: Arc::clone(file),
            op,
            buf,
            offset,
            ctl: Control::Aio(iocb),
        },
    );
    drop(inner);

    let mut ptrs = [iocb_ptr];
    match unsafe { aiofs_platform::io_submit(aio_id, &mut ptrs) } {
        Ok(1) => Ok(()),
        Ok(_) => {
            rollback(ctx, id);
            Err(Error::NotSubmittedAio)
        }
        Err(err) => {
            rollback(ctx, id);
            Err(Error::Io(err))
        }
    }
}

fn rollback(ctx: &Ctx, id: u64) {
    let mut inner = ctx.lock_inner();
    if let Some(rec) = inner.ops.remove(&id) {
        drop(inner);
        let mut state = rec.file.state.lock_ignore_poison();
        state.last.complete = true;
        state.last.op = Op::Unknown;
        state.last.eof = false;
        state.last.data = Some(rec.buf);
    }
}

pub(crate) fn harvest(ctx: &Ctx, inner: &mut CtxInner) -> Result<()> {
    let CtxInner { engine, ops, .. } = inner;
    let Engine::Aio(aio) = engine else {
        return Err(Error::NotSupported);
    };
    let batch = ctx.queue_depth().clamp(1, HARVEST_BATCH);

    loop {
        let mut events = vec![IoEvent::default(); batch];
        let n = aiofs_platform::io_getevents(aio.id, 1, &mut events)?;
        for event in &events[..n] {
            let Some(rec) = ops.remove(&event.data) else {
                continue;
            };
            let mut state = rec.file.state.lock_ignore_poison();
            if rec.op == Op::Read {
                state.last.eof = !rec.buf.is_empty() && event.res == 0;
            }
            state.last.result = event.res;
            if event.res >= 0 {
                // The iocb carried an absolute offset.
                state.pos = rec.offset + event.res as u64;
            }
            state.last.complete = true;
            state.last.data = Some(rec.buf);
            // Dropping the record also frees the registered iocb.
        }
        if n < batch {
            break;
        }
    }
    Ok(())
}
