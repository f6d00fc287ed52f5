/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub use aio::{
    io_destroy, io_getevents, io_setup, io_submit, prep_rw, AioContext, IoEvent, IOCB_CMD_PREAD,
    IOCB_CMD_PWRITE,
};
pub use uring::io_uring_enter;

mod aio;
mod uring;
