/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Backend adapters translating the abstract submit/harvest contract into the
//! platform's kernel primitive.
//!
//! Exactly one adapter is active per context: `uring` or `aio` on Linux
//! (chosen at context creation), `posix` on the BSDs and Darwin, `overlapped`
//! on Windows. Adapters share two conventions: a submitted operation is
//! identified by a monotonically increasing 64-bit completion key carried in
//! the kernel's user-data slot, and the in-flight record owns the caller's
//! buffer (plus the kernel control block, where one exists) until harvest, so
//! every raw pointer handed to the kernel stays valid for the operation's
//! whole lifetime.

#[cfg(unix)]
use std::sync::Arc;

#[cfg(unix)]
use crate::{
    buffer::IoBuf,
    file::{FileInner, Op},
};

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub(crate) mod uring;
        pub(crate) mod aio;

        /// Kernel-side state of the selected Linux backend.
        pub(crate) enum Engine {
            Uring(io_uring::IoUring),
            Aio(aio::AioEngine),
        }

        /// Backend control block kept alive inside the in-flight record.
        pub(crate) enum Control {
            /// io_uring copies the SQE at submission; nothing to retain.
            Uring,
            /// The `iocb` registered with the kernel; must not move until the
            /// completion event has been reaped.
            Aio(Box<libc::iocb>),
        }
    } else if #[cfg(any(target_os = "macos", target_os = "freebsd"))] {
        pub(crate) mod posix;

        /// POSIX AIO keeps no process-wide kernel state.
        pub(crate) struct Engine;

        pub(crate) use posix::PinnedAiocb as Control;
    } else if #[cfg(windows)] {
        pub(crate) mod overlapped;

        /// Overlapped I/O keeps no process-wide kernel state; completion
        /// state lives in the per-file `OVERLAPPED` blocks.
        pub(crate) struct Engine;
    }
}

/// A submitted-but-not-yet-harvested operation.
///
/// Owning the buffer here is what makes the pinning contract hold: the caller
/// gave the buffer up at submission and can only get it back through
/// `File::take_buffer` after the completion has been recorded.
#[cfg(unix)]
pub(crate) struct InFlight {
    pub(crate) file: Arc<FileInner>,
    pub(crate) op: Op,
    pub(crate) buf: IoBuf,
    /// Absolute offset the operation was submitted at.
    pub(crate) offset: u64,
    pub(crate) ctl: Control,
}
