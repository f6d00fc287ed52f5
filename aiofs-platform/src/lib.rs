/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

//! Raw kernel primitives behind the portable `aiofs` engine.
//!
//! Each platform family gets one module wrapping the kernel's async file-I/O
//! mechanism at the syscall boundary: Linux AIO (`io_submit`/`io_getevents`)
//! and the `io_uring_enter` doorbell on Linux, POSIX AIO on the BSDs and
//! Darwin, and overlapped `ReadFile`/`WriteFile` on Windows. Everything here
//! is mechanism only; queueing policy, position tracking and completion
//! bookkeeping live in the `aiofs` crate.

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod linux;
        pub use linux::*;
    } else if #[cfg(any(target_os = "macos", target_os = "freebsd"))] {
        pub mod bsd;
        pub use bsd::*;
    } else if #[cfg(windows)] {
        pub mod win;
        pub use win::*;
    }
}
