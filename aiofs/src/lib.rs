/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Poll-driven asynchronous file I/O over the kernel's native mechanisms.
//!
//! One [`Ctx`] per process selects a backend at creation: io_uring on Linux
//! (falling back to kernel AIO), POSIX AIO on the BSDs and Darwin, and
//! overlapped I/O on Windows. Files open in [`Mode::Sync`] or
//! [`Mode::Async`]; an async file carries at most one outstanding operation
//! and discovers its completion only when polled.
//!
//! ```no_run
//! use std::io::SeekFrom;
//!
//! use aiofs::{Completion, Ctx, File, Mode};
//!
//! fn main() -> aiofs::Result<()> {
//!     let ctx = Ctx::builder(64).build()?;
//!     let file = File::create(&ctx, "scratch.bin", Mode::Async)?;
//!
//!     let mut buf = ctx.alloc_buf(4096)?;
//!     buf.copy_from_slice(&[7u8; 4096]);
//!     file.write(buf)?;
//!
//!     loop {
//!         match file.last_op()? {
//!             Completion::Pending => std::thread::yield_now(),
//!             Completion::Done { bytes } => {
//!                 assert_eq!(bytes, 4096);
//!                 break;
//!             }
//!             Completion::Eof => unreachable!("writes do not hit EOF"),
//!         }
//!     }
//!
//!     let written = file.take_buffer().expect("buffer back after harvest");
//!     ctx.release_buf(written);
//!     file.seek(SeekFrom::Start(0))?;
//!     Ok(())
//! }
//! ```

pub use buffer::{BufPoller, BufReleaser, IoBuf};
pub use ctx::{Backend, Ctx, CtxBuilder};
pub use error::{Error, Result};
pub use file::{Completion, File, Mode, Op, OpenOptions};

mod backend;
pub mod buffer;
pub mod ctx;
pub mod error;
pub mod file;
mod lock;
pub mod logging;
