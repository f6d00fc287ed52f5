/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Error type shared by the whole engine.

use std::io;

use thiserror::Error;

/// Convenience alias for a `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors fall into three bands: configuration/precondition failures the
/// caller can fix (`NotSupported`, `BadSize`, `UnknownOperation`,
/// `UnalignedData`), transient state the caller retries
/// (`NotCompleted`, `CtxBusy`, `ShortWrite`), and kernel or I/O outcomes
/// reported verbatim. Nothing is retried or recovered internally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The file's outstanding async operation has not completed yet.
    #[error("operation isn't completed")]
    NotCompleted,

    /// The context cannot accept another submission right now.
    #[error("context is busy")]
    CtxBusy,

    /// An operation code other than read or write reached a backend.
    #[error("unknown operation")]
    UnknownOperation,

    /// The kernel accepted fewer AIO control blocks than were submitted.
    #[error("failed aio submit")]
    NotSubmittedAio,

    /// A POSIX AIO completion could not be harvested.
    #[error("aio error")]
    AioError,

    /// No free submission-queue entry was available for the operation.
    #[error("failed io_uring submit")]
    NotSubmittedIoUring,

    /// The requested backend (or mode) does not exist on this host.
    #[error("not supported")]
    NotSupported,

    /// The requested behavior is recognized but not provided.
    #[error("not implemented")]
    NotImplemented,

    /// A read returned zero bytes for a nonzero request.
    #[error("end of file")]
    Eof,

    /// Buffer address or length violates the backend's alignment contract.
    #[error("data is unaligned")]
    UnalignedData,

    /// A size parameter that must be a positive power of two was not.
    #[error("size is not a positive power of two")]
    BadSize,

    /// Prepared submission-queue entries were not consumed by the kernel.
    #[error("no submission queue entries were handed to the kernel")]
    FailedSq,

    /// A synchronous write stopped short; the position has advanced by
    /// `written`.
    #[error("short write ({written} bytes)")]
    ShortWrite {
        /// Bytes actually written before the transfer stopped.
        written: usize,
    },

    /// An asynchronous operation completed with a kernel error.
    #[error("async error: {0}")]
    Async(i64),

    /// An operating-system error outside the categories above.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error only means "poll again later".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NotCompleted | Error::CtxBusy | Error::ShortWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_band() {
        assert!(Error::NotCompleted.is_transient());
        assert!(Error::CtxBusy.is_transient());
        assert!(Error::ShortWrite { written: 3 }.is_transient());
        assert!(!Error::Eof.is_transient());
        assert!(!Error::UnalignedData.is_transient());
    }

    #[test]
    fn async_error_formats_the_errno() {
        assert_eq!(Error::Async(5).to_string(), "async error: 5");
    }
}
