/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Diagnostic subscriber for binaries and tests embedding the engine.

use tracing::Subscriber;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, MakeWriter},
    prelude::*,
    EnvFilter,
};

/// Build the engine's diagnostic subscriber writing through `writer`:
/// target-annotated events, filtered by `RUST_LOG` and defaulting to the
/// `info` level when the variable is unset.
///
/// One builder serves both deployment shapes (import
/// `tracing_subscriber::prelude::*` for the installers):
/// a binary installs it globally with `subscriber(std::io::stdout).init()`,
/// while a test scopes it to its own thread by holding the guard from
/// `subscriber(fmt::TestWriter::default()).set_default()`.
pub fn subscriber<W>(writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(fmt::layer().with_target(true).with_writer(writer))
}
