/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub use aio::{aio_error, aio_read, aio_return, aio_write, new_aiocb};

mod aio;
