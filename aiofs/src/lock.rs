/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Mutex acquisition that survives poisoning.
//!
//! A panic while holding one of the engine locks leaves the protected state
//! consistent (every critical section writes complete records), so poisoning
//! is stripped instead of propagated.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) trait LockExt<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> LockExt<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
