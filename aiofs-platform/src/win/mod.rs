/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

pub use file_io::{
    close_handle, get_overlapped_result, prep_overlapped, read_file, write_file, PollStatus,
    RwOutcome,
};

mod file_io;

pub type DWORD = u32;
pub type OVERLAPPED = windows_sys::Win32::System::IO::OVERLAPPED;
pub const FILE_FLAG_OVERLAPPED: DWORD =
    windows_sys::Win32::Storage::FileSystem::FILE_FLAG_OVERLAPPED;
