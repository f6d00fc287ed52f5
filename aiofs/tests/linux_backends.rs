/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Backend-specific properties only observable on Linux: the io_uring
//! queue-depth bound and the kernel-AIO alignment contract.

#![cfg(target_os = "linux")]

use std::time::{Duration, Instant};

use aiofs::{Backend, Completion, Ctx, Error, File, Mode};

fn scratch_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("aiofs-linux")
        .tempdir_in(env!("CARGO_TARGET_TMPDIR"))
        .expect("temp dir under the target directory")
}

fn wait_complete(file: &File) -> Completion {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match file.last_op().expect("last_op") {
            Completion::Pending => {
                assert!(
                    Instant::now() < deadline,
                    "async operation did not complete in time"
                );
                std::thread::yield_now();
            }
            done => return done,
        }
    }
}

#[test]
fn uring_queue_depth_is_enforced() {
    // Hosts without io_uring (seccomp-filtered containers, old kernels)
    // cannot exercise this property.
    let Ok(ctx) = Ctx::builder(8).backend(Backend::IoUring).build() else {
        return;
    };
    let dir = scratch_dir();

    let mut files = Vec::new();
    for i in 0..8 {
        let file = File::create(&ctx, dir.path().join(format!("slot_{i}.bin")), Mode::Async)
            .expect("create");
        let mut buf = ctx.alloc_buf(4096).expect("alloc_buf");
        buf.copy_from_slice(&[i as u8; 4096]);
        assert_eq!(file.write(buf).expect("write"), 0);
        files.push(file);
    }
    assert!(ctx.busy());

    // The ninth submission finds every slot taken.
    let ninth = File::create(&ctx, dir.path().join("ninth.bin"), Mode::Async).expect("create");
    let buf = ctx.alloc_buf(4096).expect("alloc_buf");
    match ninth.write(buf) {
        Err(Error::CtxBusy) => {}
        other => panic!("expected CtxBusy, got {other:?}"),
    }
    let parked = ninth.take_buffer().expect("rejected buffer parked");
    assert_eq!(parked.len(), 4096);

    // One harvested completion frees a slot.
    assert_eq!(wait_complete(&files[0]), Completion::Done { bytes: 4096 });
    assert!(!ctx.busy());
    assert_eq!(ninth.write(parked).expect("write after harvest"), 0);
    assert_eq!(wait_complete(&ninth), Completion::Done { bytes: 4096 });

    for file in &files {
        assert_eq!(wait_complete(file), Completion::Done { bytes: 4096 });
    }
}

#[test]
fn aio_rejects_unaligned_lengths_without_side_effects() {
    let ctx = Ctx::builder(8)
        .backend(Backend::Aio)
        .build()
        .expect("kernel AIO context");
    assert_eq!(ctx.align(), 512);

    let dir = scratch_dir();
    let file = File::create(&ctx, dir.path().join("unaligned.bin"), Mode::Async).expect("create");

    // A 4095-byte transfer violates the length contract.
    let odd = aiofs::IoBuf::alloc(4095, 512).expect("alloc");
    match file.write(odd) {
        Err(Error::UnalignedData) => {}
        other => panic!("expected UnalignedData, got {other:?}"),
    }
    let parked = file.take_buffer().expect("rejected buffer parked");
    assert_eq!(parked.len(), 4095);

    // The failed submission left no operation behind: an aligned write is
    // accepted and completes.
    let mut buf = ctx.alloc_buf(4096).expect("alloc_buf");
    buf.copy_from_slice(&[0x5A; 4096]);
    assert_eq!(file.write(buf).expect("aligned write"), 0);
    assert_eq!(wait_complete(&file), Completion::Done { bytes: 4096 });
    assert_eq!(file.pos(), 4096);
}

#[test]
fn aio_round_trip_with_direct_io() {
    let ctx = Ctx::builder(8)
        .backend(Backend::Aio)
        .build()
        .expect("kernel AIO context");
    let dir = scratch_dir();
    let file = File::create(&ctx, dir.path().join("aio_round_trip.bin"), Mode::Async)
        .expect("create");

    let mut buf = ctx.alloc_buf(2048).expect("alloc_buf");
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }
    let expected: Vec<u8> = (0..2048).map(|i| (i % 256) as u8).collect();

    file.write(buf).expect("write");
    assert_eq!(wait_complete(&file), Completion::Done { bytes: 2048 });
    file.take_buffer();

    assert_eq!(file.seek(std::io::SeekFrom::Start(0)).expect("seek"), 0);
    let out = ctx.alloc_buf(2048).expect("alloc_buf");
    file.read(out).expect("read");
    assert_eq!(wait_complete(&file), Completion::Done { bytes: 2048 });
    let out = file.take_buffer().expect("buffer");
    assert_eq!(&*out, &expected[..]);
}
