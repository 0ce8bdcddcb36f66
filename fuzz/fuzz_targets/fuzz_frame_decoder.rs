//! Fuzz target: `FrameDecoder::feed` and `WireEvent::from_json`
//!
//! Drives arbitrary byte sequences from the classifier peer into the
//! streaming frame decoder and parses every delivered payload as an
//! event. Neither may panic, and every payload must respect the frame
//! bounds.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use sorter::rpc::codec::{FrameDecoder, MAX_FRAME_SIZE};
use sorter::rpc::wire::WireEvent;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    let mut seen = 0;
    let delivered = decoder.feed(data, |payload| {
        assert!(payload.len() <= MAX_FRAME_SIZE, "payload exceeds MAX_FRAME_SIZE");
        assert!(!payload.is_empty(), "decoder must not yield empty payload");
        if let Ok(WireEvent::Classified { data, .. }) = WireEvent::from_json(payload) {
            let _ = data.to_label();
        }
        seen += 1;
    });
    assert_eq!(delivered, seen);

    // Split feeding must deliver the same number of frames.
    decoder.reset();
    let mid = data.len() / 2;
    let split = decoder.feed(&data[..mid], |_| {}) + decoder.feed(&data[mid..], |_| {});
    assert_eq!(split, delivered);
});
