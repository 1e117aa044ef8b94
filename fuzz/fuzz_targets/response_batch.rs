//! Fuzz target for response batch decoding and settlement.
//!
//! Decoding arbitrary bursts must never panic, and the settled payload is
//! always a slice of the burst itself.

#![no_main]

use elaphure_core::relay::settle;
use elaphure_proto::ResponseBatch;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((count, burst)) = data.split_first() else {
        return;
    };

    let Ok(batch) = ResponseBatch::decode(burst) else {
        return;
    };

    let outcome = settle(&batch, u32::from(*count));
    assert!(outcome.payload.len() <= burst.len());
    if !outcome.payload.is_empty() {
        let start = outcome.payload.as_ptr() as usize - burst.as_ptr() as usize;
        assert_eq!(&burst[start..start + outcome.payload.len()], outcome.payload);
    }
});
