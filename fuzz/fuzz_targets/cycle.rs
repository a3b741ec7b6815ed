#![no_main]
use callfilter::{Direction, FilterParams, filter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let chunk_size = 1 + u16::from_le_bytes([data[0], data[1]]) as usize;
    let len = data[2] as usize * 64 + data.len();
    let original = callfilter::instructions::call_heavy(&data[3..], len);

    let params = FilterParams::new(chunk_size, None).unwrap();
    let mut buf = original.clone();
    filter(&mut buf, Direction::Forward, &params).unwrap();
    filter(&mut buf, Direction::Inverse, &params).unwrap();
    assert_eq!(buf, original);
});
