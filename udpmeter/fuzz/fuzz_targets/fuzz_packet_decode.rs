#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(seq) = udpmeter::packet::decode(data) {
        // Anything accepted must be reproducible by the encoder.
        let prefix = udpmeter::packet::prefix_len(seq);
        assert_eq!(udpmeter::packet::decode(&udpmeter::packet::encode(seq, prefix).unwrap()), Ok(seq));
    }
});
