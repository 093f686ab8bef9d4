#![no_main]
use libfuzzer_sys::fuzz_target;
use udpmeter::SequenceTracker;

fuzz_target!(|data: &[u8]| {
    let mut tracker = SequenceTracker::new();
    for chunk in data.chunks(2) {
        let seq = chunk.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        tracker.observe(seq);
    }
    let snap = tracker.snapshot();
    assert!(snap.received <= snap.expected);
    assert_eq!(snap.received + snap.missing, snap.expected);
    assert!(snap.loss_percent >= 0.0 && snap.loss_percent <= 100.0);
});
