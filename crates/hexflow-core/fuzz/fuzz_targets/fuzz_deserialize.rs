#![no_main]
use hexflow_core::engine::Engine;
use hexflow_core::serialize::read_snapshot_header;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode to an error, never a panic.
    let _ = read_snapshot_header(data);
    if let Ok(mut engine) = Engine::deserialize(data) {
        engine.step();
    }
});
