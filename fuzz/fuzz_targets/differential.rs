#![no_main]

use libfuzzer_sys::fuzz_target;
use wasmkern_fuzzing::{assert_consistent, FuzzInput};

fuzz_target!(|input: FuzzInput| {
    assert_consistent(&input);
});
