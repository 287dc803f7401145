#![no_main]

use libfuzzer_sys::fuzz_target;
use wasmkern::{BoundsCheck, DispatchStrategy};
use wasmkern_fuzzing::{execute, FuzzInput};

fuzz_target!(|input: FuzzInput| {
    execute(&input, DispatchStrategy::Direct, BoundsCheck::Guard);
});
