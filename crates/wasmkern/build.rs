use std::env;

fn main() {
    println!("cargo:rerun-if-changed=src/trap_guard/helpers.c");
    let family = env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    if !family.split(',').any(|family| family == "unix") {
        // Other targets fall back to explicit bounds checks and need no checkpoint helper.
        return;
    }
    cc::Build::new()
        .file("src/trap_guard/helpers.c")
        .warnings(true)
        .compile("wasmkern-helpers");
}
