//! Stream fuzz target: push arbitrary bytes through the frame parser.
//! The parser must never panic and must consume every input eventually.
//! Build with: cargo fuzz run stream_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use std::sync::Arc;
    let dialect = Arc::new(
        mavwire::compile_source(
            "message 0 PING { value: u32; }\nmessage 1 TEXT { body: char[32]; }",
        )
        .unwrap(),
    );
    let mut parser = mavwire::ParserState::new(dialect);
    for chunk in data.chunks(7) {
        let _ = parser.push_bytes(chunk);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run stream_fuzz");
}
