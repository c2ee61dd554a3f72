//! Embedded runtime assembly.
//!
//! The hand-written stdlib provides `_start`, `print_int`, `print_bool` and
//! `read_int`. It is embedded at compile time so the compiler binary is
//! self-contained. When linking against the C runtime, the `_start` region
//! between the BEGIN/END markers is dropped; crt0 provides the entry point
//! and calls `main`.

/// The stdlib assembly source, assembled alongside every program.
pub static STDLIB_ASM: &str = include_str!("../stdlib/stdlib.s");

const START_BEGIN_MARKER: &str = "# BEGIN START";
const START_END_MARKER: &str = "# END START";

/// The stdlib with the `_start` section removed, for linking with C.
pub fn stdlib_without_start() -> String {
    let begin = STDLIB_ASM
        .find(START_BEGIN_MARKER)
        .expect("stdlib.s carries the BEGIN START marker");
    let end = STDLIB_ASM
        .find(START_END_MARKER)
        .expect("stdlib.s carries the END START marker");
    let after_end = end + START_END_MARKER.len();
    format!("{}{}", &STDLIB_ASM[..begin], &STDLIB_ASM[after_end..])
}
