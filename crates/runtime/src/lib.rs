//! Support routines linked into native ember programs
//!
//! Every entry point follows the System V integer calling convention: booleans
//! arrive as a full machine word and strings as NUL-terminated byte pointers.

use std::ffi::{c_char, CStr, CString};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;


fn write_int<W: Write>(output: &mut W, value: i64) -> io::Result<()> {
    writeln!(output, "{}", value)
}

fn write_bool<W: Write>(output: &mut W, value: i64) -> io::Result<()> {
    writeln!(output, "{}", value != 0)
}

fn write_str<W: Write>(output: &mut W, text: &CStr) -> io::Result<()> {
    output.write_all(text.to_bytes())?;
    output.write_all(b"\n")
}

fn started() -> &'static Instant {
    static STARTED: OnceLock<Instant> = OnceLock::new();
    STARTED.get_or_init(Instant::now)
}

/// Nanoseconds since the first call into the clock, saturating at `i64::MAX`
pub fn elapsed_nanos() -> i64 {
    i64::try_from(started().elapsed().as_nanos()).unwrap_or(i64::MAX)
}

#[no_mangle]
pub extern "C" fn ember_print_int(value: i64) {
    let _ = write_int(&mut io::stdout().lock(), value);
}

#[no_mangle]
pub extern "C" fn ember_print_bool(value: i64) {
    let _ = write_bool(&mut io::stdout().lock(), value);
}

/// # Safety
///
/// `text` must be null or point to a NUL-terminated string that outlives the call.
#[no_mangle]
pub unsafe extern "C" fn ember_print_str(text: *const c_char) {
    if text.is_null() {
        return;
    }
    let text = CStr::from_ptr(text);
    let _ = write_str(&mut io::stdout().lock(), text);
}

#[no_mangle]
pub extern "C" fn ember_tick() -> i64 {
    elapsed_nanos()
}

/// The returned string is never freed; programs are short-lived.
#[no_mangle]
pub extern "C" fn ember_int_to_string(value: i64) -> *const c_char {
    match CString::new(value.to_string()) {
        Ok(text) => text.into_raw(),
        Err(_) => std::ptr::null(),
    }
}
