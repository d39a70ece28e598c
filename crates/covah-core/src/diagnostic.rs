// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The non-fatal coding-error channel.
//!
//! Coding errors are "should never happen in correct code" conditions: a
//! negative container index, an accessor called before a source resolved, an
//! output index out of bounds. They are reported here and the offending call
//! returns a safe default instead of panicking, so a bad prim degrades the
//! frame rather than the process.
//!
//! Each report is logged at error level under the `covah::coding_error`
//! target and counted per thread, which lets tests assert that a given call
//! did (or did not) report one.

use std::cell::Cell;
use std::fmt;
use std::panic::Location;

thread_local! {
    static CODING_ERRORS: Cell<usize> = const { Cell::new(0) };
}

/// Reports a coding error at `location`. Prefer the [`coding_error!`] macro,
/// which captures the call site.
///
/// [`coding_error!`]: crate::coding_error
pub fn report_coding_error(args: fmt::Arguments<'_>, location: &'static Location<'static>) {
    log::error!(
        target: "covah::coding_error",
        "Coding error at {}:{}: {}",
        location.file(),
        location.line(),
        args
    );
    CODING_ERRORS.with(|count| count.set(count.get() + 1));
}

/// Returns the number of coding errors reported on the current thread.
pub fn coding_error_count() -> usize {
    CODING_ERRORS.with(Cell::get)
}

/// Reports a coding error with `format!`-style arguments.
///
/// ```
/// use covah_core::{coding_error, diagnostic};
///
/// let before = diagnostic::coding_error_count();
/// coding_error!("index {} is negative", -1);
/// assert_eq!(diagnostic::coding_error_count(), before + 1);
/// ```
#[macro_export]
macro_rules! coding_error {
    ($($arg:tt)*) => {
        $crate::diagnostic::report_coding_error(
            ::std::format_args!($($arg)*),
            ::std::panic::Location::caller(),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_per_thread() {
        let before = coding_error_count();
        crate::coding_error!("first");
        crate::coding_error!("second {}", 2);
        assert_eq!(coding_error_count(), before + 2);

        let other = std::thread::spawn(coding_error_count).join().unwrap();
        assert_eq!(other, 0);
    }
}
