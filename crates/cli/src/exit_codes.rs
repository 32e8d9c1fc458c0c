//! CLI Exit Code Registry
//!
//! Single source of truth for `gcalc` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | Evaluation or script error (syntax, cycle, error result) |
//! | 2    | Usage error (bad args, bad --cell, invalid settings)     |
//! | 3    | IO error (unreadable script, stdout closed)              |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// A script line was malformed or rejected by the engine, or `calc`
/// produced an error value.
pub const EXIT_EVAL: u8 = 1;

/// Usage error - bad arguments, invalid settings file.
pub const EXIT_USAGE: u8 = 2;

/// Reading input or writing output failed.
pub const EXIT_IO: u8 = 3;
