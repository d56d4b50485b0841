//! sessiondock CLI library
//!
//! Command implementations and output formatting for the `sessiondock`
//! binary. The binary itself only parses arguments and dispatches here.

pub mod commands;
pub mod output;
