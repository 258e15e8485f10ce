//! sysscope - command-line front end
//!
//! Parses arguments, loads configuration, runs the probe catalogue and
//! writes the report to the console and, optionally, a paginated document.

pub mod cli;
pub mod commands;
pub mod errors;
pub mod logging;
pub mod sink;
