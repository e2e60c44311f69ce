//! Shared pieces of the songmark command-line tools

pub mod common;
pub mod evaluation;
pub mod output;
