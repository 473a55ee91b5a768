//! Command line interface

pub mod args;
pub mod output;

pub use args::{Args, ClientArg, VerbosityLevel};
pub use output::OutputFormatter;
