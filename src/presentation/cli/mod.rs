//! CLI module

mod commands;
pub mod credentials;
pub mod handlers;
mod progress;

pub use commands::{CheckArgs, Cli, Commands};
pub use progress::ProgressReporter;
