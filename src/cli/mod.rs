//! Command-line surface

pub mod args;
pub mod commands;
pub mod operator;

pub use args::{Cli, Commands, LogFormat};
pub use operator::OperatorCommand;
