//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Staging the bundled model
//! - One-shot generation
//! - An interactive chat loop

pub mod commands;
pub mod handlers;

pub use commands::{Commands, GenerateCommand, LoggingArgs};
pub use handlers::{handle_chat, handle_generate, handle_stage, run_chat};
