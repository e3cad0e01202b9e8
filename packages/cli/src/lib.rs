// ABOUTME: Library side of the labrack binary
// ABOUTME: Environment configuration and wiring of the live service stack

pub mod config;
pub mod runtime;

pub use config::{CliConfig, ConfigError};
pub use runtime::Runtime;
