//! # Configuration
//!
//! - `controller.rs` - Process settings read from environment variables
//! - `function.rs` - Settings shared by every Function, read from a YAML file

mod controller;
mod function;

pub use controller::ControllerConfig;
pub use function::{parse_duration, ConfigError, FunctionConfig, RuntimeImages};
