pub mod kernel;
pub mod outputs;
pub mod services;

pub use kernel::brain::{Brain, ExecuteOptions};
pub use kernel::config::BrainConfig;
pub use kernel::error::{BrainError, ExecutionError};
pub use kernel::types::{ClassifiedUtterance, ExecutionResult};
