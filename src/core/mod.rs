// Public modules
pub mod apt;
pub mod binary;
pub mod context;
pub mod defaults;
pub mod docker;
pub mod error;
pub mod php_extension;
pub mod settings;
pub mod shell;
pub mod ssh;
pub mod task;

// Internal modules - not part of public API
pub mod config;
pub(crate) mod paths;

// Re-export common types for convenience
pub use context::Context;
pub use error::{Error, ErrorCode, Result};
pub use shell::{CommandOutput, RunOptions, Shell};
pub use task::{IterationRecord, Overlay, Task, TaskRegistry, TaskSet};
