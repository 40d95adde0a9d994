//! Generic utility primitives with zero domain knowledge.
//!
//! - `args` - name lists and `key=value` argument parsing
//! - `shell` - Shell escaping and quoting
//! - `template` - `{{placeholder}}` rendering

pub mod args;
pub mod shell;
pub mod template;
