use dockyard::defaults::{self, DockyardConfig};
use dockyard::Context;

pub type CmdResult<T> = dockyard::Result<(T, i32)>;

pub mod apt;
pub mod bin;
pub mod config;
pub mod docker;
pub mod php_ext;
pub mod run;
pub mod task;

/// Load dockyard.json and build the execution context for it.
///
/// Invalid JSON fails here; a missing file means built-in defaults.
pub(crate) fn load_context() -> dockyard::Result<(DockyardConfig, Context)> {
    let config = defaults::load_config_strict()?;
    let ctx = Context::from_config(&config)?;
    Ok((config, ctx))
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (dockyard::Result<serde_json::Value>, i32) {
    crate::tty::status("dockyard is working...");

    match command {
        crate::Commands::Run(args) => dispatch!(args, run),
        crate::Commands::PhpExt(args) => dispatch!(args, php_ext),
        crate::Commands::Docker(args) => dispatch!(args, docker),
        crate::Commands::Apt(args) => dispatch!(args, apt),
        crate::Commands::Bin(args) => dispatch!(args, bin),
        crate::Commands::Task(args) => dispatch!(args, task),
        crate::Commands::Config(args) => dispatch!(args, config),
    }
}
