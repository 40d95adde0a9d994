use clap::{Args, Subcommand};
use dockyard::defaults;
use dockyard::task::TaskDefinition;
use serde::Serialize;

use super::CmdResult;

#[derive(Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    command: TaskCommand,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// List tasks defined in dockyard.json
    List,
    /// Show one task definition
    Show {
        /// Task ID
        id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    id: String,
    #[serde(flatten)]
    definition: TaskDefinition,
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskOutput {
    List { tasks: Vec<TaskSummary> },
    Show { task: TaskSummary },
}

pub fn run(args: TaskArgs) -> CmdResult<TaskOutput> {
    let config = defaults::load_config_strict()?;

    match args.command {
        TaskCommand::List => {
            let tasks = config
                .tasks
                .into_iter()
                .map(|(id, definition)| TaskSummary { id, definition })
                .collect();
            Ok((TaskOutput::List { tasks }, 0))
        }
        TaskCommand::Show { id } => {
            let known: Vec<String> = config.tasks.keys().cloned().collect();
            let mut tasks = config.tasks;
            let definition = tasks
                .remove(&id)
                .ok_or_else(|| dockyard::Error::task_not_found(&id, known))?;
            Ok((
                TaskOutput::Show {
                    task: TaskSummary { id, definition },
                },
                0,
            ))
        }
    }
}
