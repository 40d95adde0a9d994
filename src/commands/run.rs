use clap::Args;
use dockyard::context::CommandRecord;
use dockyard::task::{self, IterationReport, TaskSet};
use dockyard::utils::args;
use serde::Serialize;
use serde_json::Value;

use super::{load_context, CmdResult};

#[derive(Args)]
pub struct RunArgs {
    /// Task ID from dockyard.json
    pub task: String,

    /// Containers to run the task in, in order
    #[arg(required = true, num_args = 1..)]
    pub containers: Vec<String>,

    /// Extra record values (repeatable), e.g. --set app_dir=/var/www
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub report: IterationReport,
    pub commands: Vec<CommandRecord>,
}

pub fn run(args: RunArgs) -> CmdResult<RunOutput> {
    let overlay = parse_overlay(&args.set)?;
    let (config, mut ctx) = load_context()?;
    let registry = TaskSet::from_definitions(&config.tasks);

    let report =
        task::run_task_in_containers(&mut ctx, &registry, &args.task, args.containers, &overlay)?;

    Ok((
        RunOutput {
            report,
            commands: ctx.take_commands(),
        },
        0,
    ))
}

fn parse_overlay(raw: &[String]) -> dockyard::Result<Vec<(String, Value)>> {
    raw.iter()
        .map(|assignment| {
            args::parse_assignment(assignment).ok_or_else(|| {
                dockyard::Error::validation_invalid_argument(
                    "set",
                    format!("Expected KEY=VALUE, got '{}'", assignment),
                )
            })
        })
        .collect()
}
