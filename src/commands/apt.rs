use clap::{Args, Subcommand};
use dockyard::apt;
use dockyard::context::CommandRecord;
use serde::Serialize;

use super::{load_context, CmdResult};

#[derive(Args)]
pub struct AptArgs {
    #[command(subcommand)]
    command: AptCommand,
}

#[derive(Subcommand)]
enum AptCommand {
    /// Refresh package lists
    Update,
    /// Remove apt caches and temporary files
    Cleanup,
}

#[derive(Debug, Serialize)]
pub struct AptOutput {
    command: String,
    commands: Vec<CommandRecord>,
}

pub fn run(args: AptArgs) -> CmdResult<AptOutput> {
    let (_, ctx) = load_context()?;

    let command = match args.command {
        AptCommand::Update => {
            apt::apt_update(&ctx)?;
            "apt.update"
        }
        AptCommand::Cleanup => {
            apt::apt_cleanup(&ctx)?;
            "apt.cleanup"
        }
    };

    Ok((
        AptOutput {
            command: command.to_string(),
            commands: ctx.take_commands(),
        },
        0,
    ))
}
