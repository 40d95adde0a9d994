use clap::{Args, Subcommand};
use dockyard::context::CommandRecord;
use dockyard::docker;
use serde::Serialize;

use super::{load_context, CmdResult};

#[derive(Args)]
pub struct DockerArgs {
    #[command(subcommand)]
    command: DockerCommand,
}

#[derive(Subcommand)]
enum DockerCommand {
    /// Install Docker CE from the official apt repository
    InstallCe,
    /// Install the Docker Machine release binary
    InstallMachine,
    /// Check whether a container accepts `docker exec`
    Running {
        /// Container name or ID
        container: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DockerOutput {
    InstallCe { commands: Vec<CommandRecord> },
    InstallMachine { commands: Vec<CommandRecord> },
    Running { container: String, running: bool },
}

pub fn run(args: DockerArgs) -> CmdResult<DockerOutput> {
    let (_, ctx) = load_context()?;

    match args.command {
        DockerCommand::InstallCe => {
            docker::install_docker_ce(&ctx)?;
            Ok((
                DockerOutput::InstallCe {
                    commands: ctx.take_commands(),
                },
                0,
            ))
        }
        DockerCommand::InstallMachine => {
            docker::install_docker_machine(&ctx)?;
            Ok((
                DockerOutput::InstallMachine {
                    commands: ctx.take_commands(),
                },
                0,
            ))
        }
        DockerCommand::Running { container } => {
            let running = docker::is_container_running(&ctx, Some(container.as_str()))?;
            // stopped: success envelope, exit 1
            let exit_code = if running { 0 } else { 1 };
            Ok((DockerOutput::Running { container, running }, exit_code))
        }
    }
}
