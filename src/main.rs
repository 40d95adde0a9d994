use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{apt, bin, config, docker, php_ext, run, task};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(version = VERSION)]
#[command(about = "Run deployment tasks in Docker containers and provision Docker hosts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task once per container
    Run(run::RunArgs),
    /// Install PHP extensions in official php images
    PhpExt(php_ext::PhpExtArgs),
    /// Install Docker and check containers
    Docker(docker::DockerArgs),
    /// apt maintenance
    Apt(apt::AptArgs),
    /// Locate a binary on the execution host
    Bin(bin::BinArgs),
    /// Inspect tasks defined in dockyard.json
    #[command(visible_alias = "tasks")]
    Task(task::TaskArgs),
    /// Manage dockyard.json
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(exit_code_to_u8(1));
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
