use clap::{Args, Subcommand};
use dockyard::context::CommandRecord;
use dockyard::php_extension::{self, CatalogEntry, InstalledExtension};
use dockyard::task::{self, IterationRecord};
use serde::Serialize;

use super::{load_context, CmdResult};

#[derive(Args)]
pub struct PhpExtArgs {
    #[command(subcommand)]
    command: PhpExtCommand,
}

#[derive(Subcommand)]
enum PhpExtCommand {
    /// Install PHP extensions, in order
    Install {
        /// Extension names (see `dockyard php-ext list`)
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,

        /// Install inside this container instead of on the host
        #[arg(long)]
        container: Option<String>,
    },
    /// List supported extensions
    List,
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PhpExtOutput {
    Install {
        #[serde(skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        installed: Vec<InstalledExtension>,
        commands: Vec<CommandRecord>,
    },
    List {
        extensions: Vec<CatalogEntry>,
    },
}

pub fn run(args: PhpExtArgs) -> CmdResult<PhpExtOutput> {
    match args.command {
        PhpExtCommand::Install { names, container } => install(names, container),
        PhpExtCommand::List => Ok((
            PhpExtOutput::List {
                extensions: php_extension::catalog(),
            },
            0,
        )),
    }
}

fn install(names: Vec<String>, container: Option<String>) -> CmdResult<PhpExtOutput> {
    let (_, mut ctx) = load_context()?;

    let installed = match &container {
        Some(name) => {
            let record = container_record(&ctx, name)?;
            ctx.with_scope(record, |ctx| php_extension::install_php_extensions(ctx, names))?
        }
        None => php_extension::install_php_extensions(&ctx, names)?,
    };

    Ok((
        PhpExtOutput::Install {
            container,
            installed,
            commands: ctx.take_commands(),
        },
        0,
    ))
}

fn container_record(ctx: &dockyard::Context, container: &str) -> dockyard::Result<IterationRecord> {
    let mut records = task::build_iterations(ctx, container, &[])?;
    records.pop().ok_or_else(|| {
        dockyard::Error::internal_unexpected(format!("No record built for container {}", container))
    })
}
