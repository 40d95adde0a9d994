use clap::Args;
use dockyard::binary;
use serde::Serialize;

use super::{load_context, CmdResult};

#[derive(Args)]
pub struct BinArgs {
    /// Binary name, e.g. docker
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct BinOutput {
    name: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
}

pub fn run(args: BinArgs) -> CmdResult<BinOutput> {
    let (config, ctx) = load_context()?;
    let path = binary::locate_binary_path(&ctx, &args.name)?;

    Ok((
        BinOutput {
            name: args.name,
            path,
            host: config.host.map(|h| h.host),
        },
        0,
    ))
}
