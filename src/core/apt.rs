use crate::context::Context;
use crate::error::Result;
use crate::shell::RunOptions;

pub const UPDATE_COMMAND: &str = "apt-get update";
pub const CLEANUP_COMMAND: &str = "apt-get clean && rm -rf /var/lib/apt/lists/* /tmp/* /var/tmp/*";

pub fn apt_update(ctx: &Context) -> Result<()> {
    ctx.run(UPDATE_COMMAND, &RunOptions::default()).map(|_| ())
}

/// Drop apt caches and temp files (keeps container images small).
pub fn apt_cleanup(ctx: &Context) -> Result<()> {
    ctx.run(CLEANUP_COMMAND, &RunOptions::default()).map(|_| ())
}
