use crate::context::Context;
use crate::error::{Error, Result};
use crate::shell::RunOptions;
use crate::utils::shell;

/// Find the absolute path of `name` on the execution host.
///
/// Tries `command -v` first, then `which`; a candidate only counts when it
/// points at an executable. Always runs on the host, never inside a container.
pub fn locate_binary_path(ctx: &Context, name: &str) -> Result<String> {
    let quoted = shell::quote_arg(name);
    let mut tried = Vec::new();

    for lookup_cmd in ["command -v", "which"] {
        let lookup = format!("{} {}", lookup_cmd, quoted);
        tried.push(lookup.clone());

        if !ctx.test_on_host(&format!("[ -x \"$({})\" ]", lookup))? {
            continue;
        }

        let output = ctx.run_on_host(&lookup, &RunOptions::default())?;
        let path = output.stdout.trim();
        if !path.is_empty() {
            return Ok(path.to_string());
        }
    }

    Err(Error::binary_not_found(name, tried))
}
