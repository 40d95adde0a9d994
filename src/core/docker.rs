//! Docker host provisioning and container liveness checks.

use crate::apt;
use crate::binary;
use crate::context::Context;
use crate::defaults;
use crate::error::Result;
use crate::shell::RunOptions;
use crate::utils::shell;
use serde_json::Value;

pub const DOCKER_BIN_KEY: &str = "bin/docker";
pub const COMPOSE_BIN_KEY: &str = "bin/docker-compose";
pub const MACHINE_VERSION_KEY: &str = "docker_machine_version";
pub const MACHINE_PATH_KEY: &str = "docker_machine_path";

const DOCKER_CE_STEPS: &[&str] = &[
    "apt-get install -y apt-transport-https gnupg2 software-properties-common",
    "curl -fsSL https://download.docker.com/linux/$(. /etc/os-release; echo \"$ID\")/gpg | apt-key add -",
    "add-apt-repository \"deb [arch=amd64] https://download.docker.com/linux/$(. /etc/os-release; echo \"$ID\") $(lsb_release -cs) stable\"",
    "apt-get update && apt-get install -y docker-ce",
];

/// Register `bin/docker` and `bin/docker-compose` as lazy settings.
///
/// Each is located on the host the first time something reads it. Explicitly
/// configured paths are left alone.
pub fn register_binaries(ctx: &mut Context) {
    for (key, name) in [(DOCKER_BIN_KEY, "docker"), (COMPOSE_BIN_KEY, "docker-compose")] {
        if ctx.settings().has(key) {
            continue;
        }
        ctx.set_lazy(key, move |ctx| {
            binary::locate_binary_path(ctx, name).map(Value::String)
        });
    }
}

pub fn install_docker_ce(ctx: &Context) -> Result<()> {
    ctx.operation("Installing Docker CE (takes a few minutes)", |ctx| {
        apt::apt_update(ctx)?;
        for step in DOCKER_CE_STEPS {
            ctx.run(step, &RunOptions::default())?;
        }
        Ok(())
    })
}

pub fn install_docker_machine(ctx: &Context) -> Result<()> {
    let builtin = defaults::builtin_defaults().docker;
    let version = setting_or(ctx, MACHINE_VERSION_KEY, builtin.machine_version)?;
    let path = shell::quote_path(&setting_or(ctx, MACHINE_PATH_KEY, builtin.machine_install_path)?);

    let command = format!(
        "curl -L https://github.com/docker/machine/releases/download/{}/docker-machine-`uname -s`-`uname -m` > {} && chmod +x {}",
        version, path, path
    );

    ctx.operation("Installing Docker Machine", |ctx| {
        ctx.run(&command, &RunOptions::default()).map(|_| ())
    })
}

/// Whether `container` answers `docker exec <container> true`.
///
/// `None` checks the container of the active scope. The check always runs on
/// the host, bypassing the scope's command template.
pub fn is_container_running(ctx: &Context, container: Option<&str>) -> Result<bool> {
    let container = container
        .map(shell::quote_arg)
        .unwrap_or_else(|| "{{container}}".to_string());
    ctx.test_on_host(&format!("{{{{bin/docker}}}} exec {} true 2>/dev/null", container))
}

fn setting_or(ctx: &Context, key: &str, fallback: String) -> Result<String> {
    if ctx.has(key) {
        ctx.get_string(key)
    } else {
        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use crate::task::{IterationRecord, COMMAND_TEMPLATE_KEY, CONTAINER_KEY};
    use serde_json::json;

    #[test]
    fn docker_binary_is_located_once() {
        let (mut ctx, shell) = context();
        register_binaries(&mut ctx);
        shell.reply(true, "");
        shell.reply(true, "/usr/bin/docker\n");

        assert!(is_container_running(&ctx, Some("app")).unwrap());
        assert!(is_container_running(&ctx, Some("db")).unwrap());

        assert_eq!(
            shell.lines(),
            vec![
                "[ -x \"$(command -v docker)\" ]",
                "command -v docker",
                "/usr/bin/docker exec app true 2>/dev/null",
                "/usr/bin/docker exec db true 2>/dev/null",
            ]
        );
    }

    #[test]
    fn explicit_binary_path_wins() {
        let (mut ctx, shell) = context();
        ctx.set(DOCKER_BIN_KEY, json!("/snap/bin/docker"));
        register_binaries(&mut ctx);

        is_container_running(&ctx, Some("app")).unwrap();
        assert_eq!(shell.lines(), vec!["/snap/bin/docker exec app true 2>/dev/null"]);
    }

    #[test]
    fn stopped_container_is_not_an_error() {
        let (mut ctx, shell) = context();
        ctx.set(DOCKER_BIN_KEY, json!("docker"));
        shell.reply(false, "");

        assert!(!is_container_running(&ctx, Some("gone")).unwrap());
    }

    #[test]
    fn running_check_uses_scope_container_without_template() {
        let (mut ctx, shell) = context();
        ctx.set(DOCKER_BIN_KEY, json!("docker"));
        let mut record = IterationRecord::new();
        record.insert(COMMAND_TEMPLATE_KEY, json!("wrapped {{?command}}"));
        record.insert(CONTAINER_KEY, json!("worker"));

        ctx.with_scope(record, |ctx| is_container_running(ctx, None)).unwrap();
        assert_eq!(shell.lines(), vec!["docker exec worker true 2>/dev/null"]);
    }

    #[test]
    fn docker_ce_runs_update_then_install_steps() {
        let (ctx, shell) = context();
        install_docker_ce(&ctx).unwrap();

        let lines = shell.lines();
        assert_eq!(lines.len(), 1 + DOCKER_CE_STEPS.len());
        assert_eq!(lines[0], "apt-get update");
        assert_eq!(lines[4], "apt-get update && apt-get install -y docker-ce");
        assert!(ctx
            .commands()
            .iter()
            .all(|c| c.operation.as_deref() == Some("Installing Docker CE (takes a few minutes)")));
    }

    #[test]
    fn docker_machine_uses_configured_version() {
        let (mut ctx, shell) = context();
        ctx.set(MACHINE_VERSION_KEY, json!("v0.16.2"));
        install_docker_machine(&ctx).unwrap();

        assert_eq!(
            shell.lines(),
            vec!["curl -L https://github.com/docker/machine/releases/download/v0.16.2/docker-machine-`uname -s`-`uname -m` > '/usr/bin/docker-machine' && chmod +x '/usr/bin/docker-machine'"]
        );
    }
}
