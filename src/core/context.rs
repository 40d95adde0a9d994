//! Execution context shared by every recipe.
//!
//! A [`Context`] owns the configuration store, the shell collaborator and,
//! while a task iterates, the active [`IterationRecord`] (the *scope*).
//! Inside a scope every [`Context::run`] is wrapped in the record's
//! `command_template`, which is how a plain `composer install` ends up as
//! `docker exec -i app bash -c 'composer install'`. The `*_on_host` variants
//! skip the wrapping.

use crate::defaults::DockyardConfig;
use crate::docker;
use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::settings::Settings;
use crate::shell::{CommandOutput, LocalShell, RunOptions, Shell};
use crate::ssh::SshShell;
use crate::task::{IterationRecord, COMMAND_TEMPLATE_KEY, CONTAINER_KEY};
use crate::utils::{shell, template};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::time::Instant;

/// Setting holding the process-wide default command template.
pub const DEFAULT_TEMPLATE_KEY: &str = "docker_default_command_template";
/// Setting that, when present, replaces the default command template.
pub const TEMPLATE_OVERRIDE_KEY: &str = "docker_command_template";

/// Nested placeholder values are re-parsed up to this depth.
const MAX_PARSE_DEPTH: usize = 8;

/// One executed command, in execution order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub command: String,
    pub success: bool,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

pub struct Context {
    settings: Settings,
    shell: Box<dyn Shell>,
    scope: Option<IterationRecord>,
    operation: RefCell<Option<String>>,
    commands: RefCell<Vec<CommandRecord>>,
}

impl Context {
    pub fn new(settings: Settings, shell: Box<dyn Shell>) -> Self {
        Self {
            settings,
            shell,
            scope: None,
            operation: RefCell::new(None),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Build a context from dockyard.json: explicit settings, built-in defaults,
    /// the configured host (local when absent) and the lazy docker binaries.
    pub fn from_config(config: &DockyardConfig) -> Result<Self> {
        let shell: Box<dyn Shell> = match &config.host {
            Some(host) => Box::new(SshShell::from_host(host)?),
            None => Box::new(LocalShell),
        };
        Ok(Self::with_config(config, shell))
    }

    /// Same as [`Context::from_config`] with an explicit shell.
    pub fn with_config(config: &DockyardConfig, shell: Box<dyn Shell>) -> Self {
        let mut ctx = Self::new(Settings::from_map(&config.settings), shell);
        let docker_defaults = &config.defaults.docker;

        ctx.set_default(
            DEFAULT_TEMPLATE_KEY,
            Value::String(docker_defaults.default_command_template.clone()),
        );
        ctx.set_default(
            docker::MACHINE_VERSION_KEY,
            Value::String(docker_defaults.machine_version.clone()),
        );
        ctx.set_default(
            docker::MACHINE_PATH_KEY,
            Value::String(docker_defaults.machine_install_path.clone()),
        );
        docker::register_binaries(&mut ctx);

        ctx
    }

    // ------------------------------------------------------------------
    // Configuration store
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True when the key is in the active scope or the store (lazy keys included).
    pub fn has(&self, key: &str) -> bool {
        self.scope.as_ref().is_some_and(|s| s.contains_key(key)) || self.settings.has(key)
    }

    /// Look a key up in the active scope, then the store. Lazy values resolve here.
    pub fn get(&self, key: &str) -> Result<Value> {
        if let Some(value) = self.scope.as_ref().and_then(|s| s.get(key)) {
            return Ok(value.clone());
        }

        self.settings
            .resolve(key, self)?
            .ok_or_else(|| Error::config_missing_key(key))
    }

    /// Like [`Context::get`], converted to a string for command building.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(Error::config_invalid_value(
                key,
                Some(other.to_string()),
                "Expected a string, number or boolean",
            )),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.settings.set(key, value);
    }

    pub fn set_lazy<F>(&mut self, key: impl Into<String>, resolver: F)
    where
        F: Fn(&Context) -> Result<Value> + 'static,
    {
        self.settings.set_lazy(key, resolver);
    }

    /// Set a value only when nothing is configured for the key yet.
    pub fn set_default(&mut self, key: &str, value: Value) {
        if !self.settings.has(key) {
            self.settings.set(key, value);
        }
    }

    // ------------------------------------------------------------------
    // Scope
    // ------------------------------------------------------------------

    pub fn scope(&self) -> Option<&IterationRecord> {
        self.scope.as_ref()
    }

    /// Run `f` with `record` as the active scope, restoring the previous scope afterwards.
    pub fn with_scope<T, F>(&mut self, record: IterationRecord, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context) -> Result<T>,
    {
        let previous = self.scope.replace(record);
        let result = f(self);
        self.scope = previous;
        result
    }

    fn scope_container(&self) -> Option<String> {
        self.scope
            .as_ref()
            .and_then(|s| s.get(CONTAINER_KEY))
            .and_then(|v| v.as_str().map(str::to_string))
    }

    // ------------------------------------------------------------------
    // Placeholder substitution
    // ------------------------------------------------------------------

    /// Substitute `{{key}}` and `{{?key}}` placeholders from the scope and store.
    pub fn parse(&self, text: &str) -> Result<String> {
        self.parse_at_depth(text, 0)
    }

    fn parse_at_depth(&self, text: &str, depth: usize) -> Result<String> {
        template::try_render(text, |placeholder| -> Result<String> {
            let mut value = self.get_string(&placeholder.name)?;
            if depth < MAX_PARSE_DEPTH {
                value = self.parse_at_depth(&value, depth + 1)?;
            }
            Ok(if placeholder.quoted {
                shell::escape_command_for_shell(&value)
            } else {
                value
            })
        })
    }

    /// Final command line for `command`: parsed, then wrapped in the scope's
    /// command template unless `on_host` is set.
    pub fn command_line(&self, command: &str, on_host: bool) -> Result<String> {
        let parsed = self.parse(command)?;

        let template = match (&self.scope, on_host) {
            (Some(scope), false) => scope.get(COMMAND_TEMPLATE_KEY).cloned(),
            _ => None,
        };

        let Some(template) = template else {
            return Ok(parsed);
        };

        let template = template.as_str().ok_or_else(|| {
            Error::config_invalid_value(
                COMMAND_TEMPLATE_KEY,
                Some(template.to_string()),
                "Command template must be a string",
            )
        })?;

        template::try_render(template, |placeholder| -> Result<String> {
            let value = if placeholder.name == "command" {
                parsed.clone()
            } else {
                self.parse(&self.get_string(&placeholder.name)?)?
            };
            Ok(if placeholder.quoted {
                shell::escape_command_for_shell(&value)
            } else {
                value
            })
        })
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run a command; a non-zero exit becomes `remote.command_failed`.
    pub fn run(&self, command: &str, options: &RunOptions) -> Result<CommandOutput> {
        let line = self.command_line(command, false)?;
        self.execute(&line, options, true)
    }

    /// Run a command and report only whether it succeeded.
    pub fn test(&self, command: &str) -> Result<bool> {
        let line = self.command_line(command, false)?;
        Ok(self.execute(&line, &RunOptions::default(), false)?.success)
    }

    /// Run on the host itself, bypassing the scope's command template.
    pub fn run_on_host(&self, command: &str, options: &RunOptions) -> Result<CommandOutput> {
        let line = self.command_line(command, true)?;
        self.execute(&line, options, true)
    }

    pub fn test_on_host(&self, command: &str) -> Result<bool> {
        let line = self.command_line(command, true)?;
        Ok(self.execute(&line, &RunOptions::default(), false)?.success)
    }

    fn execute(&self, line: &str, options: &RunOptions, check: bool) -> Result<CommandOutput> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let output = self.shell.run(line, options);
        let container = self.scope_container();

        self.commands.borrow_mut().push(CommandRecord {
            command: line.to_string(),
            success: output.success,
            exit_code: output.exit_code,
            container: container.clone(),
            operation: self.operation.borrow().clone(),
            started_at,
            duration_ms: timer.elapsed().as_millis(),
        });

        if check && !output.success {
            log_status!("command", "Exit {}: {}", output.exit_code, output.error_text());
            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                command: line.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                target: TargetDetails {
                    host: self.shell.describe(),
                    container,
                },
            }));
        }

        Ok(output)
    }

    /// Commands executed so far, oldest first.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.commands.borrow().clone()
    }

    pub fn take_commands(&self) -> Vec<CommandRecord> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    // ------------------------------------------------------------------
    // Operation bracket
    // ------------------------------------------------------------------

    pub fn start_operation(&self, message: impl Into<String>) {
        let message = message.into();
        log_status!("operation", "{}", message);
        *self.operation.borrow_mut() = Some(message);
    }

    pub fn end_operation(&self) {
        if let Some(message) = self.operation.borrow_mut().take() {
            log_status!("operation", "Done: {}", message);
        }
    }

    /// Run `f` between `start_operation` and `end_operation`.
    ///
    /// The operation is closed even when `f` fails.
    pub fn operation<T, F>(&self, message: impl Into<String>, f: F) -> Result<T>
    where
        F: FnOnce(&Context) -> Result<T>,
    {
        self.start_operation(message);
        let result = f(self);
        self.end_operation();
        result
    }
}


#[cfg(test)]
mod tests {
    use super::testing::context;
    use super::*;
    use serde_json::json;

    fn docker_scope(container: &str) -> IterationRecord {
        let mut record = IterationRecord::new();
        record.insert(
            COMMAND_TEMPLATE_KEY,
            json!("{{bin/docker}} exec -i {{container}} bash -c {{?command}}"),
        );
        record.insert(CONTAINER_KEY, json!(container));
        record
    }

    #[test]
    fn parse_substitutes_nested_values() {
        let (mut ctx, _shell) = context();
        ctx.set("release_path", json!("{{deploy_path}}/current"));
        ctx.set("deploy_path", json!("/var/www"));

        assert_eq!(ctx.parse("cd {{release_path}}").unwrap(), "cd /var/www/current");
    }

    #[test]
    fn parse_reports_unknown_keys() {
        let (ctx, _shell) = context();
        let err = ctx.parse("echo {{nope}}").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigMissingKey);
        assert_eq!(err.details["key"], "nope");
    }

    #[test]
    fn run_outside_scope_is_not_wrapped() {
        let (ctx, shell) = context();
        ctx.run("apt-get update", &RunOptions::default()).unwrap();
        assert_eq!(shell.lines(), vec!["apt-get update".to_string()]);
    }

    #[test]
    fn run_in_scope_wraps_command_in_template() {
        let (mut ctx, shell) = context();
        ctx.set("bin/docker", json!("/usr/bin/docker"));

        ctx.with_scope(docker_scope("app"), |ctx| {
            ctx.run("echo 'hi' && ls", &RunOptions::default()).map(|_| ())
        })
        .unwrap();

        assert_eq!(
            shell.lines(),
            vec!["/usr/bin/docker exec -i app bash -c 'echo '\\''hi'\\'' && ls'".to_string()]
        );
        assert!(ctx.scope().is_none());
    }

    #[test]
    fn run_on_host_skips_template_but_keeps_scope_values() {
        let (mut ctx, shell) = context();
        ctx.set("bin/docker", json!("docker"));

        ctx.with_scope(docker_scope("worker"), |ctx| {
            ctx.run_on_host("{{bin/docker}} logs {{container}}", &RunOptions::default())
                .map(|_| ())
        })
        .unwrap();

        assert_eq!(shell.lines(), vec!["docker logs worker".to_string()]);
    }

    #[test]
    fn failed_command_carries_details() {
        let (ctx, shell) = context();
        shell.reply(false, "partial");

        let err = ctx.run("make", &RunOptions::default()).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["command"], "make");
        assert_eq!(err.details["stdout"], "partial");
        assert_eq!(err.details["target"]["host"], "recording");
    }

    #[test]
    fn test_returns_false_instead_of_error() {
        let (ctx, shell) = context();
        shell.reply(false, "");
        assert!(!ctx.test("false").unwrap());
        assert!(ctx.test("true").unwrap());
    }

    #[test]
    fn operation_tags_commands() {
        let (ctx, _shell) = context();
        ctx.operation("Installing things", |ctx| {
            ctx.run("one", &RunOptions::default()).map(|_| ())
        })
        .unwrap();
        ctx.run("two", &RunOptions::default()).unwrap();

        let commands = ctx.commands();
        assert_eq!(commands[0].operation.as_deref(), Some("Installing things"));
        assert_eq!(commands[1].operation, None);
    }

    #[test]
    fn with_config_seeds_defaults_without_overriding_settings() {
        let mut config = DockyardConfig::default();
        config
            .settings
            .insert(docker::MACHINE_VERSION_KEY.to_string(), json!("v0.16.2"));
        let ctx = Context::with_config(&config, Box::new(LocalShell));

        assert_eq!(
            ctx.get_string(DEFAULT_TEMPLATE_KEY).unwrap(),
            crate::defaults::DEFAULT_COMMAND_TEMPLATE
        );
        assert_eq!(ctx.get_string(docker::MACHINE_VERSION_KEY).unwrap(), "v0.16.2");
        assert!(ctx.has("bin/docker"));
        assert!(ctx.has("bin/docker-compose"));
    }
}
