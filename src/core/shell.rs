//! Shell execution collaborators.
//!
//! Everything dockyard does ends up as a command string handed to a [`Shell`].
//! The shell decides success from the exit status; callers never look further
//! than `success`, `exit_code` and the captured streams.

use serde::Serialize;
use std::process::Command;

/// Captured result of one command.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub(crate) fn spawn_error(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: message,
            success: false,
            exit_code: -1,
        }
    }

    /// Stderr if present, otherwise stdout.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Per-command options passed through to the shell.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cwd: Option<String>,
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    pub fn in_dir(dir: impl Into<String>) -> Self {
        Self {
            cwd: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Executes command strings somewhere (local machine, SSH host, test fake).
pub trait Shell {
    fn run(&self, command: &str, options: &RunOptions) -> CommandOutput;

    /// Human readable execution target, used in error details.
    fn describe(&self) -> Option<String> {
        None
    }
}

/// Runs commands through `sh -c` on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalShell;

impl Shell for LocalShell {
    fn run(&self, command: &str, options: &RunOptions) -> CommandOutput {
        let env: Vec<(&str, &str)> = options
            .env
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        execute_local_command_in_dir(command, options.cwd.as_deref(), Some(&env))
    }
}

pub fn execute_local_command_in_dir(
    command: &str,
    current_dir: Option<&str>,
    env: Option<&[(&str, &str)]>,
) -> CommandOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    if let Some(env_pairs) = env {
        cmd.envs(env_pairs.iter().copied());
    }

    match cmd.output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::spawn_error(format!("Command error: {}", e)),
    }
}
