use crate::error::{Error, Result};
use crate::shell::{execute_local_command_in_dir, CommandOutput, RunOptions, Shell};
use crate::utils::shell;
use serde::{Deserialize, Serialize};
use std::process::Command;

/// SSH host entry from dockyard.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl HostConfig {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }
}

pub struct SshShell {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshShell {
    pub fn from_host(config: &HostConfig) -> Result<Self> {
        if !config.is_valid() {
            return Err(Error::config_invalid_value(
                "host",
                Some(format!("{}@{}", config.user, config.host)),
                "Host entry needs both 'host' and 'user'",
            ));
        }

        let identity_file = match &config.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(expanded));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&config.host);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", config.host);
        }

        Ok(Self {
            host: config.host.clone(),
            user: config.user.clone(),
            port: config.port,
            identity_file,
            is_local,
        })
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never prompt, never hang on a stalled connection.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }
}

impl Shell for SshShell {
    fn run(&self, command: &str, options: &RunOptions) -> CommandOutput {
        if self.is_local {
            let env: Vec<(&str, &str)> = options
                .env
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            return execute_local_command_in_dir(command, options.cwd.as_deref(), Some(&env));
        }

        let remote_command = remote_command_line(command, options);
        let args = self.build_ssh_args(&remote_command);

        match Command::new("ssh").args(&args).output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::spawn_error(format!("SSH error: {}", e)),
        }
    }

    fn describe(&self) -> Option<String> {
        Some(format!("{}@{}", self.user, self.host))
    }
}

/// Fold cwd/env options into the command line sent over SSH.
pub fn remote_command_line(command: &str, options: &RunOptions) -> String {
    let mut line = String::new();

    if let Some(dir) = &options.cwd {
        line.push_str(&format!("cd {} && ", shell::quote_path(dir)));
    }

    if !options.env.is_empty() {
        let assignments: Vec<String> = options
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell::quote_arg(v)))
            .collect();
        line.push_str(&format!("export {}; ", assignments.join(" ")));
    }

    line.push_str(command);
    line
}

pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
