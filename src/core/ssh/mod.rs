mod client;

pub use client::{is_local_host, remote_command_line, HostConfig, SshShell};
