//! Typed errors with machine-readable codes.
//!
//! Every failure carries a stable `code` (`task.not_found`, `remote.command_failed`, ...),
//! a human message and JSON `details`. The CLI prints all three in its envelope and
//! derives the exit status from the code.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,
    ValidationInvalidJson,

    TaskNotFound,
    ExtensionUnknown,
    BinaryNotFound,

    SshIdentityFileNotFound,

    RemoteCommandFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::TaskNotFound => "task.not_found",
            ErrorCode::ExtensionUnknown => "extension.unknown",
            ErrorCode::BinaryNotFound => "binary.not_found",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    /// Follow-up suggestions shown to the user, e.g. which command lists valid ids.
    pub hints: Vec<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Details payloads
// ============================================================================

/// Lookup by id that matched nothing (tasks, catalog extensions).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub known: Vec<String>,
}

/// Where a failed command ran.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub target: TargetDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryNotFoundDetails {
    pub binary: String,
    pub tried: Vec<String>,
}

/// Underlying io/serde failure and what dockyard was doing when it happened.
#[derive(Debug, Serialize)]
struct CauseDetails {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

// ============================================================================
// Constructors
// ============================================================================

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    fn with_details<D: Serialize>(code: ErrorCode, message: impl Into<String>, details: D) -> Self {
        let details = serde_json::to_value(details).unwrap_or_else(|_| json!({}));
        Self::new(code, message, details)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    // --- configuration -------------------------------------------------

    /// A `{{placeholder}}` or setting names a key nothing provides.
    pub fn config_missing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let message = format!("Configuration parameter \"{}\" does not exist", key);
        Self::new(ErrorCode::ConfigMissingKey, message, json!({ "key": key }))
            .with_hint("Set it with 'dockyard config set /settings/<key> <value>' or pass --set key=value")
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidJson,
            format!("{} is not valid JSON", path),
            json!({ "path": path, "error": err.to_string() }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for \"{}\": {}", key, problem),
            json!({ "key": key, "value": value, "problem": problem }),
        )
    }

    // --- caller input --------------------------------------------------

    pub fn validation_invalid_argument(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let field = field.into();
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid {}: {}", field, problem),
            json!({ "field": field, "problem": problem }),
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: impl Into<String>) -> Self {
        Self::with_details(
            ErrorCode::ValidationInvalidJson,
            "Invalid JSON",
            CauseDetails {
                error: err.to_string(),
                context: Some(context.into()),
            },
        )
    }

    // --- lookups -------------------------------------------------------

    /// The requested task id is not registered.
    pub fn task_not_found(id: impl Into<String>, known: Vec<String>) -> Self {
        Self::not_found(ErrorCode::TaskNotFound, "Invalid task specified".to_string(), id.into(), known)
            .with_hint("Run 'dockyard task list' to see registered tasks")
    }

    /// The requested PHP extension has no catalog entry.
    pub fn extension_unknown(name: impl Into<String>, known: Vec<String>) -> Self {
        let name = name.into();
        let message = format!("Unknown PHP Extension \"{}\"", name);
        Self::not_found(ErrorCode::ExtensionUnknown, message, name, known)
            .with_hint("Run 'dockyard php-ext list' to see supported extensions")
    }

    fn not_found(code: ErrorCode, message: String, id: String, known: Vec<String>) -> Self {
        Self::with_details(code, message, NotFoundDetails { id, known })
    }

    pub fn binary_not_found(binary: impl Into<String>, tried: Vec<String>) -> Self {
        let binary = binary.into();
        let message = format!("Can't locate [{}] - neither of [command|which] found it", binary);
        Self::with_details(ErrorCode::BinaryNotFound, message, BinaryNotFoundDetails { binary, tried })
    }

    // --- execution -----------------------------------------------------

    pub fn ssh_identity_file_not_found(identity_file: impl Into<String>) -> Self {
        let identity_file = identity_file.into();
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            format!("SSH identity file {} does not exist", identity_file),
            json!({ "identityFile": identity_file }),
        )
    }

    /// Non-zero exit of a command. Output is passed through untouched.
    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = match &details.target.container {
            Some(container) => format!("Command failed in container {} (exit {})", container, details.exit_code),
            None => format!("Command failed (exit {})", details.exit_code),
        };
        Self::with_details(ErrorCode::RemoteCommandFailed, message, details)
    }

    // --- internal ------------------------------------------------------

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::with_details(
            ErrorCode::InternalIoError,
            "IO error",
            CauseDetails {
                error: error.into(),
                context,
            },
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::with_details(
            ErrorCode::InternalJsonError,
            "JSON error",
            CauseDetails {
                error: error.into(),
                context,
            },
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            json!({ "error": error.into() }),
        )
    }
}
