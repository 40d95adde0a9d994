//! JSON envelope written to stdout for every command.
//!
//! ```json
//! {"success": false, "error": {"code": "task.not_found", "message": "...", "details": {...}, "exitCode": 4}}
//! ```

use std::io::{self, Write};

use dockyard::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<EnvelopeError<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeError<'a> {
    code: &'static str,
    message: &'a str,
    details: &'a Value,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    hints: &'a [String],
    exit_code: i32,
}

impl<'a> Envelope<'a> {
    fn from_result(result: &'a Result<Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(EnvelopeError {
                    code: err.code.as_str(),
                    message: &err.message,
                    details: &err.details,
                    hints: &err.hints,
                    exit_code: exit_code_for_error(err.code),
                }),
            },
        }
    }
}

/// Serialize a handler's output and pick the process exit code.
///
/// Handlers return their own exit code on success (`docker running` uses 1 for a
/// stopped container); errors map through [`exit_code_for_error`].
pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(err.to_string(), Some("serialize output".to_string()))),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

pub(crate) fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::ValidationInvalidJson => 2,

        ErrorCode::TaskNotFound | ErrorCode::ExtensionUnknown | ErrorCode::BinaryNotFound => 4,

        ErrorCode::SshIdentityFileNotFound => 10,

        ErrorCode::RemoteCommandFailed => 20,

        ErrorCode::InternalIoError | ErrorCode::InternalJsonError | ErrorCode::InternalUnexpected => 1,
    }
}

fn write_envelope<W: Write>(out: &mut W, result: &Result<Value>) -> Result<()> {
    let payload = serde_json::to_string_pretty(&Envelope::from_result(result))
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize envelope".to_string())))?;

    match writeln!(out, "{}", payload) {
        Ok(()) => Ok(()),
        // reader went away (e.g. `| head`)
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(Error::internal_io(e.to_string(), Some("write stdout".to_string()))),
    }
}

pub fn print_json_result(result: Result<Value>) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_envelope(&mut handle, &result)
}
