//! Control tool invocation.
//!
//! Everything the rest of the crate knows about `wsl.exe` goes through the
//! [`CommandRunner`] trait; lifecycle code never touches `std::process`
//! directly, which is also what makes the rename workflow testable without a
//! real WSL host.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::CommandError;

/// Arguments for the verbose listing the registry consumes.
pub const LIST_VERBOSE: &[&str] = &["--list", "--verbose"];

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

/// A blocking invocation of the external control tool.
///
/// Calls block the calling thread for the duration of one tool run; callers
/// that must stay responsive wrap the call in `spawn_blocking`.
pub trait CommandRunner: Send + Sync {
    /// Runs the tool with the given argv and returns decoded stdout.
    fn run(&self, args: &[&str]) -> Result<String, CommandError>;

    /// Launches the tool detached (interactive session); does not wait.
    fn spawn_detached(&self, args: &[&str]) -> Result<(), CommandError>;
}

/// Runner backed by the real `wsl` executable.
#[derive(Debug, Clone)]
pub struct WslRunner {
    program: OsString,
}

impl WslRunner {
    pub fn new() -> Self {
        Self {
            program: OsString::from("wsl"),
        }
    }

    /// Override the control tool binary (tests, non-standard installs).
    pub fn with_program(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().as_os_str().to_os_string(),
        }
    }
}

impl Default for WslRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for WslRunner {
    fn run(&self, args: &[&str]) -> Result<String, CommandError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep the tool from flashing a console window of its own.
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = cmd.output().map_err(CommandError::from_spawn)?;
        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                code: output.status.code(),
                stderr: decode_tool_output(&output.stderr),
            });
        }
        Ok(decode_tool_output(&output.stdout))
    }

    fn spawn_detached(&self, args: &[&str]) -> Result<(), CommandError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NEW_CONSOLE);
        }
        #[cfg(not(windows))]
        {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        cmd.spawn().map(drop).map_err(CommandError::from_spawn)
    }
}

/// Decodes control tool output tolerantly.
///
/// The tool emits UTF-16LE on Windows; that is detected via a UTF-16 BOM or
/// interior NUL bytes so the same binary behaves sanely against UTF-8 test
/// doubles. Malformed units become U+FFFD rather than an error.
pub fn decode_tool_output(bytes: &[u8]) -> String {
    if looks_utf16le(bytes) {
        decode_utf16le(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn looks_utf16le(bytes: &[u8]) -> bool {
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        return true;
    }
    bytes.contains(&0x00) && bytes.len() >= 2
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    let mut out: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    // A trailing odd byte is an encoding artifact, not data.
    if bytes.len() % 2 != 0 {
        out.push(char::REPLACEMENT_CHARACTER);
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scripted runner: pops canned responses in order and records every
    /// argv it was handed.
    pub struct MockRunner {
        responses: Mutex<Vec<Result<String, CommandError>>>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl MockRunner {
        pub fn new(responses: Vec<Result<String, CommandError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn recorded_calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, args: &[&str]) {
            self.calls
                .lock()
                .unwrap()
                .push(args.iter().map(|s| s.to_string()).collect());
        }
    }

    impl CommandRunner for MockRunner {
        fn run(&self, args: &[&str]) -> Result<String, CommandError> {
            self.record(args);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(String::new())
            } else {
                responses.remove(0)
            }
        }

        fn spawn_detached(&self, args: &[&str]) -> Result<(), CommandError> {
            self.record(args);
            Ok(())
        }
    }

    pub fn exit_error(stderr: &str) -> CommandError {
        CommandError::NonZeroExit {
            code: Some(1),
            stderr: stderr.to_string(),
        }
    }
}
