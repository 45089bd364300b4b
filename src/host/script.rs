//! Script execution through an external interpreter.
//!
//! The code is piped to the interpreter's stdin and its stdout is
//! captured as the result. A non-zero exit status becomes a
//! [`HostError::Execution`] carrying stderr as the trace.

use std::io::{self, Write};
use std::process::{Command, Stdio};

use super::HostError;

/// Interpreter used when `SCENE_HOST_INTERPRETER` is not set.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Runs script code in a child interpreter process.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    program: String,
    args: Vec<String>,
}

impl ScriptRunner {
    /// Creates a runner for `program`; the script is read from stdin.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument passed to the interpreter before the script.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builds a runner from `SCENE_HOST_INTERPRETER`.
    ///
    /// The variable may carry arguments separated by whitespace, e.g.
    /// `python3 -u`.
    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var("SCENE_HOST_INTERPRETER")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());
        let mut parts = raw.split_whitespace();
        let program = parts.next().unwrap_or(DEFAULT_INTERPRETER);
        parts.fold(Self::new(program), |runner, arg| runner.arg(arg))
    }

    /// Returns the interpreter program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Executes `code` and returns captured stdout.
    ///
    /// Blocks the calling thread until the interpreter exits.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Io`] if the interpreter cannot be spawned or
    /// fed, and [`HostError::Execution`] if it exits unsuccessfully.
    pub fn run(&self, code: &str) -> Result<String, HostError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is fed from its own thread while stdout and stderr drain.
        let stdin = child.stdin.take();
        let (output, fed) = std::thread::scope(|scope| {
            let feeder = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(code.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let fed = feeder
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (output, fed)
        });
        let output = output?;
        match fed {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!("interpreter closed stdin before reading all code");
            }
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = stderr
            .lines()
            .last()
            .map_or_else(|| format!("script exited with {}", output.status), str::to_string);
        Err(HostError::Execution {
            message: format!("Error executing script: {message}"),
            trace: Some(stderr).filter(|s| !s.is_empty()),
        })
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}
