use crate::common::{Result, SetupError};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// A single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// False for read-only queries (`uname`, `getcap`) and for commands that
    /// only write into a staging root.
    pub mutates_host: bool,
}

impl Invocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            mutates_host: true,
        }
    }

    pub fn query(program: &str) -> Self {
        Self {
            mutates_host: false,
            ..Self::new(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// None when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self { status: Some(0), ..Self::default() }
    }

    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), ..Self::ok() }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait Executor {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Look a program up on `PATH`.
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Run and turn a non-zero exit status into `SetupError::CommandFailed`.
    fn run_checked(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let output = self.run(invocation)?;
        if output.success() {
            Ok(output)
        } else {
            Err(SetupError::CommandFailed {
                program: invocation.to_string(),
                status: output
                    .status
                    .map(|code| format!("exit {}", code))
                    .unwrap_or_else(|| "killed by signal".to_string()),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs everything for real.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!("Running: {}", invocation);
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .map_err(|source| SetupError::CommandSpawn {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Runs queries but only logs host-mutating commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevExecutor {
    inner: SystemExecutor,
}

impl Executor for DevExecutor {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if invocation.mutates_host {
            tracing::info!("[dev] would run: {}", invocation);
            return Ok(CommandOutput::ok());
        }
        self.inner.run(invocation)
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.inner.which(program)
    }
}
