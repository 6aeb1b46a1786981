//! Subprocess Utilities
use std::ffi::OsStr;
use std::io::BufRead;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};

use crate::system::{self, Error};

/// Convenience macro for building an argument list
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        {
            let args: Vec<&std::ffi::OsStr> = vec![$($arg.as_ref()),*];
            args
        }
    };
}
pub(crate) use args;

/// Convenience wrapper around `Command` for building a child process.
///
/// Always sets `LC_ALL=C` / `LC_MESSAGES=C` so sub-process output stays
/// parseable regardless of the host locale.
pub struct ChildBuilder {
    arg0: String,
    command: Command,
}

impl ChildBuilder {
    pub fn new<S>(arg0: S) -> Self
    where
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&arg0);
        command.env("LC_ALL", "C").env("LC_MESSAGES", "C");
        Self {
            arg0: arg0.as_ref().to_string_lossy().to_string(),
            command,
        }
    }

    /// Set args as in `Command`
    #[inline]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    /// Set stdout and stderr to pipe
    #[inline]
    pub fn piped(mut self) -> Self {
        self.command.stdout(Stdio::piped());
        self.command.stderr(Stdio::piped());
        self
    }

    pub fn spawn(mut self) -> Result<ChildProcess, Error> {
        let args_str = self
            .command
            .get_args()
            .map(|s| s.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let command_str = format!("{} {}", self.arg0, args_str);
        let child = self
            .command
            .spawn()
            .map_err(|e| Error::SpawnChild(command_str.clone(), e))?;
        Ok(ChildProcess { command_str, child })
    }
}

/// Convenience wrapper around `Child` for a spawned process
pub struct ChildProcess {
    command_str: String,
    child: Child,
}

impl ChildProcess {
    pub fn command(&self) -> &str {
        &self.command_str
    }

    pub fn take_stdout(&mut self) -> Option<std::io::BufReader<ChildStdout>> {
        self.child.stdout.take().map(std::io::BufReader::new)
    }

    pub fn take_stderr(&mut self) -> Option<std::io::BufReader<ChildStderr>> {
        self.child.stderr.take().map(std::io::BufReader::new)
    }

    /// Take the stderr, and dump it using `errorln!`
    pub fn dump_stderr(&mut self, prefix: &str) {
        if let Some(stderr) = self.take_stderr() {
            for line in stderr.lines().flatten() {
                system::errorln!(prefix, "{line}");
            }
        }
    }

    /// Wait for the child process to exit, returning an error on non-zero status.
    pub fn wait(mut self) -> Result<ExitStatus, Error> {
        let status = self
            .child
            .wait()
            .map_err(|e| Error::WaitForChild(self.command_str.clone(), e))?;
        Ok(status)
    }

    /// Wait and require success, bubbling `CommandFailed` otherwise.
    pub fn wait_success(self) -> Result<(), Error> {
        let command_str = self.command_str.clone();
        let status = self.wait()?;
        if !status.success() {
            return Err(Error::CommandFailed(command_str, status));
        }
        Ok(())
    }
}
