//! Build and launch of compiled control programs
//!
//! The bridge does not compile anything itself. An optional build command
//! is run as-is and its failure reported verbatim as a [`BuildProblem`].

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// A failed build: exit code plus everything it printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProblem {
    /// `None` when the build was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl BuildProblem {
    /// Status for the bridge to exit with; a signal maps to 1
    pub fn process_exit_code(&self) -> i32 {
        self.exit_code.filter(|code| *code != 0).unwrap_or(1)
    }
}

impl fmt::Display for BuildProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => writeln!(f, "exit code {}", code)?,
            None => writeln!(f, "terminated by signal")?,
        }
        if !self.stdout.is_empty() {
            writeln!(f, "--- stdout ---\n{}", self.stdout.trim_end())?;
        }
        if !self.stderr.is_empty() {
            writeln!(f, "--- stderr ---\n{}", self.stderr.trim_end())?;
        }
        Ok(())
    }
}

/// Run a build command (program followed by arguments)
///
/// An empty command is a no-op.
pub fn run_build(command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Ok(());
    };

    log::info!("Building: {}", command.join(" "));
    let output = Command::new(program).args(args).output()?;
    if output.status.success() {
        log::info!("Build succeeded");
        return Ok(());
    }

    Err(Error::Build(BuildProblem {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }))
}

/// Launch a control program with piped stdin/stdout
///
/// Its stdout carries commands to the repeater, its stdin receives
/// responses; stderr is inherited so its logs reach the operator.
pub fn spawn_controller(program: &Path, args: &[String]) -> Result<Child> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| {
            Error::Other(format!(
                "failed to launch control program {}: {}",
                program.display(),
                e
            ))
        })?;
    log::info!(
        "Launched control program {} (pid {})",
        program.display(),
        child.id()
    );
    Ok(child)
}
