//! Shell adapter using `sh -c`.

use std::path::Path;
use std::process::Command;

use crate::ports::shell::{ShellExecutor, ShellOutput};
use crate::ports::PortError;

/// Runs commands through the system shell.
pub struct LiveShellExecutor;

impl ShellExecutor for LiveShellExecutor {
    fn run(&self, command: &str, cwd: Option<&Path>) -> Result<ShellOutput, PortError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output()?;
        Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_inside_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Orders.sln"), "").unwrap();

        let result = LiveShellExecutor.run("ls", Some(dir.path())).unwrap();
        assert!(result.success());
        assert!(result.stdout.contains("Orders.sln"));
    }

    #[test]
    fn non_zero_exit_is_not_an_error() {
        let result = LiveShellExecutor.run("echo broken >&2; exit 3", None).unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr.trim(), "broken");
    }
}
