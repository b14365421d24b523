//! Solution file creation through the external build tool.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::walker::slash_path;
use crate::error::{MigrationError, Result};
use crate::ports::ShellExecutor;

/// Single-quotes `arg` for `sh -c` unless it is plainly safe.
fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Project files under `ms_dir`, relative to it, sorted.
fn project_files(ms_dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(ms_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csproj")))
        .filter_map(|e| e.path().strip_prefix(ms_dir).ok().map(Path::to_path_buf))
        .collect();
    found.sort();
    found
}

fn run_checked(shell: &dyn ShellExecutor, command: &str, cwd: &Path) -> Result<()> {
    let output = shell
        .run(command, Some(cwd))
        .map_err(|e| MigrationError::BuildTool(format!("{command}: {e}")))?;
    if output.success() {
        Ok(())
    } else {
        Err(MigrationError::BuildTool(format!(
            "{command} exited with {}: {}",
            output.exit_code,
            output.stderr.trim()
        )))
    }
}

/// Creates `<ms_name>.sln` in `ms_dir` and adds every generated `.csproj`.
///
/// Returns the number of projects added.
///
/// # Errors
///
/// Returns [`MigrationError::BuildTool`] with the tool's stderr on the first
/// failing command.
pub fn create_solution(shell: &dyn ShellExecutor, tool: &str, ms_dir: &Path, ms_name: &str) -> Result<usize> {
    run_checked(shell, &format!("{} new sln -n {} --force", quote(tool), quote(ms_name)), ms_dir)?;

    let projects = project_files(ms_dir);
    if projects.is_empty() {
        warn!(microservice = %ms_name, "no project files to add to the solution");
    }
    let solution = format!("{ms_name}.sln");
    for project in &projects {
        let command = format!("{} sln {} add {}", quote(tool), quote(&solution), quote(&slash_path(project)));
        run_checked(shell, &command, ms_dir)?;
    }
    info!(microservice = %ms_name, projects = projects.len(), "solution created");
    Ok(projects.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ports::{PortError, ShellOutput};

    #[derive(Default)]
    struct LoggingShell {
        commands: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ShellExecutor for LoggingShell {
        fn run(&self, command: &str, _cwd: Option<&Path>) -> std::result::Result<ShellOutput, PortError> {
            self.commands.lock().unwrap().push(command.to_string());
            let failed = self.fail_on.is_some_and(|needle| command.contains(needle));
            Ok(ShellOutput {
                exit_code: i32::from(failed),
                stdout: String::new(),
                stderr: if failed { "MSB1009: Project file does not exist.".into() } else { String::new() },
            })
        }
    }

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["Orders.Domain/Orders.Domain.csproj", "Orders.Api/Orders.Api.csproj", "Orders.Api/Program.cs"] {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn creates_solution_then_adds_each_project() {
        let dir = layout();
        let shell = LoggingShell::default();
        let added = create_solution(&shell, "dotnet", dir.path(), "Orders").unwrap();
        assert_eq!(added, 2);
        assert_eq!(
            *shell.commands.lock().unwrap(),
            vec![
                "dotnet new sln -n Orders --force",
                "dotnet sln Orders.sln add Orders.Api/Orders.Api.csproj",
                "dotnet sln Orders.sln add Orders.Domain/Orders.Domain.csproj",
            ]
        );
    }

    #[test]
    fn failure_carries_stderr() {
        let dir = layout();
        let shell = LoggingShell { fail_on: Some("Orders.Domain"), ..LoggingShell::default() };
        let err = create_solution(&shell, "dotnet", dir.path(), "Orders").unwrap_err();
        assert!(matches!(err, MigrationError::BuildTool(_)));
        assert!(err.to_string().contains("MSB1009"));
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote("Orders.Api/Orders.Api.csproj"), "Orders.Api/Orders.Api.csproj");
        assert_eq!(quote("My App"), "'My App'");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }
}
