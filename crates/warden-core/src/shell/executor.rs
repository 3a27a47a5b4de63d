/// Privileged command execution seam
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::path::PathBuf;
use tokio::process::Command;

/// Captured outcome of a privileged shell command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Captured stdout, one entry per line.
    pub out: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executor of command strings inside the framework's privileged shell.
///
/// The library never assumes how privilege is obtained; callers provide an
/// implementation bound to whatever root transport the host process has.
pub trait RootExecutor: Send + Sync {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>>;
}

/// [`RootExecutor`] backed by a local shell binary.
///
/// Suitable when the hosting process itself already runs with the required
/// privilege; the command string is handed to `<shell> -c` verbatim.
pub struct ShellExecutor {
    shell: PathBuf,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self { shell: "sh".into() }
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RootExecutor for ShellExecutor {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            let output = Command::new(&self.shell)
                .arg("-c")
                .arg(command)
                .output()
                .await
                .with_context(|| format!("Failed to spawn shell command: {}", command))?;

            let out = String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::to_string)
                .collect();

            Ok(CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                out,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code_and_stdout_lines() {
        let exec = ShellExecutor::new();
        let output = exec.run("printf 'one\\ntwo\\n'").await.unwrap();
        assert!(output.success());
        assert_eq!(output.out, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn reports_failure_exit_code() {
        let exec = ShellExecutor::new();
        let output = exec.run("exit 3").await.unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
    }
}
