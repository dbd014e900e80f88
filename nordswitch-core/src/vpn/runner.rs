//! Subprocess invocation with timeout and failure classification
//!
//! Every interaction with the NordVPN executable funnels through the
//! [`CliDriver`] seam so controllers can be exercised against scripted
//! drivers in tests. The production [`CliRunner`] spawns the executable
//! directly (Linux CLI) or through a composed shell line (Windows GUI
//! client, which only accepts its flag form via the shell).

use crate::error::{CliError, ConfigError, Result, SwitchError};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured text output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Seam for issuing NordVPN CLI commands
///
/// Exactly one of success-with-output or a classified error is produced
/// per call; there are no partial outcomes.
pub trait CliDriver {
    fn run(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput>>;
}

impl<D: CliDriver> CliDriver for &D {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        (**self).run(args, timeout).await
    }
}

/// Production driver invoking the NordVPN executable
#[derive(Debug, Clone)]
pub struct CliRunner {
    exe: PathBuf,
    cwd: Option<PathBuf>,
    via_shell: bool,
}

impl CliRunner {
    /// Driver that executes the binary directly with an argument vector
    pub fn direct(exe: PathBuf) -> Self {
        Self {
            exe,
            cwd: None,
            via_shell: false,
        }
    }

    /// Driver that composes a quoted shell line, run from the install dir
    ///
    /// The Windows desktop client expects to be invoked through the shell
    /// from its own directory; overlapping service reconfiguration breaks
    /// otherwise.
    pub fn via_shell(exe: PathBuf) -> Self {
        let cwd = exe.parent().map(Path::to_path_buf);
        Self {
            exe,
            cwd,
            via_shell: true,
        }
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    fn command_display(&self, args: &[String]) -> String {
        if self.via_shell {
            compose_command_line(&self.exe, args)
        } else {
            let mut parts = vec![self.exe.display().to_string()];
            parts.extend(args.iter().cloned());
            parts.join(" ")
        }
    }

    fn build_command(&self, args: &[String]) -> Command {
        let mut command = if self.via_shell {
            let line = compose_command_line(&self.exe, args);
            let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
            let mut command = Command::new(shell);
            command.arg(flag).arg(line);
            command
        } else {
            let mut command = Command::new(&self.exe);
            command.args(args);
            command
        };

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl CliDriver for CliRunner {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let command_line = self.command_display(args);
        debug!(command = %command_line, timeout_secs = timeout.as_secs(), "Running NordVPN CLI command");

        let child = self.build_command(args).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SwitchError::Config(ConfigError::InvalidExePath {
                    path: self.exe.display().to_string(),
                })
            } else {
                SwitchError::Cli(CliError::CommandFailed {
                    command: command_line.clone(),
                    detail: e.to_string(),
                })
            }
        })?;

        // kill_on_drop reaps the child if the timeout wins the race
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CliError::CommandFailed {
                    command: command_line,
                    detail: e.to_string(),
                }
                .into())
            }
            Err(_elapsed) => {
                return Err(CliError::CommandTimeout {
                    command: command_line,
                    seconds: timeout.as_secs(),
                }
                .into())
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            let detail = if detail.is_empty() {
                "Unknown CLI error".to_string()
            } else {
                detail.to_string()
            };
            return Err(CliError::CommandFailed {
                command: command_line,
                detail,
            }
            .into());
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Compose a single shell command line, quoting arguments that need it
///
/// Arguments containing spaces, `#` or `&` are double-quoted; server
/// names like `Germany #741` would otherwise fall apart in the shell.
pub fn compose_command_line(exe: &Path, args: &[String]) -> String {
    let mut parts = vec![format!("\"{}\"", exe.display())];
    parts.extend(args.iter().map(|arg| quote_arg(arg)));
    parts.join(" ")
}

fn quote_arg(arg: &str) -> String {
    if arg.contains(' ') || arg.contains('#') || arg.contains('&') {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// Run a system utility (DNS flush commands and the like)
///
/// Same timeout and exit-status handling as the CLI driver, but missing
/// binaries classify as a runtime failure: candidate utilities are
/// optional and callers fall through an ordered list.
pub async fn run_system_command(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput> {
    let command_line = format!("{} {}", program, args.join(" "));
    debug!(command = %command_line, "Running system command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CliError::CommandFailed {
            command: command_line.clone(),
            detail: e.to_string(),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(CliError::CommandFailed {
                command: command_line,
                detail: e.to_string(),
            }
            .into())
        }
        Err(_elapsed) => {
            return Err(CliError::CommandTimeout {
                command: command_line,
                seconds: timeout.as_secs(),
            }
            .into())
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(CliError::CommandFailed {
            command: command_line,
            detail,
        }
        .into());
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_quotes_spaces_and_specials() {
        let line = compose_command_line(
            Path::new("C:/Program Files/NordVPN/NordVPN.exe"),
            &[
                "-c".to_string(),
                "-n".to_string(),
                "Germany #741".to_string(),
            ],
        );
        assert_eq!(
            line,
            "\"C:/Program Files/NordVPN/NordVPN.exe\" -c -n \"Germany #741\""
        );
    }

    #[test]
    fn test_compose_leaves_plain_args_bare() {
        let line = compose_command_line(
            Path::new("/usr/bin/nordvpn"),
            &["connect".to_string(), "de123".to_string()],
        );
        assert_eq!(line, "\"/usr/bin/nordvpn\" connect de123");
    }

    #[test]
    fn test_quote_arg_ampersand() {
        assert_eq!(quote_arg("P2P&Streaming"), "\"P2P&Streaming\"");
        assert_eq!(quote_arg("de123"), "de123");
    }

    #[cfg(unix)]
    mod exec {
        use super::*;

        #[tokio::test]
        async fn test_run_captures_stdout() {
            let runner = CliRunner::direct(PathBuf::from("echo"));
            let output = runner
                .run(&["hello".to_string()], Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(output.stdout.trim(), "hello");
        }

        #[tokio::test]
        async fn test_missing_executable_is_config_error() {
            let runner = CliRunner::direct(PathBuf::from("/no/such/nordswitch-binary"));
            let err = runner.run(&[], Duration::from_secs(5)).await.unwrap_err();
            assert!(matches!(err, SwitchError::Config(_)));
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_detail() {
            let runner = CliRunner::direct(PathBuf::from("sh"));
            let err = runner
                .run(
                    &["-c".to_string(), "echo broken >&2; exit 3".to_string()],
                    Duration::from_secs(5),
                )
                .await
                .unwrap_err();
            match err {
                SwitchError::Cli(CliError::CommandFailed { detail, .. }) => {
                    assert_eq!(detail, "broken");
                }
                other => panic!("Expected CommandFailed, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_failure_names_the_command_line() {
            let runner = CliRunner::direct(PathBuf::from("false"));
            let err = runner.run(&[], Duration::from_secs(5)).await.unwrap_err();
            match err {
                SwitchError::Cli(CliError::CommandFailed { command, detail }) => {
                    assert_eq!(command, "false");
                    assert_eq!(detail, "Unknown CLI error");
                }
                other => panic!("Expected CommandFailed, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_timeout_is_reported_with_duration() {
            let runner = CliRunner::direct(PathBuf::from("sleep"));
            let err = runner
                .run(&["5".to_string()], Duration::from_millis(100))
                .await
                .unwrap_err();
            match err {
                SwitchError::Cli(CliError::CommandTimeout { seconds, .. }) => {
                    assert_eq!(seconds, 0);
                }
                other => panic!("Expected CommandTimeout, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_shell_runner_composes_line() {
            let runner = CliRunner::via_shell(PathBuf::from("/bin/echo"));
            let output = runner
                .run(&["a b".to_string()], Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(output.stdout.trim(), "a b");
        }

        #[tokio::test]
        async fn test_run_system_command_missing_binary_is_cli_error() {
            let err = run_system_command("nordswitch-no-such-tool", &[], Duration::from_secs(5))
                .await
                .unwrap_err();
            assert!(matches!(err, SwitchError::Cli(_)));
        }
    }
}
