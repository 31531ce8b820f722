//! External program invocation shared by the stamper and the mail sender.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Program not found: {program}")]
    NotFound { program: String },

    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Program plus argument template.
///
/// Arguments may contain `{name}` placeholders filled in per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Substitute `{name}` placeholders in every argument.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{}}}", name), value)
                })
            })
            .collect()
    }

    /// Run the program to completion, optionally feeding `stdin`.
    ///
    /// The child is killed if the returned future is dropped, so an
    /// enclosing timeout cannot leave an orphaned process behind.
    pub async fn run(
        &self,
        vars: &[(&str, &str)],
        stdin: Option<&[u8]>,
    ) -> Result<CommandOutput, CommandError> {
        let args = self.render_args(vars);
        debug!("Running {} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.io_error(e))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await.map_err(|e| self.io_error(e))?;
            // Dropping the pipe closes it so the child sees EOF
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.io_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CommandError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }

    fn io_error(&self, e: std::io::Error) -> CommandError {
        if e.kind() == std::io::ErrorKind::NotFound {
            CommandError::NotFound {
                program: self.program.clone(),
            }
        } else {
            CommandError::Io {
                program: self.program.clone(),
                source: e,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandConfig {
        CommandConfig::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_render_args() {
        let cmd = CommandConfig::new(
            "stamp",
            vec!["--in={input}".to_string(), "{output}".to_string(), "-q".to_string()],
        );
        let args = cmd.render_args(&[("input", "/tmp/a"), ("output", "/tmp/b")]);
        assert_eq!(args, vec!["--in=/tmp/a", "/tmp/b", "-q"]);
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = sh("echo {greeting}")
            .run(&[("greeting", "hello")], None)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_feeds_stdin() {
        let output = CommandConfig::new("cat", vec![])
            .run(&[], Some(b"report body"))
            .await
            .unwrap();
        assert_eq!(output.stdout, "report body");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let err = sh("echo boom >&2; exit 3").run(&[], None).await.unwrap_err();
        match err {
            CommandError::Failed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = CommandConfig::new("/nonexistent/pdfpost-tool", vec![])
            .run(&[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }
}
