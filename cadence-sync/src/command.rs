//! External commands with a deadline: the validate and reload actions.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use cadence_core::config::CONFIG_PLACEHOLDER;

use crate::error::{Stage, SyncError};

/// An argv vector plus the deadline it must finish within.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    /// Space-joined argv, for messages.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }

    /// argv with every `{config}` replaced by `config`.
    pub fn argv_for(&self, config: Option<&Path>) -> Vec<String> {
        match config {
            Some(path) => {
                let path = path.to_string_lossy();
                self.argv
                    .iter()
                    .map(|arg| arg.replace(CONFIG_PLACEHOLDER, &path))
                    .collect()
            }
            None => self.argv.clone(),
        }
    }

    /// Run to completion and return its output, whatever the exit status.
    ///
    /// The child is killed if the deadline passes.
    pub(crate) async fn output(
        &self,
        stage: Stage,
        config: Option<&Path>,
    ) -> Result<Output, SyncError> {
        let argv = self.argv_for(config);
        let Some((program, args)) = argv.split_first() else {
            return Err(SyncError::Spawn {
                stage,
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                stage,
                command: self.display(),
                source,
            })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(SyncError::Spawn {
                stage,
                command: self.display(),
                source,
            }),
            Err(_) => Err(SyncError::Timeout {
                stage,
                after: self.timeout,
            }),
        }
    }

    /// Run the validate command against `candidate`.
    pub async fn validate(&self, candidate: &Path) -> Result<(), SyncError> {
        let output = self.output(Stage::Write, Some(candidate)).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(SyncError::Validation {
            command: self.display(),
            status: output.status.code(),
            stderr: stderr_text(&output),
        })
    }
}

pub(crate) fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(argv: &[&str]) -> CommandSpec {
        CommandSpec::new(
            argv.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn placeholder_is_substituted_everywhere() {
        let cmd = spec(&["nginx", "-t", "-c", "{config}", "--copy={config}"]);
        let argv = cmd.argv_for(Some(Path::new("/tmp/nginx.conf.cadence.tmp")));
        assert_eq!(
            argv,
            vec![
                "nginx",
                "-t",
                "-c",
                "/tmp/nginx.conf.cadence.tmp",
                "--copy=/tmp/nginx.conf.cadence.tmp"
            ]
        );
    }

    #[test]
    fn argv_untouched_without_config() {
        let cmd = spec(&["nginx", "-s", "reload"]);
        assert_eq!(cmd.argv_for(None), cmd.argv);
        assert_eq!(cmd.display(), "nginx -s reload");
    }

    #[tokio::test]
    async fn failing_validation_reports_status_and_stderr() {
        let cmd = spec(&["sh", "-c", "echo 'bad directive' >&2; exit 1"]);
        let err = cmd.validate(Path::new("/dev/null")).await.unwrap_err();
        match err {
            SyncError::Validation { status, stderr, .. } => {
                assert_eq!(status, Some(1));
                assert_eq!(stderr, "bad directive");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let cmd = spec(&["/nonexistent/cadence-validate"]);
        let err = cmd.validate(Path::new("/dev/null")).await.unwrap_err();
        assert!(matches!(err, SyncError::Spawn { stage: Stage::Write, .. }));
    }
}
