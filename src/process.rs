use std::path::PathBuf;
use std::process::Stdio;

use crate::error::{Result, SweepError};

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Build from an argv list such as `["vcp", "-v"]`.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(CommandSpec {
            program: program.clone(),
            args: rest.to_vec(),
            cwd: None,
        })
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

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Shell-like rendering for logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Result of running a command to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Last `lines` lines of stderr, for error messages.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Seam between the sweep and the processes it starts.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runs commands with `tokio::process`, capturing stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioRunner;

impl CommandRunner for TokioRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        tracing::debug!("exec: {}", spec.display());

        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|source| SweepError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let result = ProcessOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stdout.lines() {
            tracing::debug!("[{}] {}", spec.program, line);
        }
        for line in result.stderr.lines() {
            tracing::debug!("[{} stderr] {}", spec.program, line);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_flag_value() {
        let spec = CommandSpec::new("daomop-sns")
            .arg("/data/HSC")
            .args(["--ccd", "7"]);
        assert_eq!(spec.args, vec!["/data/HSC", "--ccd", "7"]);
        assert_eq!(spec.flag_value("--ccd"), Some("7"));
        assert_eq!(spec.flag_value("--pointing"), None);
    }

    #[test]
    fn test_from_argv() {
        let argv = vec!["vcp".to_string(), "-v".to_string()];
        let spec = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(spec.program, "vcp");
        assert_eq!(spec.args, vec!["-v"]);
        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn test_display_quotes_when_needed() {
        let spec = CommandSpec::new("vcp").args(["-v", "my file.fits", "it's", "vos:a/b"]);
        assert_eq!(spec.display(), r"vcp -v 'my file.fits' 'it'\''s' vos:a/b");
    }

    #[test]
    fn test_stderr_tail() {
        let output = ProcessOutput {
            status_code: Some(1),
            stdout: String::new(),
            stderr: "a\nb\nc\nd".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.stderr_tail(2), "c\nd");
        assert_eq!(output.stderr_tail(10), "a\nb\nc\nd");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = TokioRunner.run(&spec).await.unwrap();
        assert_eq!(output.status_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_tokio_runner_missing_program() {
        let spec = CommandSpec::new("definitely-not-a-real-program-sns");
        let err = TokioRunner.run(&spec).await.unwrap_err();
        assert!(matches!(err, SweepError::Spawn { .. }));
    }
}
