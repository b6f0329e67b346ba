use std::path::PathBuf;

use crate::cancel::Cancellation;
use crate::config::StorageConfig;
use crate::error::{Result, SweepError};
use crate::process::{CommandRunner, CommandSpec};
use crate::retry::{retry_until_success, RetryPolicy};

/// Remote storage reached through its command line client.
///
/// Both operations are idempotent on the remote side, so a failed attempt is
/// simply repeated under the retry policy.
pub struct RemoteStorage<'a, R> {
    config: &'a StorageConfig,
    policy: &'a RetryPolicy,
    cancel: &'a Cancellation,
    runner: &'a R,
}

impl<'a, R: CommandRunner> RemoteStorage<'a, R> {
    pub fn new(
        config: &'a StorageConfig,
        policy: &'a RetryPolicy,
        cancel: &'a Cancellation,
        runner: &'a R,
    ) -> Self {
        RemoteStorage {
            config,
            policy,
            cancel,
            runner,
        }
    }

    pub fn mkdir_command(&self, uri: &str) -> Result<CommandSpec> {
        Ok(base_command(&self.config.mkdir, "storage.mkdir")?.arg(uri))
    }

    pub fn copy_command(&self, files: &[PathBuf], uri: &str) -> Result<CommandSpec> {
        Ok(base_command(&self.config.copy, "storage.copy")?
            .args(files.iter().map(|f| f.to_string_lossy().into_owned()))
            .arg(uri))
    }

    /// Create `uri` and its parents, retrying until the client succeeds.
    pub async fn ensure_dir(&self, uri: &str) -> Result<u32> {
        let spec = self.mkdir_command(uri)?;
        self.run_with_retry(&format!("mkdir {}", uri), &spec).await
    }

    /// Copy `files` into `uri`, retrying until the client succeeds.
    pub async fn upload(&self, files: &[PathBuf], uri: &str) -> Result<u32> {
        let spec = self.copy_command(files, uri)?;
        self.run_with_retry(&format!("upload of {} file(s) to {}", files.len(), uri), &spec)
            .await
    }

    async fn run_with_retry(&self, label: &str, spec: &CommandSpec) -> Result<u32> {
        tracing::info!("{}", spec.display());
        retry_until_success(label, self.policy, self.cancel, |attempt| async move {
            let output = self.runner.run(spec).await?;
            if !output.success() {
                tracing::debug!(
                    "attempt {} of {} exited {:?}: {}",
                    attempt,
                    label,
                    output.status_code,
                    output.stderr_tail(5)
                );
            }
            Ok(output.success())
        })
        .await
    }
}

fn base_command(argv: &[String], field: &str) -> Result<CommandSpec> {
    CommandSpec::from_argv(argv)
        .ok_or_else(|| SweepError::Config(format!("{} needs a program name", field)))
}
