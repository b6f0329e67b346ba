use std::path::PathBuf;

use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::grid::GridCell;
use crate::models::SweepTarget;
use crate::process::{CommandRunner, CommandSpec, ProcessOutput};

/// Lines of tool stderr carried into the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Builds and runs the shift-and-stack tool for single grid cells.
pub struct DetectionTool<'a> {
    config: &'a SweepConfig,
    base_dir: PathBuf,
}

impl<'a> DetectionTool<'a> {
    pub fn new(config: &'a SweepConfig) -> Result<Self> {
        let base_dir = std::path::absolute(&config.base_dir).map_err(|source| {
            SweepError::Staging {
                dir: config.base_dir.clone(),
                source,
            }
        })?;
        Ok(DetectionTool { config, base_dir })
    }

    /// Command for one cell: min and max collapse onto the cell's value so the
    /// tool stacks exactly one (rate, angle) pair; the step is passed as-is.
    pub fn command(&self, target: &SweepTarget, cell: &GridCell) -> CommandSpec {
        let config = self.config;
        let rate = cell.rate.to_string();
        let angle = cell.angle.to_string();

        let mut spec = CommandSpec::new(&config.tool.program)
            .arg(self.base_dir.to_string_lossy())
            .args(["--rerun".to_string(), config.rerun_spec()])
            .args(["--rate-min", rate.as_str(), "--rate-max", rate.as_str()])
            .args(["--rate-step".to_string(), config.rates.step.to_string()])
            .args(["--angle-min", angle.as_str(), "--angle-max", angle.as_str()])
            .args(["--angle-step".to_string(), config.angles.step.to_string()])
            .args(["--pointing", target.pointing.as_str()])
            .args(["--ccd", target.chip.as_str()]);
        if config.mask {
            spec = spec.arg("--mask");
        }
        spec.args(["--clip".to_string(), config.clip.to_string()])
            .args(["--log-level", config.tool_log_level.as_str()])
            .args(config.tool.extra_args.iter().cloned())
    }

    /// Run the tool for `cell`; any non-zero exit is a [`SweepError::ToolInvocation`].
    pub async fn run<R: CommandRunner>(
        &self,
        runner: &R,
        target: &SweepTarget,
        cell: &GridCell,
    ) -> Result<ProcessOutput> {
        let spec = self.command(target, cell);
        tracing::info!("Stacking {}: {}", cell, spec.display());

        let output = runner.run(&spec).await?;
        if !output.success() {
            tracing::error!(
                "{} exited with {:?} at {}",
                spec.program,
                output.status_code,
                cell
            );
            return Err(SweepError::ToolInvocation {
                cell: *cell,
                status_code: output.status_code,
                stderr_tail: output.stderr_tail(STDERR_TAIL_LINES),
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        calls: RefCell<Vec<CommandSpec>>,
        status: Option<i32>,
    }

    impl CommandRunner for Recorder {
        async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
            self.calls.borrow_mut().push(spec.clone());
            Ok(ProcessOutput {
                status_code: self.status,
                stdout: String::new(),
                stderr: "line1\nTraceback: no images".to_string(),
            })
        }
    }

    fn cell() -> GridCell {
        GridCell {
            index: 0,
            rate: 1.5,
            angle: -7.5,
        }
    }

    fn config() -> SweepConfig {
        SweepConfig {
            base_dir: PathBuf::from("/data/HSC"),
            ..SweepConfig::default()
        }
    }

    #[test]
    fn test_command_line() {
        let config = config();
        let tool = DetectionTool::new(&config).unwrap();
        let target = SweepTarget::new("vos:sns", "03148", "7");
        let spec = tool.command(&target, &cell());

        assert_eq!(spec.program, "daomop-sns");
        assert_eq!(
            spec.args,
            vec![
                "/data/HSC",
                "--rerun",
                "diff:sns",
                "--rate-min",
                "1.5",
                "--rate-max",
                "1.5",
                "--rate-step",
                "0.5",
                "--angle-min",
                "-7.5",
                "--angle-max",
                "-7.5",
                "--angle-step",
                "2.5",
                "--pointing",
                "03148",
                "--ccd",
                "7",
                "--mask",
                "--clip",
                "16",
                "--log-level",
                "INFO",
            ]
        );
    }

    #[test]
    fn test_relative_base_dir_is_made_absolute() {
        let config = SweepConfig::default();
        let tool = DetectionTool::new(&config).unwrap();
        let spec = tool.command(&SweepTarget::new("vos:sns", "p", "1"), &cell());
        assert!(PathBuf::from(&spec.args[0]).is_absolute());
        assert!(spec.args[0].ends_with("HSC"));
    }

    #[test]
    fn test_mask_off_and_extra_args() {
        let mut config = config();
        config.mask = false;
        config.tool.extra_args = vec!["--stack-mode".to_string(), "MEAN".to_string()];
        let tool = DetectionTool::new(&config).unwrap();
        let spec = tool.command(&SweepTarget::new("vos:sns", "p", "1"), &cell());
        assert!(!spec.args.iter().any(|a| a == "--mask"));
        assert_eq!(spec.flag_value("--stack-mode"), Some("MEAN"));
        assert_eq!(spec.args.last().map(String::as_str), Some("MEAN"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_tool_error() {
        let config = config();
        let tool = DetectionTool::new(&config).unwrap();
        let runner = Recorder {
            calls: RefCell::new(Vec::new()),
            status: Some(4),
        };
        let err = tool
            .run(&runner, &SweepTarget::new("vos:sns", "p", "1"), &cell())
            .await
            .unwrap_err();
        match err {
            SweepError::ToolInvocation {
                cell: failed,
                status_code,
                stderr_tail,
            } => {
                assert_eq!(failed, cell());
                assert_eq!(status_code, Some(4));
                assert!(stderr_tail.contains("no images"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_exit_passes() {
        let config = config();
        let tool = DetectionTool::new(&config).unwrap();
        let runner = Recorder {
            calls: RefCell::new(Vec::new()),
            status: Some(0),
        };
        let output = tool
            .run(&runner, &SweepTarget::new("vos:sns", "p", "1"), &cell())
            .await
            .unwrap();
        assert!(output.success());
    }
}
