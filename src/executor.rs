//! The seam between planning and the outside world: something that can run a
//! [`Command`] pipeline and report what each stage did.

use std::process::{Child, Stdio};

use tracing::debug;

use crate::command::Command;
use crate::error::ExecutionError;

/// Captured result of running all stages of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Stdout of the last stage.
    pub stdout: String,
    /// Stderr per stage, in stage order.
    pub stderr: Vec<String>,
    /// Exit code per stage, `None` if killed by a signal.
    pub status: Vec<Option<i32>>,
}
impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.iter().all(|code| *code == Some(0))
    }

    pub fn stderr_text(&self) -> String {
        self.stderr
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait Executor {
    /// Run every stage of `command`. A non-zero exit is reported in the output, not as an error.
    fn execute(&self, command: &Command) -> Result<CommandOutput, ExecutionError>;

    /// Run `command` and fail unless every stage succeeded.
    fn run(&self, command: &Command) -> Result<CommandOutput, ExecutionError> {
        let output = self.execute(command)?;
        if !output.success() {
            let stderr = output.stderr_text();
            return Err(ExecutionError::Failed {
                command: command.to_string(),
                status: output.status,
                stderr,
            });
        }
        Ok(output)
    }
}

/// Runs pipelines as local child processes, all stages at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&self, command: &Command) -> Result<CommandOutput, ExecutionError> {
        debug!("RUN: `{}`", command);

        let spawn_error = |reason: String| ExecutionError::Spawn {
            command: command.to_string(),
            reason,
        };

        let mut children: Vec<Child> = Vec::with_capacity(command.stages().len());
        for stage in command.stages() {
            let Some((program, args)) = stage.split_first() else {
                return Err(spawn_error("empty pipeline stage".to_owned()));
            };
            let mut c = std::process::Command::new(program);
            c.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
            if let Some(previous) = children.last_mut() {
                match previous.stdout.take() {
                    Some(stdout) => c.stdin(Stdio::from(stdout)),
                    None => return Err(spawn_error("failed to get child process stdout".to_owned())),
                };
            }
            match c.spawn() {
                Ok(child) => children.push(child),
                Err(e) => {
                    // Make sure earlier stages do not linger once the pipeline is broken.
                    for mut child in children {
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    return Err(spawn_error(e.to_string()));
                }
            }
        }

        // Upstream stderr is drained concurrently so a chatty stage cannot fill its pipe
        // and stall the pipeline before closing stdout.
        let Some(last) = children.pop() else {
            return Err(spawn_error("empty pipeline".to_owned()));
        };
        let output = std::thread::scope(|scope| {
            let upstream: Vec<_> = children
                .into_iter()
                .map(|child| scope.spawn(move || child.wait_with_output()))
                .collect();
            let last = last.wait_with_output();

            let mut output = CommandOutput::default();
            for handle in upstream {
                let result = handle
                    .join()
                    .map_err(|_| spawn_error("pipeline stage reader panicked".to_owned()))?
                    .map_err(|e| spawn_error(e.to_string()))?;
                output.stderr.push(String::from_utf8_lossy(&result.stderr).into_owned());
                output.status.push(result.status.code());
            }
            let last = last.map_err(|e| spawn_error(e.to_string()))?;
            output.stdout = String::from_utf8_lossy(&last.stdout).into_owned();
            output.stderr.push(String::from_utf8_lossy(&last.stderr).into_owned());
            output.status.push(last.status.code());
            Ok::<_, ExecutionError>(output)
        })?;

        debug!("DONE: `{}` with {:?}", command, output.status);
        Ok(output)
    }
}
