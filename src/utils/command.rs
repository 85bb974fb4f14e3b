use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use crate::error::{ResearchError, Result};

/// Runs read-only queries against local package-manager tools
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs `program` with `args` and returns its standard output.
    ///
    /// A non-zero exit, a spawn failure or a timeout is an error.
    async fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// [`ToolRunner`] backed by real child processes
#[derive(Debug, Clone)]
pub struct SystemToolRunner {
    timeout: Duration,
}

impl SystemToolRunner {
    /// Creates a runner that kills any invocation exceeding `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!(program, ?args, "running local tool");
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                ResearchError::Timeout(format!("{} {} after {:?}", program, args.join(" "), self.timeout))
            })??;

        if !output.status.success() {
            return Err(ResearchError::ToolFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
