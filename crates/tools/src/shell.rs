//! Shell tool: execute system commands.
//!
//! Supports command allowlisting. On unix the command runs in its own
//! process group, and the whole group is killed if the invocation future
//! is dropped, so the agent's tool timeout and cancellation both reach
//! every subprocess the command started.

use std::process::Stdio;

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{InputShape, Tool, ToolInput};
use tokio::process::Command;
use tracing::{debug, warn};

/// Execute shell commands with an optional allowlist.
pub struct RunCommandTool {
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
}

impl RunCommandTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    fn base_command(command: &str) -> &str {
        command.split_whitespace().next().unwrap_or("")
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        let base_cmd = Self::base_command(command);
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Takes a command as input to execute on system and returns output"
    }

    fn input_shape(&self) -> InputShape {
        InputShape::text("shell command line, e.g. \"ls -la\"")
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let command = input
            .text_or_field("command")
            .ok_or_else(|| ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: format!("expected a command string, got {input}"),
            })?;

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    Self::base_command(command)
                ),
            });
        }

        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "Command could not be started");
                return Ok(e.to_string());
            }
        };
        let mut group = ProcessGroupGuard::new(child.id());

        let result = child.wait_with_output().await;
        group.disarm();

        match result {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                let code = output.status.code().unwrap_or(-1);
                warn!(command = %command, exit_code = code, "Command failed");
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if stderr.trim().is_empty() {
                    Ok(format!("Command failed with exit code {code}"))
                } else {
                    Ok(stderr)
                }
            }
            Err(e) => {
                warn!(command = %command, error = %e, "Command could not be awaited");
                Ok(e.to_string())
            }
        }
    }
}

/// Kills the child's process group on drop unless disarmed.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.and_then(|id| i32::try_from(id).ok()) {
            debug!(pgid, "Killing abandoned command process group");
            // SAFETY: killpg only sends a signal; the group was created for this child.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
}
