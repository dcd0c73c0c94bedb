use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use super::{CapturedOutput, Command, EnvironmentBindings, MaintenanceExecutor};
use crate::{Error, Result};

/// Executes commands as local child processes.
///
/// The child starts from an empty environment and only receives the given
/// bindings. Anything written to stderr fails the invocation, since the
/// wrapped tools report partial failures there while still exiting 0.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MaintenanceExecutor for ProcessExecutor {
    async fn run(
        &self,
        command: &Command,
        env: &EnvironmentBindings,
        timeout: Duration,
    ) -> Result<CapturedOutput> {
        let rendered = command.to_string();
        debug!(command = %rendered, ?timeout, "Spawning external command");

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool {
                command: rendered.clone(),
                diagnostic: format!("failed to spawn: {}", e),
            })?;

        let (stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                return Err(Error::ExternalTool {
                    command: rendered,
                    diagnostic: "child output streams were not captured".to_string(),
                })
            }
        };

        let collect = async {
            let mut out = Vec::new();
            let mut err = Vec::new();

            let read_stdout = async {
                let mut reader = BufReader::new(stdout);
                loop {
                    let start = out.len();
                    if reader.read_until(b'\n', &mut out).await? == 0 {
                        break;
                    }
                    debug!(line = %String::from_utf8_lossy(&out[start..]).trim_end(), "stdout");
                }
                Ok::<_, std::io::Error>(())
            };
            let read_stderr = stderr.read_to_end(&mut err);

            tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let outcome = tokio::time::timeout(timeout, collect).await;
        let (status, stdout, stderr) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(command = %rendered, ?timeout, "Command timed out, killing child process");
                if let Err(e) = child.kill().await {
                    warn!(command = %rendered, error = %e, "Failed to kill timed out child process");
                }
                return Err(Error::Timeout {
                    command: rendered,
                    timeout,
                });
            }
        };

        if !stderr.is_empty() {
            return Err(Error::ExternalTool {
                command: rendered,
                diagnostic: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        if !status.success() {
            return Err(Error::ExternalTool {
                command: rendered,
                diagnostic: format!("exited with {}", status),
            });
        }

        // Decoded last so stderr and exit status always win.
        let stdout = String::from_utf8(stdout).map_err(|e| Error::ExternalTool {
            command: rendered,
            diagnostic: format!("stdout is not valid UTF-8: {}", e),
        })?;

        Ok(CapturedOutput { stdout })
    }
}
