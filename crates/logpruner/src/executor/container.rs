use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::{CapturedOutput, Command, EnvironmentBindings, MaintenanceExecutor};
use crate::{Error, Result};

/// Bound for removing a container left behind by a timed out invocation.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs tool command lines inside the maintenance image.
///
/// Credentials are forwarded with `-e NAME` only. Docker reads the values from
/// its own environment, so they never show up in a rendered command line.
///
/// Every container gets a unique name. Killing the local `docker` client does
/// not stop the container, so on timeout it is removed by name.
pub struct ContainerRunner {
    executor: Arc<dyn MaintenanceExecutor>,
    image: String,
    env: EnvironmentBindings,
}

impl ContainerRunner {
    pub fn new(
        executor: Arc<dyn MaintenanceExecutor>,
        image: impl Into<String>,
        env: EnvironmentBindings,
    ) -> Self {
        Self {
            executor,
            image: image.into(),
            env,
        }
    }

    /// Wrap a tool command into `docker run` for a container called `name`.
    pub fn wrap(&self, name: &str, tool: &Command) -> Command {
        let mut cmd = Command::new("docker").args(["run", "--rm", "--name", name]);
        for var in self.env.names() {
            cmd = cmd.arg("-e").arg(var);
        }
        // The image entrypoint is /bin/sh, so only `-c` is needed.
        cmd.arg("-i")
            .arg(self.image.as_str())
            .arg("-c")
            .arg(tool.to_string())
    }

    pub fn remove_command(name: &str) -> Command {
        Command::new("docker").args(["rm", "-f", name])
    }

    pub async fn run(&self, tool: &Command, timeout: Duration) -> Result<CapturedOutput> {
        let name = format!("logpruner-{}", Uuid::new_v4());
        let command = self.wrap(&name, tool);

        match self.executor.run(&command, &self.env, timeout).await {
            Err(Error::Timeout { command, timeout }) => {
                self.remove(&name).await;
                Err(Error::Timeout { command, timeout })
            }
            other => other,
        }
    }

    async fn remove(&self, name: &str) {
        let command = Self::remove_command(name);
        match self.executor.run(&command, &self.env, CLEANUP_TIMEOUT).await {
            Ok(_) => info!(container = %name, "Removed timed out container"),
            Err(e) => warn!(container = %name, error = %e, "Failed to remove timed out container"),
        }
    }
}
