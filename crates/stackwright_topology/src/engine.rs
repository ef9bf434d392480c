//! Hand-off to the external provisioning engine.
//!
//! The engine reconciles the desired state against live infrastructure with
//! its own retry and rollback policy. Its failures are surfaced verbatim.

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::document::DesiredState;
use crate::error::ProvisioningError;

/// Outcome of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub engine: String,
    pub output: String,
}

/// Realizes a desired state.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, state: &DesiredState) -> Result<ApplyReport, ProvisioningError>;
}

/// Engine invoked as an external command that reads the JSON document on stdin.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    ///
    /// Quoting is not interpreted; pass arguments containing spaces with
    /// [`CommandEngine::arg`] instead.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
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

    fn launch_error(&self, message: impl ToString) -> ProvisioningError {
        ProvisioningError::Launch {
            engine: self.program.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ProvisioningEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    async fn apply(&self, state: &DesiredState) -> Result<ApplyReport, ProvisioningError> {
        let document = serde_json::to_vec_pretty(state).map_err(|e| self.launch_error(e))?;

        info!(
            "Handing {} resources to {}",
            state.resources.len(),
            self.program
        );
        debug!("Engine command: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        // stdin must be fed while stdout is drained.
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let result = stdin.write_all(&document).await;
                drop(stdin);
                result
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            return Err(ProvisioningError::Failed {
                engine: self.program.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        // An engine may exit successfully without reading the whole document.
        if let Some(writer) = writer {
            match writer.await.map_err(|e| self.launch_error(e))? {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin before reading the document", self.program);
                }
                Err(e) => return Err(self.launch_error(e)),
            }
        }

        Ok(ApplyReport {
            engine: self.program.clone(),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
