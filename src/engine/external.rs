//! Subprocess adapter for the external patch engine
//!
//! The engine executable is invoked as `<engine> apply --artifact A
//! --selection S --changes DIR` and reports per-patch results as
//! line-delimited JSON on stdout, ending with a completion marker:
//!
//! ```text
//! {"event":"patch","name":"strip-ads","success":true}
//! {"event":"patch","name":"dark-theme","success":false,"error":"resource missing"}
//! {"event":"finished"}
//! ```
//!
//! `<engine> build --artifact A --changes DIR --output OUT` materializes the
//! accumulated changes onto a fresh copy of the original artifact.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::{RepatchError, Result};

use super::{ApplyJob, EngineStream, PatchEngine, PatchEvent};

/// Wire format of one engine stdout line
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    Patch {
        name: String,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Finished,
}

/// External engine invoked as a subprocess
#[derive(Debug, Clone)]
pub struct ExternalEngine {
    program: PathBuf,
}

impl ExternalEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PatchEngine for ExternalEngine {
    async fn apply(&self, job: &ApplyJob) -> Result<EngineStream> {
        let mut child = Command::new(&self.program)
            .arg("apply")
            .arg("--artifact")
            .arg(&job.artifact)
            .arg("--selection")
            .arg(&job.selection)
            .arg("--changes")
            .arg(&job.changes)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RepatchError::EngineSpawnFailed {
                reason: format!("{}: {e}", self.program.display()),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RepatchError::EngineSpawnFailed {
                reason: "engine stdout not captured".to_string(),
            })?;

        let (tx, rx) = mpsc::channel(16);
        let completion = tokio::spawn(drive(child, stdout, tx));
        Ok(EngineStream::new(rx, completion))
    }

    async fn build(&self, original: &Path, changes: &Path, output: &Path) -> Result<()> {
        let out = Command::new(&self.program)
            .arg("build")
            .arg("--artifact")
            .arg(original)
            .arg("--changes")
            .arg(changes)
            .arg("--output")
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RepatchError::EngineSpawnFailed {
                reason: format!("{}: {e}", self.program.display()),
            })?;

        if !out.status.success() {
            return Err(RepatchError::RebuildFailed {
                reason: failure_detail(&out.stderr, out.status.code()),
            });
        }
        Ok(())
    }
}

/// Forward patch events until the completion marker, then reap the child.
///
/// A dropped receiver means the caller cancelled; the child is killed and
/// the remainder of the stream discarded.
async fn drive(
    mut child: Child,
    stdout: tokio::process::ChildStdout,
    tx: mpsc::Sender<PatchEvent>,
) -> Result<()> {
    let mut lines = BufReader::new(stdout).lines();
    let mut finished = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                let _ = child.start_kill();
                return Err(RepatchError::EngineFailed {
                    reason: format!("failed to read engine output: {e}"),
                });
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: WireEvent =
            serde_json::from_str(line).map_err(|e| RepatchError::EngineProtocol {
                reason: format!("unparseable event line {line:?}: {e}"),
            })?;

        match event {
            WireEvent::Patch {
                name,
                success,
                error,
            } => {
                let event = PatchEvent {
                    name,
                    success,
                    error,
                };
                if tx.send(event).await.is_err() {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Ok(());
                }
            }
            WireEvent::Finished => {
                finished = true;
                break;
            }
        }
    }

    drop(tx);
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| RepatchError::EngineFailed {
            reason: format!("failed to wait for engine: {e}"),
        })?;

    if !output.status.success() {
        return Err(RepatchError::EngineFailed {
            reason: failure_detail(&output.stderr, output.status.code()),
        });
    }

    if !finished {
        return Err(RepatchError::EngineProtocol {
            reason: "event stream ended without completion marker".to_string(),
        });
    }

    Ok(())
}

fn failure_detail(stderr: &[u8], code: Option<i32>) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        match code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    } else {
        stderr.to_string()
    }
}
