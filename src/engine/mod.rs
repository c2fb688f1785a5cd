//! Patch engine seam
//!
//! The actual bytecode/resource transformation work is owned by an external
//! engine executable. This module defines the narrow interface the pipeline
//! consumes: an apply call yielding a finite stream of per-patch events with
//! explicit completion, and a build call that materializes the accumulated
//! changes into an output artifact.

pub mod external;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{RepatchError, Result};
use crate::selection::SelectedPatch;

/// One per-patch result reported by the engine during apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEvent {
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
}

/// The finite per-patch event sequence of one apply call.
///
/// Events are consumed one at a time; after the stream is drained,
/// [`EngineStream::finish`] surfaces engine-level failure (bad exit status,
/// protocol violations, a stream that ended without its completion marker).
/// Dropping the stream mid-consumption kills the engine subprocess.
#[derive(Debug)]
pub struct EngineStream {
    events: mpsc::Receiver<PatchEvent>,
    completion: JoinHandle<Result<()>>,
}

impl EngineStream {
    pub(crate) fn new(events: mpsc::Receiver<PatchEvent>, completion: JoinHandle<Result<()>>) -> Self {
        Self { events, completion }
    }

    /// Next per-patch event, or `None` once the sequence is complete
    pub async fn next(&mut self) -> Option<PatchEvent> {
        self.events.recv().await
    }

    /// Wait for the engine to exit and surface any engine-level failure
    pub async fn finish(self) -> Result<()> {
        drop(self.events);
        match self.completion.await {
            Ok(result) => result,
            Err(e) => Err(RepatchError::EngineFailed {
                reason: format!("engine task failed: {e}"),
            }),
        }
    }
}

/// Inputs of one apply call
#[derive(Debug, Clone)]
pub struct ApplyJob {
    /// The working artifact to patch
    pub artifact: PathBuf,
    /// Serialized patch selection handed to the engine
    pub selection: PathBuf,
    /// Directory the engine accumulates its changes into
    pub changes: PathBuf,
}

/// The external patch engine, seen from the pipeline
#[allow(async_fn_in_trait)]
pub trait PatchEngine {
    /// Start applying the selection; yields a finite per-patch event stream
    async fn apply(&self, job: &ApplyJob) -> Result<EngineStream>;

    /// Rebuild: apply accumulated changes onto a fresh copy of `original`
    async fn build(&self, original: &Path, changes: &Path, output: &Path) -> Result<()>;
}

#[derive(Serialize)]
struct SelectionEntry<'a> {
    name: &'a str,
    options: &'a BTreeMap<String, Value>,
}

/// Write the resolved selection as the engine's JSON input format
pub async fn write_selection(path: &Path, patches: &[SelectedPatch]) -> Result<()> {
    let entries: Vec<SelectionEntry<'_>> = patches
        .iter()
        .map(|p| SelectionEntry {
            name: &p.name,
            options: &p.options,
        })
        .collect();

    let json =
        serde_json::to_string_pretty(&entries).map_err(|e| RepatchError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(path, json)
        .await
        .map_err(|e| RepatchError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
