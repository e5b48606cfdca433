//! Buffer decoding and rename pairing
//!
//! Turns the records of one completed read into [`ChangeEvent`]s. The only
//! state carried between buffers is a pending rename old-name, so decoding is
//! a pure function of the buffer contents plus that state.

use crate::event::ChangeEvent;
use crate::record::{Action, Records};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How an added entry is classified as file or directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirClassification {
    /// Look the entry up under the watched root; fall back to the name
    /// heuristic when it no longer exists
    #[default]
    Filesystem,
    /// An entry whose final component has no `.` is a directory
    NameHeuristic,
}

/// Which decoded events reach the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPolicy {
    #[serde(default = "default_true")]
    pub emit_deleted: bool,

    #[serde(default = "default_true")]
    pub emit_modified: bool,

    /// Drop `Modified` for directories (a directory is "modified" whenever
    /// one of its children changes)
    #[serde(default = "default_true")]
    pub suppress_directory_modified: bool,

    #[serde(default)]
    pub classify: DirClassification,
}

impl EventPolicy {
    /// Report creations and renames only, classifying by name
    pub fn creations_and_renames() -> Self {
        Self {
            emit_deleted: false,
            emit_modified: false,
            suppress_directory_modified: true,
            classify: DirClassification::NameHeuristic,
        }
    }
}

impl Default for EventPolicy {
    fn default() -> Self {
        Self {
            emit_deleted: true,
            emit_modified: true,
            suppress_directory_modified: true,
            classify: DirClassification::Filesystem,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Counters for one decoded buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Records walked, including suppressed ones
    pub records: usize,
    /// Events handed to the sink
    pub emitted: usize,
    /// Structural anomalies (at most one per buffer)
    pub anomalies: usize,
    /// The walk ended early because a stop was observed
    pub interrupted: bool,
}

/// Decoder for one watched root
pub struct Decoder {
    root: PathBuf,
    policy: EventPolicy,
    pending_old: Option<String>,
}

impl Decoder {
    pub fn new(root: impl Into<PathBuf>, policy: EventPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            pending_old: None,
        }
    }

    pub fn policy(&self) -> &EventPolicy {
        &self.policy
    }

    /// Old name waiting for its rename-new-name record
    pub fn pending_old(&self) -> Option<&str> {
        self.pending_old.as_deref()
    }

    /// Decode `bytes`, passing each event to `emit` in buffer order.
    ///
    /// `should_stop` is checked before every record; once it returns true
    /// nothing more is emitted.
    pub fn decode<S, E>(&mut self, bytes: &[u8], should_stop: S, mut emit: E) -> DecodeSummary
    where
        S: Fn() -> bool,
        E: FnMut(ChangeEvent),
    {
        let mut summary = DecodeSummary::default();

        for item in Records::new(bytes) {
            if should_stop() {
                summary.interrupted = true;
                break;
            }

            let record = match item {
                Ok(record) => record,
                Err(anomaly) => {
                    warn!("Malformed notification record: {}", anomaly);
                    summary.anomalies += 1;
                    break;
                }
            };
            summary.records += 1;

            if let Some(event) = self.apply(record.code, record.name) {
                summary.emitted += 1;
                emit(event);
            }
        }

        summary
    }

    /// Run one record through the policy and the rename state machine
    fn apply(&mut self, code: u32, name: String) -> Option<ChangeEvent> {
        let Some(action) = Action::from_code(code) else {
            debug!("Unknown action code {} for {:?}", code, name);
            return Some(ChangeEvent::Unknown { code, name });
        };

        match action {
            Action::Added => {
                let is_dir = self.is_dir(&name);
                Some(ChangeEvent::Created { name, is_dir })
            }
            Action::Removed => self
                .policy
                .emit_deleted
                .then_some(ChangeEvent::Deleted { name }),
            Action::Modified => {
                if !self.policy.emit_modified {
                    return None;
                }
                if self.policy.suppress_directory_modified && self.is_dir(&name) {
                    return None;
                }
                Some(ChangeEvent::Modified { name })
            }
            Action::RenamedOldName => {
                if let Some(stale) = self.pending_old.replace(name) {
                    debug!("Rename of {:?} never completed", stale);
                }
                None
            }
            Action::RenamedNewName => Some(ChangeEvent::Renamed {
                old: self.pending_old.take(),
                new: name,
            }),
        }
    }

    fn is_dir(&self, name: &str) -> bool {
        match self.policy.classify {
            DirClassification::Filesystem => match self.root.join(name).metadata() {
                Ok(meta) => meta.is_dir(),
                Err(_) => looks_like_dir(name),
            },
            DirClassification::NameHeuristic => looks_like_dir(name),
        }
    }
}

/// Name heuristic: no extension separator in the final component
fn looks_like_dir(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .map_or(true, |file| !file.to_string_lossy().contains('.'))
}
