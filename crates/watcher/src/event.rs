//! Caller-facing change events

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded change, handed to the sink by value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// File or directory created
    Created { name: String, is_dir: bool },
    /// File or directory deleted
    Deleted { name: String },
    /// File contents or metadata changed
    Modified { name: String },
    /// Renamed; `old` is `None` when the old-name record was never seen
    Renamed { old: Option<String>, new: String },
    /// Record with an action code this decoder does not know
    Unknown { code: u32, name: String },
}

/// Type of change, without the names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Delete,
    Modify,
    Rename,
    Unknown,
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::Created { .. } => EventKind::Create,
            ChangeEvent::Deleted { .. } => EventKind::Delete,
            ChangeEvent::Modified { .. } => EventKind::Modify,
            ChangeEvent::Renamed { .. } => EventKind::Rename,
            ChangeEvent::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// The name this event leaves behind (the new name for renames)
    pub fn name(&self) -> &str {
        match self {
            ChangeEvent::Created { name, .. }
            | ChangeEvent::Deleted { name }
            | ChangeEvent::Modified { name }
            | ChangeEvent::Unknown { name, .. } => name,
            ChangeEvent::Renamed { new, .. } => new,
        }
    }

    /// Whether any name carried by this event equals `name`
    pub fn touches(&self, name: &str) -> bool {
        match self {
            ChangeEvent::Renamed { old, new } => new == name || old.as_deref() == Some(name),
            other => other.name() == name,
        }
    }
}

/// Human-readable log message
impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::Created { name, is_dir: true } => write!(f, "Created folder \"{}\"", name),
            ChangeEvent::Created { name, is_dir: false } => write!(f, "Created file \"{}\"", name),
            ChangeEvent::Deleted { name } => write!(f, "Deleted \"{}\"", name),
            ChangeEvent::Modified { name } => write!(f, "Modified \"{}\"", name),
            ChangeEvent::Renamed {
                old: Some(old),
                new,
            } => write!(f, "Renamed \"{}\" to \"{}\"", old, new),
            ChangeEvent::Renamed { old: None, new } => {
                write!(f, "Renamed to \"{}\" (old name not recorded)", new)
            }
            ChangeEvent::Unknown { code, name } => {
                write!(f, "Unknown action ({}) for \"{}\"", code, name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let created = ChangeEvent::Created {
            name: "sub".into(),
            is_dir: true,
        };
        assert_eq!(created.to_string(), "Created folder \"sub\"");

        let renamed = ChangeEvent::Renamed {
            old: Some("a.txt".into()),
            new: "b.txt".into(),
        };
        assert_eq!(renamed.to_string(), "Renamed \"a.txt\" to \"b.txt\"");

        let orphan = ChangeEvent::Renamed {
            old: None,
            new: "b.txt".into(),
        };
        assert_eq!(
            orphan.to_string(),
            "Renamed to \"b.txt\" (old name not recorded)"
        );

        let unknown = ChangeEvent::Unknown {
            code: 99,
            name: "x".into(),
        };
        assert_eq!(unknown.to_string(), "Unknown action (99) for \"x\"");
    }

    #[test]
    fn test_touches_old_and_new_names() {
        let renamed = ChangeEvent::Renamed {
            old: Some("log.txt".into()),
            new: "log.old".into(),
        };
        assert!(renamed.touches("log.txt"));
        assert!(renamed.touches("log.old"));
        assert!(!renamed.touches("other"));
        assert_eq!(renamed.kind(), EventKind::Rename);
    }
}
