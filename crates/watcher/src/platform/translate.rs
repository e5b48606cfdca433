//! Translation of notify events into raw record actions

use crate::filter::ChangeFilter;
use crate::record::Action;
use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Stateful translator for one watched root.
///
/// inotify reports a rename as `From`, `To` and then a combined `Both`; the
/// `Both` is dropped when it repeats the pair just emitted.
pub(crate) struct Translator {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    filter: ChangeFilter,
    last_from: Option<PathBuf>,
    last_to: Option<PathBuf>,
}

impl Translator {
    pub(crate) fn new(root: &Path, filter: ChangeFilter) -> Self {
        let canonical_root = std::fs::canonicalize(root)
            .ok()
            .filter(|canonical| canonical != root);
        Self {
            root: root.to_path_buf(),
            canonical_root,
            filter,
            last_from: None,
            last_to: None,
        }
    }

    pub(crate) fn translate(&mut self, event: &Event) -> Vec<(Action, String)> {
        let mut out = Vec::new();
        let Some(path) = event.paths.first() else {
            return out;
        };

        match event.kind {
            EventKind::Create(kind) => {
                let hint = match kind {
                    CreateKind::File => Some(false),
                    CreateKind::Folder => Some(true),
                    _ => None,
                };
                if self.filter.wants_name_change(hint) {
                    self.emit(&mut out, Action::Added, path);
                }
            }
            EventKind::Remove(kind) => {
                let hint = match kind {
                    RemoveKind::File => Some(false),
                    RemoveKind::Folder => Some(true),
                    _ => None,
                };
                if self.filter.wants_name_change(hint) {
                    self.emit(&mut out, Action::Removed, path);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => self.rename(&mut out, mode, event),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime))
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Other) => {
                if self.filter.wants_write() {
                    self.emit(&mut out, Action::Modified, path);
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => {
                if self.filter.wants_attributes() {
                    self.emit(&mut out, Action::Modified, path);
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {
                trace!("Ignoring {:?} for {}", event.kind, path.display());
            }
        }

        out
    }

    fn rename(&mut self, out: &mut Vec<(Action, String)>, mode: RenameMode, event: &Event) {
        let path = &event.paths[0];
        if !self.filter.wants_name_change(None) {
            return;
        }

        match mode {
            RenameMode::From => {
                self.last_from = Some(path.clone());
                self.last_to = None;
                self.emit(out, Action::RenamedOldName, path);
            }
            RenameMode::To => {
                self.last_to = Some(path.clone());
                self.emit(out, Action::RenamedNewName, path);
            }
            RenameMode::Both if event.paths.len() >= 2 => {
                let (from, to) = (&event.paths[0], &event.paths[1]);
                let repeated = self.last_from.as_ref() == Some(from)
                    && self.last_to.as_ref() == Some(to);
                self.last_from = None;
                self.last_to = None;
                if !repeated {
                    self.emit(out, Action::RenamedOldName, from);
                    self.emit(out, Action::RenamedNewName, to);
                }
            }
            // FSEvents cannot tell the two halves apart; whichever side
            // still exists is the new name.
            _ => {
                let action = if path.exists() {
                    Action::RenamedNewName
                } else {
                    Action::RenamedOldName
                };
                self.emit(out, action, path);
            }
        }
    }

    fn emit(&self, out: &mut Vec<(Action, String)>, action: Action, path: &Path) {
        let name = self.relative(path);
        if name.is_empty() {
            trace!("Ignoring {:?} on the watched root itself", action);
            return;
        }
        out.push((action, name));
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path
            .strip_prefix(&self.root)
            .ok()
            .or_else(|| {
                self.canonical_root
                    .as_deref()
                    .and_then(|root| path.strip_prefix(root).ok())
            })
            .unwrap_or(path);
        rel.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    fn translator() -> Translator {
        Translator::new(Path::new("/w"), ChangeFilter::default())
    }

    #[test]
    fn test_create_and_remove() {
        let mut t = translator();
        assert_eq!(
            t.translate(&event(EventKind::Create(CreateKind::File), &["/w/a.txt"])),
            vec![(Action::Added, "a.txt".to_string())]
        );
        assert_eq!(
            t.translate(&event(EventKind::Remove(RemoveKind::Folder), &["/w/sub"])),
            vec![(Action::Removed, "sub".to_string())]
        );
    }

    #[test]
    fn test_nested_paths_are_relative() {
        let mut t = translator();
        let out = t.translate(&event(EventKind::Create(CreateKind::Any), &["/w/sub/b.txt"]));
        assert_eq!(out[0].1, Path::new("sub").join("b.txt").to_string_lossy());
    }

    #[test]
    fn test_inotify_rename_sequence_is_not_duplicated() {
        let mut t = translator();
        let mut out = Vec::new();
        out.extend(t.translate(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/w/a.txt"],
        )));
        out.extend(t.translate(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/w/c.txt"],
        )));
        out.extend(t.translate(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/a.txt", "/w/c.txt"],
        )));

        assert_eq!(
            out,
            vec![
                (Action::RenamedOldName, "a.txt".to_string()),
                (Action::RenamedNewName, "c.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_standalone_both_emits_pair() {
        let mut t = translator();
        let out = t.translate(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/x", "/w/y"],
        ));
        assert_eq!(
            out,
            vec![
                (Action::RenamedOldName, "x".to_string()),
                (Action::RenamedNewName, "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_write_respects_filter() {
        let modify = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/w/a.txt"],
        );

        let mut t = translator();
        assert_eq!(t.translate(&modify).len(), 1);

        let mut t = Translator::new(Path::new("/w"), ChangeFilter::FILE_NAME);
        assert!(t.translate(&modify).is_empty());
    }

    #[test]
    fn test_access_and_root_events_ignored() {
        let mut t = translator();
        assert!(t
            .translate(&event(
                EventKind::Access(notify::event::AccessKind::Any),
                &["/w/a.txt"]
            ))
            .is_empty());
        assert!(t
            .translate(&event(EventKind::Remove(RemoveKind::Any), &["/w"]))
            .is_empty());
    }
}
