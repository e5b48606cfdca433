//! Watch a directory and journal every change

use crate::system_config::{self, SystemConfig};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use journal::{EventJournal, STARTED_BANNER, STOPPED_BANNER};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use watcher::{
    ChangeEvent, DirClassification, EventKind, EventPolicy, EventSink, LogEvents, LogSink,
    WatchOptions,
};

/// How often the front-end checks whether the watch ended on its own
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Which events are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyPreset {
    /// Creations, deletions, modifications and renames
    All,
    /// Creations and renames only, folders recognized by name
    Reference,
}

/// How created entries are classified as file or folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClassifyArg {
    /// Check the filesystem
    Filesystem,
    /// Names without a dot are folders
    Name,
}

impl From<ClassifyArg> for DirClassification {
    fn from(arg: ClassifyArg) -> Self {
        match arg {
            ClassifyArg::Filesystem => DirClassification::Filesystem,
            ClassifyArg::Name => DirClassification::NameHeuristic,
        }
    }
}

/// Arguments of `dirwatch watch`
#[derive(Debug, Clone)]
pub struct WatchArgs {
    pub path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub no_recursive: bool,
    pub policy: Option<PolicyPreset>,
    pub classify: Option<ClassifyArg>,
    pub json: bool,
}

impl WatchArgs {
    /// Layer the command-line flags over the loaded config
    pub fn apply(&self, config: &SystemConfig) -> (WatchOptions, PathBuf) {
        let mut options = config.watch.clone();
        if self.no_recursive {
            options.recursive = false;
        }
        match self.policy {
            Some(PolicyPreset::All) => options.policy = EventPolicy::default(),
            Some(PolicyPreset::Reference) => options.policy = EventPolicy::creations_and_renames(),
            None => {}
        }
        if let Some(classify) = self.classify {
            options.policy.classify = classify.into();
        }

        let log_file = self
            .log_file
            .clone()
            .unwrap_or_else(|| config.journal.file.clone());
        (options, log_file)
    }
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let config = system_config::load()?;
    let (options, log_path) = args.apply(&config);

    let journal = Arc::new(EventJournal::open(&log_path)?);
    journal.append_raw(STARTED_BANNER)?;

    let root = match args.path.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            let message = format!("Cannot watch {}: {}", args.path.display(), e);
            journal.log_timestamped(&message);
            journal.log_raw(STOPPED_BANNER);
            anyhow::bail!(message);
        }
    };

    let ignored = if config.journal.ignore_self {
        journal_name_within(&root, journal.path())
    } else {
        None
    };
    if let Some(name) = &ignored {
        debug!("Ignoring changes to the journal itself ({})", name);
    }

    let sink = ConsoleSink {
        journal: LogEvents::new(journal.clone()),
        json: args.json,
        ignored,
    };

    let handle = match watcher::start_watch(&root, options, sink) {
        Ok(handle) => handle,
        Err(e) => {
            journal.log_timestamped(&e.to_string());
            journal.log_raw(STOPPED_BANNER);
            return Err(e).with_context(|| format!("Failed to watch {}", root.display()));
        }
    };

    if !args.json {
        println!(
            "{} {} {}",
            "Watching".green().bold(),
            root.display(),
            format!("(journal: {}, Ctrl-C to stop)", log_path.display()).dimmed()
        );
    }
    info!("Watch started on {}", root.display());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = ticker.tick() => {
                if handle.is_finished() {
                    break;
                }
            }
        }
    }

    // Joining the watch thread blocks
    let result = tokio::task::spawn_blocking(move || handle.stop())
        .await
        .context("Watch thread failed to join")?;

    let outcome = match result {
        Ok(report) => {
            if !args.json {
                println!(
                    "{} {}",
                    "Stopped".yellow().bold(),
                    format!(
                        "({} events in {} batches, {} dropped batches)",
                        report.events, report.batches, report.empty_batches
                    )
                    .dimmed()
                );
            }
            Ok(())
        }
        Err(e) => {
            journal.log_timestamped(&e.to_string());
            Err(e).with_context(|| format!("Watch on {} failed", root.display()))
        }
    };

    journal.append_raw(STOPPED_BANNER)?;
    outcome
}

/// Prints events and forwards them to the journal
struct ConsoleSink {
    journal: LogEvents<Arc<EventJournal>>,
    json: bool,
    /// Name of the journal relative to the watched root
    ignored: Option<String>,
}

impl EventSink for ConsoleSink {
    fn on_event(&mut self, event: ChangeEvent) {
        if let Some(name) = &self.ignored {
            if event.touches(name) {
                return;
            }
        }

        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => debug!("Failed to serialize event: {}", e),
            }
        } else {
            println!("{}", render_console(&event, Local::now().naive_local()));
        }

        self.journal.on_event(event);
    }
}

/// Console line: `[HH:MM:SS dd:mm:yyyy] message`, colored by kind
pub fn render_console(event: &ChangeEvent, now: NaiveDateTime) -> String {
    let stamp = format!("[{}]", now.format("%H:%M:%S %d:%m:%Y"));
    let message = event.to_string();
    let message = match event.kind() {
        EventKind::Create => message.green().to_string(),
        EventKind::Delete => message.red().to_string(),
        EventKind::Modify => message.blue().to_string(),
        EventKind::Rename => message.cyan().to_string(),
        EventKind::Unknown => message.yellow().to_string(),
    };
    format!("{} {}", stamp.dimmed(), message)
}

/// Path of `journal` relative to `root`, when the journal lives inside it
pub fn journal_name_within(root: &Path, journal: &Path) -> Option<String> {
    let journal = journal.canonicalize().ok()?;
    let relative = journal.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn args() -> WatchArgs {
        WatchArgs {
            path: PathBuf::from("."),
            log_file: None,
            no_recursive: false,
            policy: None,
            classify: None,
            json: false,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let config = SystemConfig::default();
        let args = WatchArgs {
            log_file: Some(PathBuf::from("/tmp/custom.txt")),
            no_recursive: true,
            policy: Some(PolicyPreset::Reference),
            classify: Some(ClassifyArg::Filesystem),
            ..args()
        };

        let (options, log_file) = args.apply(&config);
        assert!(!options.recursive);
        assert!(!options.policy.emit_deleted);
        assert!(!options.policy.emit_modified);
        assert_eq!(options.policy.classify, DirClassification::Filesystem);
        assert_eq!(log_file, PathBuf::from("/tmp/custom.txt"));
    }

    #[test]
    fn test_config_used_without_flags() {
        let mut config = SystemConfig::default();
        config.watch.buffer_size = 4096;
        config.journal.file = PathBuf::from("events.log");

        let (options, log_file) = args().apply(&config);
        assert!(options.recursive);
        assert_eq!(options.buffer_size, 4096);
        assert_eq!(log_file, PathBuf::from("events.log"));
    }

    #[test]
    fn test_journal_name_within_root() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().canonicalize()?;
        let inside = root.join("log.txt");
        std::fs::write(&inside, "")?;

        assert_eq!(journal_name_within(&root, &inside), Some("log.txt".to_string()));

        let outside = TempDir::new()?;
        let elsewhere = outside.path().join("log.txt");
        std::fs::write(&elsewhere, "")?;
        assert_eq!(journal_name_within(&root, &elsewhere), None);
        Ok(())
    }

    #[test]
    fn test_console_line_contains_time_and_message() {
        let now = NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let line = render_console(
            &ChangeEvent::Created {
                name: "sub".into(),
                is_dir: true,
            },
            now,
        );
        assert!(line.contains("[23:59:58 31:12:2024]"));
        assert!(line.contains("Created folder \"sub\""));
    }

    #[test]
    fn test_console_sink_skips_journal_events() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("log.txt");
        let journal = Arc::new(EventJournal::open(&path)?);

        let mut sink = ConsoleSink {
            journal: LogEvents::new(journal),
            json: true,
            ignored: Some("log.txt".into()),
        };
        sink.on_event(ChangeEvent::Modified {
            name: "log.txt".into(),
        });
        sink.on_event(ChangeEvent::Deleted { name: "x".into() });

        let content = std::fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("Deleted \"x\""));
        Ok(())
    }
}
