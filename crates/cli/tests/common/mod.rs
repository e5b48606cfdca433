//! Helpers for driving the `dirwatch` binary

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

/// `dirwatch` command isolated from the user's config directory
pub fn dirwatch(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dirwatch"));
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env("NO_COLOR", "1");
    cmd
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Poll `path` until its content satisfies `pred`
pub fn wait_for_file<F>(path: &PathBuf, timeout: Duration, pred: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(content) = std::fs::read_to_string(path) {
            if pred(&content) {
                return Some(content);
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    None
}
