//! Classification of log lines into launch and exit events.
//!
//! Two grammars are understood:
//!
//! ```text
//! Launch game.exe
//! Exit game.exe
//! [2024-05-01 20:15:02] AppID 570 adding PID 4242 as a tracked process "C:\Games\dota2.exe"
//! [2024-05-01 21:40:11] AppID 570 no longer tracking PID 4242, exit code 0
//! ```
//!
//! Steam's exit lines only carry the pid, so the classifier remembers which
//! name each tracked pid was launched under. Anything else is ignored.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use localai_core::{WatchEvent, WatchEventKind};
use regex::Regex;

static SIMPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(launch|exit)\s+(.+?)\s*$").expect("static pattern")
});

static STEAM_ADD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"adding PID (\d+) as a tracked process(?:\s+"([^"]*)")?"#)
        .expect("static pattern")
});

static STEAM_REMOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"no longer tracking PID (\d+)").expect("static pattern")
});

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\]").expect("static pattern")
});

/// Stateful line classifier.
#[derive(Debug, Default)]
pub struct LineClassifier {
    tracked: HashMap<u32, String>,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `line` read at `offset`. Unrecognised lines yield `None`.
    pub fn classify(&mut self, line: &str, offset: u64) -> Option<WatchEvent> {
        let (kind, process, pid) = self.parse(line)?;
        Some(WatchEvent {
            kind,
            process,
            pid,
            timestamp: line_timestamp(line).unwrap_or_else(Utc::now),
            offset,
        })
    }

    fn parse(&mut self, line: &str) -> Option<(WatchEventKind, String, Option<u32>)> {
        if let Some(caps) = STEAM_ADD.captures(line) {
            let pid: u32 = caps[1].parse().ok()?;
            let name = caps
                .get(2)
                .and_then(|m| executable_name(m.as_str()))
                .unwrap_or_else(|| format!("pid {pid}"));
            self.tracked.insert(pid, name.clone());
            return Some((WatchEventKind::Launched, name, Some(pid)));
        }

        if let Some(caps) = STEAM_REMOVE.captures(line) {
            let pid: u32 = caps[1].parse().ok()?;
            let name = self
                .tracked
                .remove(&pid)
                .unwrap_or_else(|| format!("pid {pid}"));
            return Some((WatchEventKind::Exited, name, Some(pid)));
        }

        let caps = SIMPLE.captures(line)?;
        let kind = if caps[1].eq_ignore_ascii_case("launch") {
            WatchEventKind::Launched
        } else {
            WatchEventKind::Exited
        };
        Some((kind, caps[2].to_string(), None))
    }
}

/// File name of a Windows or unix executable path.
fn executable_name(path: &str) -> Option<String> {
    path.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Leading `[YYYY-MM-DD HH:MM:SS]` stamp, read as local time.
fn line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let caps = TIMESTAMP.captures(line)?;
    let naive = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S").ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
