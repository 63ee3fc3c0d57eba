//! Process verification so a reused pid is never mistaken for our server.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use localai_core::WatcherRecord;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// Allowed drift between the recorded and observed start time, in seconds.
const START_TIME_TOLERANCE_SECS: u64 = 2;

/// Binary name assumed for watcher records that predate `program`.
const WATCHER_PROGRAM: &str = "local-ai";

/// Result of checking a recorded pid against the live process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The pid is running and still belongs to the recorded program.
    Alive,
    /// No such process, or only a zombie is left.
    Dead,
    /// The pid is running but belongs to an unrelated program.
    Stale,
}

/// Snapshot of a single process.
fn inspect<R>(pid: u32, f: impl FnOnce(Option<&Process>) -> R) -> R {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::everything(),
    );
    f(system.process(pid).filter(|p| !is_defunct(p)))
}

fn is_defunct(process: &Process) -> bool {
    matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
}

/// Whether `pid` is a live (non-zombie) process.
pub fn is_running(pid: u32) -> bool {
    inspect(pid, |p| p.is_some())
}

/// Whether `pid` is live and, when `started_at` is known, still the same
/// process that started then.
pub fn is_same_process(pid: u32, started_at: Option<u64>) -> bool {
    inspect(pid, |process| {
        process.is_some_and(|p| {
            started_at.is_none_or(|expected| {
                p.start_time().abs_diff(expected) <= START_TIME_TOLERANCE_SECS
            })
        })
    })
}

/// OS start time of `pid` in unix seconds.
pub fn start_time(pid: u32) -> Option<u64> {
    inspect(pid, |p| p.map(Process::start_time))
}

/// Check that `pid` still runs `binary`, started at `started_at`.
///
/// A mismatched start time or program name means the pid was reused.
pub fn check_process(pid: u32, started_at: Option<u64>, binary: &Path) -> Liveness {
    inspect(pid, |process| {
        let Some(process) = process else {
            return Liveness::Dead;
        };
        if let Some(expected) = started_at {
            if process.start_time().abs_diff(expected) > START_TIME_TOLERANCE_SECS {
                return Liveness::Stale;
            }
        }
        if runs_binary(process, binary) {
            Liveness::Alive
        } else {
            Liveness::Stale
        }
    })
}

/// Check that a recorded watcher still runs in `record.pid`.
///
/// Records without the OS start time only require the process to predate the
/// record; without a program path the name must be `local-ai`.
pub fn check_watcher(record: &WatcherRecord) -> Liveness {
    let program = record
        .program
        .clone()
        .unwrap_or_else(|| PathBuf::from(WATCHER_PROGRAM));
    let recorded = u64::try_from(record.started_at.timestamp()).unwrap_or(0);
    inspect(record.pid, |process| {
        let Some(process) = process else {
            return Liveness::Dead;
        };
        let started = process.start_time();
        let reused = record.process_started_at.map_or_else(
            || started > recorded + START_TIME_TOLERANCE_SECS,
            |expected| started.abs_diff(expected) > START_TIME_TOLERANCE_SECS,
        );
        if reused || !runs_binary(process, &program) {
            Liveness::Stale
        } else {
            Liveness::Alive
        }
    })
}

/// Match by program name: the process name, its executable, or the first two
/// command-line words (scripts run through an interpreter).
fn runs_binary(process: &Process, binary: &Path) -> bool {
    let Some(expected) = program_name(binary.as_os_str()) else {
        return false;
    };
    let same = |candidate: &OsStr| program_name(candidate).is_some_and(|n| n == expected);

    // Linux truncates process names to 15 bytes.
    let name = process.name().to_string_lossy().to_lowercase();
    if !name.is_empty() && expected.starts_with(&name) && name.len() >= expected.len().min(15) {
        return true;
    }
    if process.exe().is_some_and(|exe| same(exe.as_os_str())) {
        return true;
    }
    process.cmd().iter().take(2).any(|arg| same(arg.as_os_str()))
}

fn program_name(raw: &OsStr) -> Option<String> {
    let name = Path::new(raw).file_name()?.to_string_lossy().to_lowercase();
    let name = name.strip_suffix(".exe").map(str::to_string).unwrap_or(name);
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn current_process_is_running() {
        assert!(is_running(std::process::id()));
        assert!(start_time(std::process::id()).is_some());
    }

    #[test]
    fn same_process_needs_matching_start_time() {
        let pid = std::process::id();
        let started = start_time(pid).unwrap();
        assert!(is_same_process(pid, None));
        assert!(is_same_process(pid, Some(started)));
        assert!(!is_same_process(pid, Some(started.saturating_sub(3600))));
        assert!(!is_same_process(999_999_999, None));
    }

    #[test]
    fn impossible_pid_is_dead() {
        assert!(!is_running(999_999_999));
        assert_eq!(
            check_process(999_999_999, None, &PathBuf::from("llama-server")),
            Liveness::Dead
        );
    }

    #[test]
    fn foreign_program_is_stale() {
        // The test binary is not llama-server.
        let pid = std::process::id();
        assert_eq!(
            check_process(pid, start_time(pid), &PathBuf::from("/usr/bin/llama-server")),
            Liveness::Stale
        );
    }

    #[test]
    fn mismatched_start_time_is_stale() {
        let pid = std::process::id();
        let exe = std::env::current_exe().unwrap();
        let started = start_time(pid).unwrap();
        assert_eq!(check_process(pid, Some(started), &exe), Liveness::Alive);
        assert_eq!(
            check_process(pid, Some(started.saturating_sub(3600)), &exe),
            Liveness::Stale
        );
    }

    #[test]
    fn program_name_strips_exe_suffix() {
        assert_eq!(
            program_name(OsStr::new("C:/llama/Llama-Server.EXE")).as_deref(),
            Some("llama-server")
        );
    }

    fn own_watcher_record() -> WatcherRecord {
        let mut record = WatcherRecord::new(PathBuf::from("/tmp/console_log.txt"), 0);
        record.process_started_at = start_time(record.pid);
        record.program = std::env::current_exe().ok();
        record
    }

    #[test]
    fn own_watcher_record_is_alive() {
        assert_eq!(check_watcher(&own_watcher_record()), Liveness::Alive);
    }

    #[test]
    fn watcher_pid_reused_by_other_program_is_stale() {
        let mut record = own_watcher_record();
        record.program = Some(PathBuf::from("/usr/bin/local-ai"));
        assert_eq!(check_watcher(&record), Liveness::Stale);
    }

    #[test]
    fn watcher_record_older_than_process_is_stale() {
        let mut record = own_watcher_record();
        record.process_started_at = None;
        record.started_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(check_watcher(&record), Liveness::Stale);
    }

    #[test]
    fn dead_watcher_pid_is_dead() {
        let mut record = own_watcher_record();
        record.pid = 999_999_999;
        assert_eq!(check_watcher(&record), Liveness::Dead);
    }
}
