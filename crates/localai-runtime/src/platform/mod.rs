//! Platform capability providers.
//!
//! One [`PlatformPort`] implementation per OS family, selected by
//! [`PlatformTag`] in [`platform_for`]. All three compile everywhere; only
//! the one matching the running OS is used outside tests.

mod linux;
mod macos;
mod windows;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use localai_core::{CoreError, PathError, PlatformPort, PlatformTag};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, Signal, System};
use tracing::{debug, info};

pub use linux::LinuxPlatform;
pub use macos::MacPlatform;
pub use windows::WindowsPlatform;

/// Build the provider for `tag`, rooted at the user's home directory.
pub fn platform_for(tag: PlatformTag) -> Result<Arc<dyn PlatformPort>, CoreError> {
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(match tag {
        PlatformTag::Linux => Arc::new(LinuxPlatform::new(home)),
        PlatformTag::MacOs => Arc::new(MacPlatform::new(home)),
        PlatformTag::Windows => Arc::new(WindowsPlatform::new(home)),
    })
}

/// Provider for the running OS.
pub fn detect_platform() -> Result<Arc<dyn PlatformPort>, CoreError> {
    platform_for(PlatformTag::detect())
}

/// First existing candidate, then `PATH`.
fn find_binary_in(name: &str, candidates: &[PathBuf]) -> Result<PathBuf, CoreError> {
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }
    which::which(name).map_err(|_| {
        CoreError::NotFound(format!(
            "{name} not found on PATH or in {}",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Normalised program name used to compare processes.
fn bare_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_suffix(".exe")
        .map_or_else(|| lower.clone(), str::to_string)
}

/// Terminate every process whose name matches one of `names`.
fn kill_processes_named(names: &[String]) -> usize {
    let wanted: Vec<String> = names
        .iter()
        .map(|n| bare_name(n))
        .filter(|n| !n.is_empty())
        .collect();
    if wanted.is_empty() {
        return 0;
    }

    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
    let own_pid = std::process::id();

    let mut killed = 0;
    for (pid, process) in system.processes() {
        if pid.as_u32() == own_pid {
            continue;
        }
        let name = bare_name(&process.name().to_string_lossy());
        if !wanted.contains(&name) {
            continue;
        }
        let sent = process
            .kill_with(Signal::Term)
            .unwrap_or_else(|| process.kill());
        if sent {
            debug!(pid = pid.as_u32(), name = %name, "Terminated process");
            killed += 1;
        }
    }
    if killed > 0 {
        info!(count = killed, "Terminated processes before game launch");
    }
    killed
}

/// Run an external helper, mapping failure to `ProcessError`.
fn run_helper(program: &str, args: &[&str]) -> Result<(), CoreError> {
    debug!(program, ?args, "Running helper");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| CoreError::Process(format!("failed to run {program}: {e}")))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(CoreError::Process(format!(
            "{program} {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Command line registered for login autostart.
fn autostart_args(program: &Path, selector: &localai_core::ModelSelector) -> Vec<String> {
    vec![
        program.display().to_string(),
        "start".to_string(),
        "--background".to_string(),
        "--model".to_string(),
        selector.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use localai_core::ModelSelector;

    #[test]
    fn bare_name_ignores_case_and_exe() {
        assert_eq!(bare_name("Discord.EXE"), "discord");
        assert_eq!(bare_name(" chrome "), "chrome");
    }

    #[test]
    fn empty_kill_list_is_a_noop() {
        assert_eq!(kill_processes_named(&[]), 0);
        assert_eq!(kill_processes_named(&[" ".to_string()]), 0);
    }

    #[cfg(unix)]
    #[test]
    fn kills_matching_processes() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lai-victim");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let mut child = Command::new(&script).spawn().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));

        assert_eq!(kill_processes_named(&["lai-victim".to_string()]), 1);
        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn autostart_command_starts_in_background() {
        let args = autostart_args(
            Path::new("/usr/local/bin/local-ai"),
            &ModelSelector::Explicit("qwen-7b".into()),
        );
        assert_eq!(
            args,
            vec!["/usr/local/bin/local-ai", "start", "--background", "--model", "qwen-7b"]
        );
    }

    #[test]
    fn missing_binary_is_not_found() {
        let err = find_binary_in("definitely-not-a-real-binary-xyz", &[]).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
