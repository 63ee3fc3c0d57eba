//! Windows provider: Task Scheduler logon task.

use std::path::{Path, PathBuf};
use std::process::Command;

use localai_core::{CoreError, DefaultDirs, ModelSelector, PlatformPort, PlatformTag};
use tracing::info;

use super::{autostart_args, find_binary_in, kill_processes_named, run_helper};

const TASK_NAME: &str = "LocalAI-AutoStart";

pub struct WindowsPlatform {
    home: PathBuf,
}

impl WindowsPlatform {
    pub const fn new(home: PathBuf) -> Self {
        Self { home }
    }
}

/// `/tr` value for schtasks: the program quoted, then its arguments.
fn task_command(args: &[String]) -> String {
    match args.split_first() {
        Some((program, rest)) => {
            let mut cmd = format!("\"{program}\"");
            for arg in rest {
                cmd.push(' ');
                cmd.push_str(arg);
            }
            cmd
        }
        None => String::new(),
    }
}

impl PlatformPort for WindowsPlatform {
    fn tag(&self) -> PlatformTag {
        PlatformTag::Windows
    }

    fn resolve_default_dirs(&self) -> Result<DefaultDirs, CoreError> {
        Ok(DefaultDirs {
            models: self.home.join("models"),
            cache: self.home.join(".cache").join("local-ai"),
            log: self.home.join(".local").join("log"),
            config: self.home.join(".config").join("local-ai"),
        })
    }

    fn find_binary(&self, name: &str) -> Result<PathBuf, CoreError> {
        find_binary_in(name, &[self.home.join("bin").join(name)])
    }

    fn kill_by_name(&self, names: &[String]) -> usize {
        kill_processes_named(names)
    }

    fn steam_log_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.home.join("scoop/apps/steam/current/logs"),
            PathBuf::from("C:/Program Files (x86)/Steam/logs"),
            PathBuf::from("C:/Program Files/Steam/logs"),
        ]
    }

    fn register_autostart(
        &self,
        program: &Path,
        selector: &ModelSelector,
    ) -> Result<(), CoreError> {
        let command = task_command(&autostart_args(program, selector));
        run_helper(
            "schtasks",
            &["/create", "/tn", TASK_NAME, "/tr", &command, "/sc", "onlogon", "/f"],
        )?;
        info!(task = TASK_NAME, "Registered autostart");
        Ok(())
    }

    fn unregister_autostart(&self) -> Result<(), CoreError> {
        if self.is_autostart_registered() {
            run_helper("schtasks", &["/delete", "/tn", TASK_NAME, "/f"])?;
        }
        Ok(())
    }

    fn is_autostart_registered(&self) -> bool {
        Command::new("schtasks")
            .args(["/query", "/tn", TASK_NAME])
            .output()
            .is_ok_and(|o| o.status.success())
    }
}
