//! Linux provider: XDG-style directories and a systemd user unit.

use std::fs;
use std::path::{Path, PathBuf};

use localai_core::{CoreError, DefaultDirs, ModelSelector, PlatformPort, PlatformTag};
use tracing::{info, warn};

use super::{autostart_args, find_binary_in, kill_processes_named, run_helper};

const UNIT_NAME: &str = "local-ai.service";

pub struct LinuxPlatform {
    home: PathBuf,
}

impl LinuxPlatform {
    pub const fn new(home: PathBuf) -> Self {
        Self { home }
    }

    fn unit_dir(&self) -> PathBuf {
        self.home.join(".config/systemd/user")
    }

    fn unit_path(&self) -> PathBuf {
        self.unit_dir().join(UNIT_NAME)
    }

    /// Symlink created by `systemctl --user enable`.
    fn wants_link(&self) -> PathBuf {
        self.unit_dir().join("default.target.wants").join(UNIT_NAME)
    }
}

/// systemd unit running `local-ai start --background`.
fn render_unit(args: &[String]) -> String {
    format!(
        "[Unit]\n\
         Description=Local AI Manager\n\
         After=network.target\n\
         \n\
         [Service]\n\
         Type=forking\n\
         ExecStart={}\n\
         ExecStop={} stop\n\
         Restart=on-failure\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n",
        args.join(" "),
        args.first().map_or("local-ai", String::as_str),
    )
}

#[cfg(unix)]
fn link_unit(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_unit(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::copy(target, link).map(|_| ())
}

impl PlatformPort for LinuxPlatform {
    fn tag(&self) -> PlatformTag {
        PlatformTag::Linux
    }

    fn resolve_default_dirs(&self) -> Result<DefaultDirs, CoreError> {
        Ok(DefaultDirs {
            models: self.home.join("models"),
            cache: self.home.join(".cache/local-ai"),
            log: self.home.join(".local/log"),
            config: self.home.join(".config/local-ai"),
        })
    }

    fn find_binary(&self, name: &str) -> Result<PathBuf, CoreError> {
        find_binary_in(
            name,
            &[
                self.home.join("bin").join(name),
                PathBuf::from("/usr/local/bin").join(name),
                PathBuf::from("/usr/bin").join(name),
            ],
        )
    }

    fn kill_by_name(&self, names: &[String]) -> usize {
        kill_processes_named(names)
    }

    fn steam_log_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.home.join(".local/share/Steam/logs"),
            self.home
                .join(".var/app/com.valvesoftware.Steam/.local/share/Steam/logs"),
            self.home.join(".steam/steam/logs"),
        ]
    }

    fn register_autostart(
        &self,
        program: &Path,
        selector: &ModelSelector,
    ) -> Result<(), CoreError> {
        fs::create_dir_all(self.unit_dir())?;
        fs::write(self.unit_path(), render_unit(&autostart_args(program, selector)))?;

        if which::which("systemctl").is_ok() {
            run_helper("systemctl", &["--user", "daemon-reload"])?;
            run_helper("systemctl", &["--user", "enable", UNIT_NAME])?;
        } else {
            warn!("systemctl not found; linking the unit manually");
            let link = self.wants_link();
            if let Some(dir) = link.parent() {
                fs::create_dir_all(dir)?;
            }
            if link.symlink_metadata().is_err() {
                link_unit(&self.unit_path(), &link)?;
            }
        }
        info!(unit = %self.unit_path().display(), "Registered autostart");
        Ok(())
    }

    fn unregister_autostart(&self) -> Result<(), CoreError> {
        if which::which("systemctl").is_ok() && self.wants_link().symlink_metadata().is_ok() {
            run_helper("systemctl", &["--user", "disable", UNIT_NAME])?;
        }
        for path in [self.wants_link(), self.unit_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn is_autostart_registered(&self) -> bool {
        self.unit_path().is_file() && self.wants_link().symlink_metadata().is_ok()
    }
}
