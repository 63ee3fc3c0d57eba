//! macOS provider: `~/Library` directories and a launchd agent.

use std::fs;
use std::path::{Path, PathBuf};

use localai_core::{CoreError, DefaultDirs, ModelSelector, PlatformPort, PlatformTag};
use tracing::{info, warn};

use super::{autostart_args, find_binary_in, kill_processes_named, run_helper};

const AGENT_LABEL: &str = "com.localai.manager";

pub struct MacPlatform {
    home: PathBuf,
}

impl MacPlatform {
    pub const fn new(home: PathBuf) -> Self {
        Self { home }
    }

    fn plist_path(&self) -> PathBuf {
        self.home
            .join("Library/LaunchAgents")
            .join(format!("{AGENT_LABEL}.plist"))
    }
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_plist(args: &[String]) -> String {
    let program_args: String = args
        .iter()
        .map(|a| format!("        <string>{}</string>\n", xml_escape(a)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{AGENT_LABEL}</string>
    <key>ProgramArguments</key>
    <array>
{program_args}    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#
    )
}

impl PlatformPort for MacPlatform {
    fn tag(&self) -> PlatformTag {
        PlatformTag::MacOs
    }

    fn resolve_default_dirs(&self) -> Result<DefaultDirs, CoreError> {
        Ok(DefaultDirs {
            models: self.home.join("models"),
            cache: self.home.join("Library/Caches/local-ai"),
            log: self.home.join("Library/Logs/local-ai"),
            config: self.home.join("Library/Application Support/local-ai"),
        })
    }

    fn find_binary(&self, name: &str) -> Result<PathBuf, CoreError> {
        find_binary_in(
            name,
            &[
                self.home.join("bin").join(name),
                PathBuf::from("/usr/local/bin").join(name),
                PathBuf::from("/opt/homebrew/bin").join(name),
            ],
        )
    }

    fn kill_by_name(&self, names: &[String]) -> usize {
        kill_processes_named(names)
    }

    fn steam_log_dirs(&self) -> Vec<PathBuf> {
        vec![self.home.join("Library/Application Support/Steam/logs")]
    }

    fn register_autostart(
        &self,
        program: &Path,
        selector: &ModelSelector,
    ) -> Result<(), CoreError> {
        let plist = self.plist_path();
        if let Some(dir) = plist.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&plist, render_plist(&autostart_args(program, selector)))?;
        let plist_arg = plist.display().to_string();
        if let Err(e) = run_helper("launchctl", &["load", &plist_arg]) {
            // The agent still runs at next login.
            warn!(error = %e, "launchctl load failed");
        }
        info!(plist = %plist.display(), "Registered autostart");
        Ok(())
    }

    fn unregister_autostart(&self) -> Result<(), CoreError> {
        let plist = self.plist_path();
        if !plist.exists() {
            return Ok(());
        }
        let plist_arg = plist.display().to_string();
        if let Err(e) = run_helper("launchctl", &["unload", &plist_arg]) {
            warn!(error = %e, "launchctl unload failed");
        }
        fs::remove_file(&plist)?;
        Ok(())
    }

    fn is_autostart_registered(&self) -> bool {
        self.plist_path().is_file()
    }
}
