//! Configuration file location.

use std::path::{Path, PathBuf};

/// Name of the JSON configuration file inside the config directory.
pub const CONFIG_FILENAME: &str = "local-ai-config.json";

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV: &str = "LOCALAI_CONFIG";

/// Resolve the configuration file path.
///
/// Resolution order:
/// 1. Explicit path (e.g. `--config`)
/// 2. `LOCALAI_CONFIG` environment variable
/// 3. `<config_dir>/local-ai-config.json`
pub fn config_file_path(explicit: Option<&Path>, config_dir: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir.join(CONFIG_FILENAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_utils::{ENV_LOCK, EnvVarGuard};

    #[test]
    fn explicit_path_has_priority() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(CONFIG_ENV, "/tmp/env-config.json");
        let path = config_file_path(Some(Path::new("/tmp/cli.json")), Path::new("/etc"));
        assert_eq!(path, PathBuf::from("/tmp/cli.json"));
    }

    #[test]
    fn env_var_beats_default_dir() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(CONFIG_ENV, "/tmp/env-config.json");
        let path = config_file_path(None, Path::new("/etc/local-ai"));
        assert_eq!(path, PathBuf::from("/tmp/env-config.json"));
    }

    #[test]
    fn default_is_inside_config_dir() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::unset(CONFIG_ENV);
        let path = config_file_path(None, Path::new("/etc/local-ai"));
        assert_eq!(path, Path::new("/etc/local-ai").join(CONFIG_FILENAME));
    }
}
