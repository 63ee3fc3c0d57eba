//! CLI bootstrap - the composition root.
//!
//! This is the only place where the platform adapter, the configuration,
//! the model catalog and the supervisor are wired together. Handlers receive
//! the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use localai_core::{
    CoreError, DefaultDirs, ModelCatalog, PlatformPort, StatePaths, SystemConfig,
    config_file_path, load_config,
};
use localai_runtime::{ServerSupervisor, SupervisorConfig, detect_platform};
use tracing::debug;

/// Bootstrap inputs taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Explicit `--config` path.
    pub config_path: Option<PathBuf>,
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub platform: Arc<dyn PlatformPort>,
    /// Effective directories: configuration overrides applied to platform defaults.
    pub dirs: DefaultDirs,
    pub config_path: PathBuf,
    pub config: SystemConfig,
    pub catalog: ModelCatalog,
    pub paths: StatePaths,
    pub supervisor: Arc<ServerSupervisor>,
}

/// Resolve the configuration file location without loading it.
pub fn resolve_config_path(
    config: &CliConfig,
) -> Result<(Arc<dyn PlatformPort>, DefaultDirs, PathBuf), CoreError> {
    let platform = detect_platform()?;
    let defaults = platform.resolve_default_dirs()?;
    let path = config_file_path(config.config_path.as_deref(), &defaults.config);
    Ok((platform, defaults, path))
}

/// Build the CLI context.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext, CoreError> {
    let (platform, defaults, config_path) = resolve_config_path(config)?;
    let system = load_config(&config_path)?;
    debug!(path = %config_path.display(), "Configuration loaded");

    let dirs = effective_dirs(&system, defaults);
    let catalog = system.catalog()?;
    let paths = StatePaths::from_env_or(dirs.cache.join("state"));

    let supervisor = ServerSupervisor::new(
        SupervisorConfig::from_settings(&system.server, dirs.log.clone()),
        paths.clone(),
        Arc::clone(&platform),
    );

    Ok(CliContext {
        platform,
        dirs,
        config_path,
        config: system,
        catalog,
        paths,
        supervisor: Arc::new(supervisor),
    })
}

fn effective_dirs(system: &SystemConfig, defaults: DefaultDirs) -> DefaultDirs {
    let pick = |configured: Option<&Path>, fallback: PathBuf| {
        configured.map_or(fallback, Path::to_path_buf)
    };
    DefaultDirs {
        models: pick(system.server.models_dir.as_deref(), defaults.models),
        cache: pick(system.server.cache_dir.as_deref(), defaults.cache),
        log: pick(system.server.log_dir.as_deref(), defaults.log),
        config: defaults.config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> DefaultDirs {
        DefaultDirs {
            models: PathBuf::from("/home/u/models"),
            cache: PathBuf::from("/home/u/.cache/local-ai"),
            log: PathBuf::from("/home/u/.local/state/local-ai"),
            config: PathBuf::from("/home/u/.config/local-ai"),
        }
    }

    #[test]
    fn test_configured_dirs_override_defaults() {
        let mut system = SystemConfig::with_defaults();
        system.server.models_dir = Some(PathBuf::from("/data/models"));

        let dirs = effective_dirs(&system, defaults());
        assert_eq!(dirs.models, PathBuf::from("/data/models"));
        assert_eq!(dirs.cache, defaults().cache);
        assert_eq!(dirs.log, defaults().log);
    }
}
