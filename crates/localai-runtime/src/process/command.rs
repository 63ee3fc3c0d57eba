//! Command builder for llama-server.
//!
//! The argument vector is derived from the resolved selection only, so a
//! resume after suspend rebuilds exactly the same command.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use localai_core::{CoreError, ResolvedSelection};
use tokio::process::{Child, Command};
use tracing::debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Bind address and optional prompt-cache directory for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub cache_dir: Option<PathBuf>,
}

/// Build the llama-server argument vector.
pub fn build_server_args(
    selection: &ResolvedSelection,
    endpoint: &ServerEndpoint,
    extra_args: &[String],
) -> Vec<String> {
    let model = &selection.primary.definition;
    let mut args = vec![
        "--model".to_string(),
        selection.primary.path.display().to_string(),
        "--ctx-size".to_string(),
        model.ctx_size.to_string(),
    ];

    let mut push_opt = |flag: &str, value: Option<String>| {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(value);
        }
    };
    push_opt("--n-gpu-layers", model.n_gpu_layers.map(|v| v.to_string()));
    push_opt("--threads", model.threads.map(|v| v.to_string()));
    push_opt("--batch-size", model.batch_size.map(|v| v.to_string()));
    push_opt("--ubatch-size", model.ubatch_size.map(|v| v.to_string()));
    push_opt("--cache-type-k", model.cache_type_k.clone());
    push_opt("--cache-type-v", model.cache_type_v.clone());

    if let Some(draft) = &selection.draft {
        args.push("--model-draft".to_string());
        args.push(draft.path.display().to_string());
        if let Some(min) = model.draft_ngram_min {
            args.push("--draft-min".to_string());
            args.push(min.to_string());
        }
    }

    if model.flash_attn == Some(true) {
        args.push("--flash-attn".to_string());
    }

    args.extend([
        "--host".to_string(),
        endpoint.host.clone(),
        "--port".to_string(),
        endpoint.port.to_string(),
    ]);

    if let Some(cache_dir) = &endpoint.cache_dir {
        args.push("--slot-save-path".to_string());
        args.push(cache_dir.display().to_string());
    }

    args.extend(extra_args.iter().cloned());
    args
}

/// Spawn the server.
///
/// With `log_path` the server's stdout and stderr are appended to that file
/// and the child is detached from our stdin; otherwise output is inherited.
pub fn spawn_server(
    binary: &Path,
    args: &[String],
    log_path: Option<&Path>,
) -> Result<Child, CoreError> {
    let mut cmd = Command::new(binary);
    cmd.args(args).stdin(Stdio::null());

    if let Some(log_path) = log_path {
        if let Some(dir) = log_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let log = OpenOptions::new().create(true).append(true).open(log_path)?;
        let err_log = log.try_clone()?;
        cmd.stdout(Stdio::from(log)).stderr(Stdio::from(err_log));

        // Keep the server alive when the launching terminal closes.
        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    debug!(binary = %binary.display(), ?args, "Spawning llama-server");
    cmd.spawn().map_err(|e| {
        CoreError::Process(format!(
            "failed to spawn {}: {e}",
            binary.display()
        ))
    })
}
