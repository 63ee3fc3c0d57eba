//! Model definitions, discovered files and resolved selections.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Default context size when a definition omits `ctx_size`.
pub const DEFAULT_CTX_SIZE: u32 = 8192;

/// Default priority when a definition omits `priority`.
pub const DEFAULT_PRIORITY: i32 = 5;

const fn default_ctx_size() -> u32 {
    DEFAULT_CTX_SIZE
}

const fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// A declared model: how to find its file and how to launch it.
///
/// Lower `priority` is preferred during automatic selection. Ties are broken
/// by declaration order in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Exact filename to match (case-insensitive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Regex searched in the filename (case-insensitive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_pattern: Option<String>,

    /// Context size in tokens.
    #[serde(default = "default_ctx_size")]
    pub ctx_size: u32,
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Smaller model used for speculative decoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_model_id: Option<String>,
    /// Minimum number of draft tokens per step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_ngram_min: Option<u32>,

    // Optional launch tuning, forwarded only when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_gpu_layers: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubatch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_attn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_type_k: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_type_v: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ModelDefinition {
    /// Minimal definition matched by a filename pattern.
    pub fn new(id: impl Into<String>, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            filename: None,
            filename_pattern: Some(pattern.into()),
            ctx_size: DEFAULT_CTX_SIZE,
            priority: DEFAULT_PRIORITY,
            draft_model_id: None,
            draft_ngram_min: None,
            n_gpu_layers: None,
            threads: None,
            batch_size: None,
            ubatch_size: None,
            flash_attn: None,
            cache_type_k: None,
            cache_type_v: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_ctx_size(mut self, ctx_size: u32) -> Self {
        self.ctx_size = ctx_size;
        self
    }

    #[must_use]
    pub fn with_draft(mut self, draft_id: impl Into<String>) -> Self {
        self.draft_model_id = Some(draft_id.into());
        self
    }

    /// Human-readable description of how files are matched.
    pub fn match_rule(&self) -> &str {
        self.filename
            .as_deref()
            .or(self.filename_pattern.as_deref())
            .unwrap_or("N/A")
    }
}

/// A model file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModelFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    pub modified: SystemTime,
}

impl DiscoveredModelFile {
    /// Filename component used for matching.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A definition bound to the concrete file it will be launched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub definition: ModelDefinition,
    pub path: PathBuf,
}

/// Final choice handed to the supervisor: primary model and optional draft.
///
/// Persisted verbatim in the server record so a resume restarts with the
/// same arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub primary: ResolvedModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<ResolvedModel>,
}

impl ResolvedSelection {
    /// Id of the primary model.
    pub fn id(&self) -> &str {
        &self.primary.definition.id
    }

    /// Override the primary context size.
    #[must_use]
    pub const fn with_ctx_size(mut self, ctx_size: u32) -> Self {
        self.primary.definition.ctx_size = ctx_size;
        self
    }
}

/// Which model the caller wants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSelector {
    /// Pick by default model, then priority.
    #[default]
    Auto,
    /// A specific model id.
    Explicit(String),
}

impl FromStr for ModelSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            Ok(Self::Explicit(trimmed.to_string()))
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Explicit(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parses_auto_case_insensitively() {
        assert_eq!("AUTO".parse::<ModelSelector>().unwrap(), ModelSelector::Auto);
        assert_eq!("".parse::<ModelSelector>().unwrap(), ModelSelector::Auto);
        assert_eq!(
            "qwen-7b".parse::<ModelSelector>().unwrap(),
            ModelSelector::Explicit("qwen-7b".into())
        );
    }

    #[test]
    fn definition_defaults_fill_missing_fields() {
        let def: ModelDefinition = serde_json::from_str(
            r#"{"id": "m", "name": "Model", "filename_pattern": "model.*\\.gguf"}"#,
        )
        .unwrap();
        assert_eq!(def.ctx_size, DEFAULT_CTX_SIZE);
        assert_eq!(def.priority, DEFAULT_PRIORITY);
        assert!(def.draft_model_id.is_none());
        assert_eq!(def.match_rule(), "model.*\\.gguf");
    }
}
