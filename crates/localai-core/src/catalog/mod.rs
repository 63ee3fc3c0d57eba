//! Model catalog: declared definitions matched against files on disk.
//!
//! The catalog is built once from configuration. Loading validates ids,
//! compiles the filename rules and checks the draft pairing graph, so
//! selection never has to recurse or guess.
//!
//! Selection order for [`ModelSelector::Auto`]:
//! 1. the configured default model, when a file matches it;
//! 2. otherwise the available definition with the lowest priority,
//!    ties broken by declaration order.
//!
//! When several files match one definition, the most recently modified wins;
//! equal timestamps fall back to the lexicographically smallest path.

mod discover;
mod draft;
mod error;
mod matcher;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

pub use discover::{MAX_SCAN_DEPTH, scan_files};
pub use draft::validate_draft_graph;
pub use error::CatalogError;
pub use matcher::FileMatcher;

use crate::domain::{
    DiscoveredModelFile, ModelDefinition, ModelSelector, ResolvedModel, ResolvedSelection,
};

/// One row of a catalog listing.
#[derive(Debug, Clone)]
pub struct CatalogEntry<'a> {
    pub definition: &'a ModelDefinition,
    /// Best matching file, `None` when the model is not installed.
    pub file: Option<&'a DiscoveredModelFile>,
}

impl CatalogEntry<'_> {
    pub const fn is_available(&self) -> bool {
        self.file.is_some()
    }
}

/// Validated set of model definitions.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    definitions: Vec<ModelDefinition>,
    matchers: Vec<FileMatcher>,
    default_model: Option<String>,
}

impl ModelCatalog {
    /// Validate `definitions` and build the catalog.
    ///
    /// An unknown `default_model` is ignored with a debug log; it only
    /// influences ordering.
    pub fn load(
        definitions: Vec<ModelDefinition>,
        default_model: Option<String>,
    ) -> Result<Self, CatalogError> {
        let mut ids = HashSet::new();
        for def in &definitions {
            if !ids.insert(def.id.as_str()) {
                return Err(CatalogError::DuplicateId(def.id.clone()));
            }
        }

        let matchers = definitions
            .iter()
            .map(FileMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;

        validate_draft_graph(&definitions)?;

        let default_model = default_model.filter(|id| !id.trim().is_empty());
        if let Some(id) = default_model.as_deref().filter(|id| !ids.contains(id)) {
            debug!(default_model = %id, "Default model is not declared");
        }

        Ok(Self {
            definitions,
            matchers,
            default_model,
        })
    }

    pub fn definitions(&self) -> &[ModelDefinition] {
        &self.definitions
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&ModelDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    /// Scan `root` for files matched by any declared rule.
    pub fn discover(&self, root: &Path) -> Vec<DiscoveredModelFile> {
        let files = scan_files(root, |name| self.matchers.iter().any(|m| m.matches(name)));
        debug!(root = %root.display(), count = files.len(), "Discovered model files");
        files
    }

    /// Best file for the definition at `index`.
    fn best_file<'a>(
        &self,
        index: usize,
        files: &'a [DiscoveredModelFile],
    ) -> Option<&'a DiscoveredModelFile> {
        let matcher = &self.matchers[index];
        files
            .iter()
            .filter(|f| matcher.matches(&f.file_name()))
            .min_by(|a, b| newest_first(a, b))
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.definitions.iter().position(|d| d.id == id)
    }

    /// Every definition with its best file, in declaration order.
    pub fn entries<'a>(&'a self, files: &'a [DiscoveredModelFile]) -> Vec<CatalogEntry<'a>> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(i, definition)| CatalogEntry {
                definition,
                file: self.best_file(i, files),
            })
            .collect()
    }

    /// Id the automatic selection would pick, if any model is available.
    pub fn auto_choice(&self, files: &[DiscoveredModelFile]) -> Option<&ModelDefinition> {
        self.auto_index(files).map(|i| &self.definitions[i])
    }

    fn auto_index(&self, files: &[DiscoveredModelFile]) -> Option<usize> {
        let preferred = self
            .default_model
            .as_deref()
            .and_then(|id| self.index_of(id))
            .filter(|&i| self.best_file(i, files).is_some());
        if preferred.is_some() {
            return preferred;
        }

        // min_by keeps the first of equal elements, preserving declaration order.
        (0..self.definitions.len())
            .filter(|&i| self.best_file(i, files).is_some())
            .min_by_key(|&i| self.definitions[i].priority)
    }

    /// Resolve `selector` against already discovered `files`.
    pub fn select(
        &self,
        selector: &ModelSelector,
        files: &[DiscoveredModelFile],
    ) -> Result<ResolvedSelection, CatalogError> {
        let index = match selector {
            ModelSelector::Explicit(id) => {
                let i = self
                    .index_of(id)
                    .ok_or_else(|| CatalogError::UnknownModel(id.clone()))?;
                if self.best_file(i, files).is_none() {
                    return Err(CatalogError::ModelUnavailable(id.clone()));
                }
                i
            }
            ModelSelector::Auto => self.auto_index(files).ok_or_else(|| {
                CatalogError::NoModelsAvailable(format!("{} scanned files", files.len()))
            })?,
        };

        let definition = &self.definitions[index];
        let primary = self.resolve_one(index, files)?;

        let draft = match definition.draft_model_id.as_deref() {
            Some(draft_id) => {
                let draft_index = self.index_of(draft_id).ok_or_else(|| {
                    CatalogError::DraftMissing {
                        id: definition.id.clone(),
                        draft: draft_id.to_string(),
                    }
                })?;
                let resolved = self.resolve_one(draft_index, files).map_err(|_| {
                    CatalogError::DraftUnavailable {
                        id: definition.id.clone(),
                        draft: draft_id.to_string(),
                    }
                })?;
                Some(resolved)
            }
            None => None,
        };

        debug!(
            model = %definition.id,
            draft = ?draft.as_ref().map(|d| d.definition.id.as_str()),
            path = %primary.path.display(),
            "Resolved model selection"
        );

        Ok(ResolvedSelection { primary, draft })
    }

    /// Discover under `root` and select in one step.
    pub fn resolve(
        &self,
        root: &Path,
        selector: &ModelSelector,
    ) -> Result<ResolvedSelection, CatalogError> {
        let files = self.discover(root);
        self.select(selector, &files).map_err(|e| match e {
            CatalogError::NoModelsAvailable(_) => {
                CatalogError::NoModelsAvailable(root.display().to_string())
            }
            other => other,
        })
    }

    fn resolve_one(
        &self,
        index: usize,
        files: &[DiscoveredModelFile],
    ) -> Result<ResolvedModel, CatalogError> {
        let definition = &self.definitions[index];
        let file = self
            .best_file(index, files)
            .ok_or_else(|| CatalogError::ModelUnavailable(definition.id.clone()))?;
        Ok(ResolvedModel {
            definition: definition.clone(),
            path: file.path.clone(),
        })
    }
}

fn newest_first(a: &DiscoveredModelFile, b: &DiscoveredModelFile) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| a.path.cmp(&b.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    fn file(path: &str, secs: u64) -> DiscoveredModelFile {
        DiscoveredModelFile {
            path: PathBuf::from(path),
            size: 1,
            modified: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    fn qwen_catalog(default_model: Option<&str>) -> ModelCatalog {
        ModelCatalog::load(
            vec![
                ModelDefinition::new("qwen-7b", "Qwen 7B", r"qwen.*7b")
                    .with_priority(1)
                    .with_draft("qwen-0.5b"),
                ModelDefinition::new("qwen-0.5b", "Qwen 0.5B", r"qwen.*0\.5b").with_priority(5),
                ModelDefinition::new("llama-3b", "Llama 3B", r"llama.*3b").with_priority(3),
            ],
            default_model.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn auto_pairs_primary_with_draft() {
        let catalog = qwen_catalog(None);
        let files = vec![
            file("/m/Qwen2.5-7B-Q4.gguf", 10),
            file("/m/qwen2.5-0.5b-q8.gguf", 10),
        ];
        let sel = catalog.select(&ModelSelector::Auto, &files).unwrap();
        assert_eq!(sel.id(), "qwen-7b");
        let draft = sel.draft.unwrap();
        assert_eq!(draft.definition.id, "qwen-0.5b");
        assert_eq!(draft.path, PathBuf::from("/m/qwen2.5-0.5b-q8.gguf"));
    }

    #[test]
    fn missing_draft_file_is_a_config_error() {
        let catalog = qwen_catalog(None);
        let files = vec![file("/m/qwen-7b.gguf", 1)];
        let err = catalog.select(&ModelSelector::Auto, &files).unwrap_err();
        assert!(matches!(err, CatalogError::DraftUnavailable { .. }));
        assert_eq!(crate::CoreError::from(err).kind(), "config");
    }

    #[test]
    fn auto_falls_back_by_priority() {
        let catalog = qwen_catalog(None);
        let files = vec![file("/m/llama-3b.gguf", 1), file("/m/qwen-0.5b.gguf", 1)];
        let sel = catalog.select(&ModelSelector::Auto, &files).unwrap();
        assert_eq!(sel.id(), "llama-3b");
    }

    #[test]
    fn equal_priority_keeps_declaration_order() {
        let catalog = ModelCatalog::load(
            vec![
                ModelDefinition::new("b", "B", "^b"),
                ModelDefinition::new("a", "A", "^a"),
            ],
            None,
        )
        .unwrap();
        let files = vec![file("/m/a.gguf", 1), file("/m/b.gguf", 1)];
        assert_eq!(catalog.auto_choice(&files).unwrap().id, "b");
    }

    #[test]
    fn default_model_wins_when_available() {
        let catalog = qwen_catalog(Some("llama-3b"));
        let files = vec![file("/m/llama-3b.gguf", 1), file("/m/qwen-0.5b.gguf", 1)];
        assert_eq!(catalog.auto_choice(&files).unwrap().id, "llama-3b");

        let files = vec![file("/m/qwen-0.5b.gguf", 1)];
        assert_eq!(catalog.auto_choice(&files).unwrap().id, "qwen-0.5b");
    }

    #[test]
    fn newest_matching_file_wins() {
        let catalog = qwen_catalog(None);
        let files = vec![
            file("/m/llama-3b-old.gguf", 1),
            file("/m/llama-3b-new.gguf", 50),
            file("/m/llama-3b-also.gguf", 50),
        ];
        let sel = catalog
            .select(&ModelSelector::Explicit("llama-3b".into()), &files)
            .unwrap();
        assert_eq!(sel.primary.path, PathBuf::from("/m/llama-3b-also.gguf"));
    }

    #[test]
    fn explicit_selection_errors_are_not_found() {
        let catalog = qwen_catalog(None);
        let err = catalog
            .select(&ModelSelector::Explicit("ghost".into()), &[])
            .unwrap_err();
        assert_eq!(err, CatalogError::UnknownModel("ghost".into()));

        let err = catalog
            .select(&ModelSelector::Explicit("llama-3b".into()), &[])
            .unwrap_err();
        assert_eq!(crate::CoreError::from(err).kind(), "not_found");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ModelCatalog::load(
            vec![
                ModelDefinition::new("a", "A", "a"),
                ModelDefinition::new("a", "A2", "a2"),
            ],
            None,
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId("a".into()));
    }

    #[test]
    fn discover_keeps_only_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("qwen-7b.gguf"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let catalog = qwen_catalog(None);
        let files = catalog.discover(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name(), "qwen-7b.gguf");
    }
}
