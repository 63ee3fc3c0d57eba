//! Filename matching for model definitions.

use regex::{Regex, RegexBuilder};

use super::CatalogError;
use crate::domain::ModelDefinition;

/// Compiled matching rule of one definition.
///
/// Only the file name is tested, never the directory part. Both forms are
/// case-insensitive; a file matches when either rule accepts it.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    exact: Option<String>,
    pattern: Option<Regex>,
}

impl FileMatcher {
    /// Compile the rule declared by `def`.
    pub fn compile(def: &ModelDefinition) -> Result<Self, CatalogError> {
        let exact = def
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let pattern = match def.filename_pattern.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CatalogError::InvalidPattern {
                        id: def.id.clone(),
                        reason: e.to_string(),
                    })?,
            ),
            _ => None,
        };

        if exact.is_none() && pattern.is_none() {
            return Err(CatalogError::MissingMatcher(def.id.clone()));
        }

        Ok(Self { exact, pattern })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        let exact_hit = self
            .exact
            .as_ref()
            .is_some_and(|exact| file_name.to_lowercase() == *exact);
        exact_hit || self.pattern.as_ref().is_some_and(|re| re.is_match(file_name))
    }
}
