//! Validation of the draft-model pairing graph.

use std::collections::{HashMap, HashSet};

use super::CatalogError;
use crate::domain::ModelDefinition;

/// Reject self references, dangling references and cycles.
///
/// Each definition has at most one outgoing edge, so walking the chain from
/// every node with a visited set is enough to find a cycle.
pub fn validate_draft_graph(defs: &[ModelDefinition]) -> Result<(), CatalogError> {
    let edges: HashMap<&str, &str> = defs
        .iter()
        .filter_map(|d| d.draft_model_id.as_deref().map(|draft| (d.id.as_str(), draft)))
        .collect();

    for def in defs {
        let Some(draft) = def.draft_model_id.as_deref() else {
            continue;
        };
        if draft == def.id {
            return Err(CatalogError::DraftSelfReference(def.id.clone()));
        }
        if !defs.iter().any(|d| d.id == draft) {
            return Err(CatalogError::DraftMissing {
                id: def.id.clone(),
                draft: draft.to_string(),
            });
        }
    }

    for def in defs {
        let mut seen = HashSet::new();
        let mut chain = vec![def.id.as_str()];
        let mut current = def.id.as_str();
        seen.insert(current);
        while let Some(&next) = edges.get(current) {
            chain.push(next);
            if !seen.insert(next) {
                return Err(CatalogError::DraftCycle(chain.join(" -> ")));
            }
            current = next;
        }
    }

    Ok(())
}
