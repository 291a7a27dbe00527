//! Concept Store - read-only concept index built once at startup

use super::concept::{Concept, Relationship};
use super::seed;
use crate::errors::{AppError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
struct KnowledgeFile {
    concepts: Vec<Concept>,
}

/// Immutable mapping of concept ids to concepts, preserving declaration order
#[derive(Debug, Clone)]
pub struct ConceptStore {
    concepts: Vec<Concept>,
    index: HashMap<String, usize>,
}

impl ConceptStore {
    /// Build a store from concepts in declaration order.
    ///
    /// Ids must be unique and non-empty. Relationships pointing at unknown ids
    /// are kept but never traversed.
    pub fn new(concepts: Vec<Concept>) -> Result<Self> {
        let mut index = HashMap::with_capacity(concepts.len());

        for (position, concept) in concepts.iter().enumerate() {
            if concept.id.trim().is_empty() {
                return Err(AppError::InvalidKnowledgeBase {
                    message: format!("concept at position {} has an empty id", position),
                });
            }
            if index.insert(concept.id.clone(), position).is_some() {
                return Err(AppError::InvalidKnowledgeBase {
                    message: format!("duplicate concept id '{}'", concept.id),
                });
            }
        }

        let store = Self { concepts, index };

        let dangling = store
            .concepts
            .iter()
            .flat_map(|c| c.relationships.iter().map(move |r| (c, r)))
            .filter(|(_, r)| !store.index.contains_key(&r.target))
            .inspect(|(c, r)| {
                debug!(source = %c.id, relation = %r.relation, target = %r.target, "Dangling relationship")
            })
            .count();
        if dangling > 0 {
            warn!(dangling, "Knowledge base has relationships to unknown concepts; they will be skipped");
        }

        info!(concepts = store.concepts.len(), "Concept store loaded");
        Ok(store)
    }

    /// The builtin financial knowledge base
    pub fn builtin() -> Result<Self> {
        Self::new(seed::financial_concepts())
    }

    /// Load `{"concepts": [...]}` from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: KnowledgeFile = serde_json::from_str(json).map_err(|e| AppError::InvalidKnowledgeBase {
            message: format!("failed to parse concepts: {}", e),
        })?;
        Self::new(file.concepts)
    }

    /// Load `{"concepts": [...]}` from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| AppError::InvalidKnowledgeBase {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, id: &str) -> Option<&Concept> {
        self.index.get(id).map(|&i| &self.concepts[i])
    }

    /// All concepts in declaration order
    pub fn all(&self) -> &[Concept] {
        &self.concepts
    }

    /// Concepts whose `category` attribute matches, case-insensitively
    pub fn by_category(&self, category: &str) -> Vec<&Concept> {
        self.concepts
            .iter()
            .filter(|c| {
                c.category()
                    .is_some_and(|cat| cat.eq_ignore_ascii_case(category))
            })
            .collect()
    }

    /// Declaration position, used as the ranking tie-breaker
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Outgoing edges of `id` whose target resolves, in declaration order
    pub fn edges<'a>(&'a self, id: &str) -> impl Iterator<Item = (&'a Relationship, &'a Concept)> + 'a {
        self.get(id)
            .into_iter()
            .flat_map(|c| c.relationships.iter())
            .filter_map(move |r| self.get(&r.target).map(|target| (r, target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::concept::{ConceptKind, RelationType};

    fn sample() -> ConceptStore {
        ConceptStore::new(vec![
            Concept::new("bond", ConceptKind::Concept)
                .named("Bond")
                .in_category("investment")
                .relate(RelationType::RelatedTo, "interest_rate")
                .relate(RelationType::RelatedTo, "missing"),
            Concept::new("interest_rate", ConceptKind::Concept)
                .named("Interest Rate")
                .in_category("banking"),
            Concept::new("stock", ConceptKind::Concept)
                .named("Stock")
                .in_category("Investment"),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_is_read_stable() {
        let store = sample();
        for concept in store.all() {
            let first = store.get(&concept.id).cloned();
            let second = store.get(&concept.id).cloned();
            assert_eq!(first, second);
            assert_eq!(first.as_ref(), Some(concept));
        }
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn test_by_category_preserves_order() {
        let store = sample();
        let ids: Vec<_> = store.by_category("investment").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bond", "stock"]);
        assert!(store.by_category("crypto").is_empty());
    }

    #[test]
    fn test_dangling_edges_skipped() {
        let store = sample();
        let targets: Vec<_> = store.edges("bond").map(|(_, c)| c.id.as_str()).collect();
        assert_eq!(targets, vec!["interest_rate"]);
        assert_eq!(store.get("bond").unwrap().relationships.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = ConceptStore::new(vec![
            Concept::new("bond", ConceptKind::Concept),
            Concept::new("bond", ConceptKind::Entity),
        ]);
        assert!(matches!(result, Err(AppError::InvalidKnowledgeBase { .. })));
    }

    #[test]
    fn test_from_json_str() {
        let store = ConceptStore::from_json_str(
            r#"{"concepts": [
                {"id": "a", "relationships": [{"type": "AFFECTS", "target": "b"}]},
                {"id": "b", "kind": "entity", "aliases": ["bee"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.position("b"), Some(1));
        assert_eq!(store.edges("a").count(), 1);
    }

    #[test]
    fn test_builtin_loads() {
        let store = ConceptStore::builtin().unwrap();
        assert!(store.contains("bond"));
        assert!(store.contains("interest_rate"));
        assert!(!store.by_category("investment").is_empty());
    }
}
