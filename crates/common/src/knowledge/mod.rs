//! Knowledge graph core
//!
//! Provides:
//! - Concept Store (immutable, loaded once)
//! - Rule Base and forward-chaining inference with provenance
//! - Graph Query Engine (entity extraction, neighbors, inference)

mod concept;
mod inference;
mod query;
mod rules;
mod seed;
mod store;

pub use concept::{AttributeValue, Concept, ConceptKind, RelationType, Relationship};
pub use inference::{Fact, InferenceConfig, InferenceEngine, InferenceResult};
pub use query::{EntityMatch, GraphQueryConfig, GraphQueryEngine, GraphRetrieval, Hop, Neighbor};
pub use rules::{Atom, Bindings, Pattern, Rule, RuleBase, Term};
pub use seed::financial_concepts;
pub use store::ConceptStore;

use crate::config::KnowledgeConfig;
use crate::errors::Result;
use std::sync::Arc;

/// Build the query engine from configuration, falling back to the builtin
/// concepts and rules when no files are configured
pub fn build_query_engine(config: &KnowledgeConfig) -> Result<GraphQueryEngine> {
    let store = match &config.concepts_path {
        Some(path) => ConceptStore::from_json_file(path)?,
        None => ConceptStore::builtin()?,
    };
    let rules = match &config.rules_path {
        Some(path) => RuleBase::from_file(path)?,
        None => RuleBase::builtin(),
    };

    let inference = InferenceEngine::new(
        Arc::new(rules),
        InferenceConfig {
            max_iterations: config.max_inference_iterations,
            max_derived: config.max_derived_facts,
        },
    );

    Ok(GraphQueryEngine::new(
        Arc::new(store),
        inference,
        GraphQueryConfig {
            neighbor_depth: config.neighbor_depth,
        },
    ))
}
