//! Graph Query Engine - entity recognition, neighbor traversal, inference
//!
//! Provides:
//! - Alias matching over free text, longest alias first
//! - Breadth-first neighbor expansion bounded by depth
//! - Stored-fact extraction and forward chaining over the local subgraph

use super::concept::RelationType;
use super::inference::{Fact, InferenceEngine, InferenceResult};
use super::rules::{Atom, RuleBase};
use super::store::ConceptStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Query engine configuration
#[derive(Debug, Clone)]
pub struct GraphQueryConfig {
    /// Default traversal depth when a caller does not pass one
    pub neighbor_depth: usize,
}

impl Default for GraphQueryConfig {
    fn default() -> Self {
        Self { neighbor_depth: 1 }
    }
}

/// A concept recognised in the query text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub concept_id: String,

    /// Surface form as it appears in the lowercased query
    pub matched: String,

    /// Byte span in the lowercased query
    pub span: (usize, usize),
}

/// One traversed edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub from: String,
    pub relation: RelationType,
    pub to: String,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.from, self.relation, self.to)
    }
}

/// A concept reached by traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub concept_id: String,
    pub depth: usize,
    /// Edges from the start concept to this one
    pub path: Vec<Hop>,
}

impl Neighbor {
    /// Relation labels along the path, start to end
    pub fn relation_path(&self) -> Vec<String> {
        self.path.iter().map(|h| h.relation.to_string()).collect()
    }
}

/// Everything the graph knows about a query
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphRetrieval {
    /// Direct matches in declaration order
    pub entities: Vec<EntityMatch>,

    /// Neighbors of the matches, excluding the matches themselves
    pub neighbors: Vec<Neighbor>,

    /// Facts read from the edges of matched and neighbor concepts
    pub stored_facts: Vec<Fact>,

    pub inference: InferenceResult,
}

impl GraphRetrieval {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Read-only query engine, shared across requests
pub struct GraphQueryEngine {
    store: Arc<ConceptStore>,
    inference: InferenceEngine,
    config: GraphQueryConfig,
    /// (term, declaration position), longest term first
    terms: Vec<(String, usize)>,
}

impl GraphQueryEngine {
    pub fn new(store: Arc<ConceptStore>, inference: InferenceEngine, config: GraphQueryConfig) -> Self {
        let mut terms: Vec<(String, usize)> = store
            .all()
            .iter()
            .enumerate()
            .flat_map(|(position, concept)| {
                concept
                    .match_terms()
                    .into_iter()
                    .map(move |term| (term, position))
            })
            .collect();

        terms.sort_by(|a, b| {
            b.0.len()
                .cmp(&a.0.len())
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.0.cmp(&b.0))
        });

        Self {
            store,
            inference,
            config,
            terms,
        }
    }

    pub fn store(&self) -> &ConceptStore {
        &self.store
    }

    pub fn rules(&self) -> &RuleBase {
        self.inference.rules()
    }

    /// Concepts named in `text`, ordered by declaration.
    ///
    /// Matching is case-insensitive on word boundaries, tolerating a trailing
    /// plural `s`/`es`. Longer aliases claim their span first so a shorter alias
    /// inside it never matches. No match yields an empty list.
    pub fn extract_entities(&self, text: &str) -> Vec<EntityMatch> {
        let haystack = text.to_lowercase();
        let mut claimed = vec![false; haystack.len()];
        let mut found: BTreeMap<usize, EntityMatch> = BTreeMap::new();

        for (term, position) in &self.terms {
            for (start, _) in haystack.match_indices(term.as_str()) {
                if !boundary_before(&haystack, start) {
                    continue;
                }
                let Some(end) = word_end(&haystack, start + term.len()) else {
                    continue;
                };
                if claimed[start..end].iter().any(|c| *c) {
                    continue;
                }
                claimed[start..end].fill(true);

                found.entry(*position).or_insert_with(|| EntityMatch {
                    concept_id: self.store.all()[*position].id.clone(),
                    matched: haystack[start..end].to_string(),
                    span: (start, end),
                });
            }
        }

        debug!(matches = found.len(), "Entities extracted");
        found.into_values().collect()
    }

    /// Breadth-first neighbors of `concept_id` along outgoing edges.
    ///
    /// `depth` defaults to the configured neighbor depth. Each concept is
    /// reported once, at its shallowest depth; the start concept is never
    /// reported. Unknown ids and dangling edges yield nothing.
    pub fn neighbors(
        &self,
        concept_id: &str,
        relation_types: Option<&[RelationType]>,
        depth: Option<usize>,
    ) -> Vec<Neighbor> {
        let max_depth = depth.unwrap_or(self.config.neighbor_depth);
        let Some(start) = self.store.get(concept_id) else {
            return Vec::new();
        };

        let mut visited: HashSet<&str> = HashSet::from([start.id.as_str()]);
        let mut queue: VecDeque<(&str, Vec<Hop>)> = VecDeque::from([(start.id.as_str(), Vec::new())]);
        let mut found = Vec::new();

        while let Some((current, path)) = queue.pop_front() {
            if path.len() >= max_depth {
                continue;
            }

            for (relationship, target) in self.store.edges(current) {
                if relation_types.is_some_and(|allowed| !allowed.contains(&relationship.relation)) {
                    continue;
                }
                if !visited.insert(target.id.as_str()) {
                    continue;
                }

                let mut next_path = path.clone();
                next_path.push(Hop {
                    from: current.to_string(),
                    relation: relationship.relation.clone(),
                    to: target.id.clone(),
                });

                found.push(Neighbor {
                    concept_id: target.id.clone(),
                    depth: next_path.len(),
                    path: next_path.clone(),
                });
                queue.push_back((target.id.as_str(), next_path));
            }
        }

        found
    }

    /// Stored facts from the resolved edges of `concept_ids`, deduplicated in order
    pub fn stored_facts(&self, concept_ids: &[&str]) -> Vec<Fact> {
        let mut seen: HashSet<Atom> = HashSet::new();
        let mut facts = Vec::new();

        for id in concept_ids {
            for (relationship, target) in self.store.edges(id) {
                let atom = Atom::new(&relationship.relation.predicate(), [*id, target.id.as_str()]);
                if seen.insert(atom.clone()) {
                    facts.push(Fact::stored(atom));
                }
            }
        }

        facts
    }

    /// Forward-chain the rule base over `facts`
    pub fn infer(&self, facts: &[Fact]) -> InferenceResult {
        self.inference.infer(facts)
    }

    /// Extract, expand and infer for one query
    pub fn retrieve(&self, text: &str) -> GraphRetrieval {
        let entities = self.extract_entities(text);
        if entities.is_empty() {
            return GraphRetrieval::default();
        }

        let direct: HashSet<&str> = entities.iter().map(|e| e.concept_id.as_str()).collect();
        let mut neighbors: Vec<Neighbor> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entity in &entities {
            for neighbor in self.neighbors(&entity.concept_id, None, None) {
                if direct.contains(neighbor.concept_id.as_str()) {
                    continue;
                }
                match index.get(&neighbor.concept_id) {
                    Some(&i) if neighbors[i].depth <= neighbor.depth => {}
                    Some(&i) => neighbors[i] = neighbor,
                    None => {
                        index.insert(neighbor.concept_id.clone(), neighbors.len());
                        neighbors.push(neighbor);
                    }
                }
            }
        }

        let scope: Vec<&str> = entities
            .iter()
            .map(|e| e.concept_id.as_str())
            .chain(neighbors.iter().map(|n| n.concept_id.as_str()))
            .collect();
        let stored_facts = self.stored_facts(&scope);
        let inference = self.infer(&stored_facts);

        debug!(
            entities = entities.len(),
            neighbors = neighbors.len(),
            stored = stored_facts.len(),
            derived = inference.derived.len(),
            "Graph retrieval complete"
        );

        GraphRetrieval {
            entities,
            neighbors,
            stored_facts,
            inference,
        }
    }
}

fn boundary_before(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

/// End of the word starting a match ending at `end`, allowing a plural suffix
fn word_end(text: &str, end: usize) -> Option<usize> {
    let is_boundary = |at: usize| text[at..].chars().next().map_or(true, |c| !c.is_alphanumeric());

    if is_boundary(end) {
        return Some(end);
    }
    ["es", "s"].iter().find_map(|suffix| {
        let candidate = end + suffix.len();
        (text[end..].starts_with(suffix) && is_boundary(candidate)).then_some(candidate)
    })
}
