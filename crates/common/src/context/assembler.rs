//! Context Assembler - ranks and bounds grounding facts for the language model
//!
//! Provides:
//! - Stable ranking (direct matches, neighbors, inferred facts)
//! - Fact-count truncation from the tail
//! - A parallel sources list for citations

use crate::knowledge::{ConceptStore, Fact, GraphRetrieval};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Context assembler configuration
#[derive(Debug, Clone)]
pub struct ContextAssemblerConfig {
    /// Maximum facts kept; overflow is dropped from the tail
    pub max_facts: usize,
}

impl Default for ContextAssemblerConfig {
    fn default() -> Self {
        Self { max_facts: 12 }
    }
}

/// Why a fact is in the context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactOrigin {
    DirectMatch,
    Neighbor { depth: usize },
    Inferred,
}

/// One grounding statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFact {
    pub concept_id: String,
    pub origin: FactOrigin,
    pub text: String,
}

/// Citation entry aligned with `ContextFact` by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub concept_id: String,

    /// Relation labels from the matched concept, or the support predicates of an inferred fact
    pub relation_path: Vec<String>,

    /// Rule that produced an inferred fact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Supporting facts of an inferred fact
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports: Vec<String>,

    pub relevance: f32,
}

/// Bounded, ranked grounding context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingContext {
    pub facts: Vec<ContextFact>,
    pub sources: Vec<Source>,
    /// Facts cut by the budget
    pub dropped: usize,
}

impl GroundingContext {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Render as a numbered prompt section; numbers match `sources` positions
    pub fn render(&self) -> String {
        let mut out = String::new();
        let sections: [(&str, fn(&FactOrigin) -> bool); 3] = [
            ("## Financial Concepts", |o| matches!(o, FactOrigin::DirectMatch)),
            ("## Related Concepts", |o| matches!(o, FactOrigin::Neighbor { .. })),
            ("## Inferred Relationships", |o| matches!(o, FactOrigin::Inferred)),
        ];

        for (heading, belongs) in sections {
            let mut lines = self
                .facts
                .iter()
                .enumerate()
                .filter(|(_, f)| belongs(&f.origin))
                .peekable();
            if lines.peek().is_none() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", heading);
            for (i, fact) in lines {
                let _ = writeln!(out, "[{}] {}", i + 1, fact.text);
            }
        }

        out
    }
}

struct Ranked {
    group: u8,
    depth: usize,
    position: usize,
    fact: ContextFact,
    source: Source,
}

/// Turns a graph retrieval into a bounded context
pub struct ContextAssembler {
    config: ContextAssemblerConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextAssemblerConfig) -> Self {
        Self { config }
    }

    /// Rank direct matches, then neighbors by depth, then inferred facts; ties
    /// fall back to concept declaration order, then retrieval order.
    pub fn assemble(&self, store: &ConceptStore, retrieval: &GraphRetrieval) -> GroundingContext {
        let position = |id: &str| store.position(id).unwrap_or(usize::MAX);
        let mut ranked: Vec<Ranked> = Vec::new();

        for entity in &retrieval.entities {
            let Some(concept) = store.get(&entity.concept_id) else {
                continue;
            };

            let mut text = describe(concept.name(), concept.description());
            let related: Vec<String> = store
                .edges(&concept.id)
                .map(|(rel, target)| {
                    format!("{} {}", rel.relation.as_str().to_lowercase().replace('_', " "), target.name())
                })
                .collect();
            if !related.is_empty() {
                let _ = write!(text, " ({})", related.join("; "));
            }

            ranked.push(Ranked {
                group: 0,
                depth: 0,
                position: position(&concept.id),
                fact: ContextFact {
                    concept_id: concept.id.clone(),
                    origin: FactOrigin::DirectMatch,
                    text,
                },
                source: Source {
                    concept_id: concept.id.clone(),
                    relation_path: Vec::new(),
                    rule: None,
                    supports: Vec::new(),
                    relevance: 1.0,
                },
            });
        }

        for neighbor in &retrieval.neighbors {
            let Some(concept) = store.get(&neighbor.concept_id) else {
                continue;
            };
            let origin_name = neighbor
                .path
                .first()
                .and_then(|hop| store.get(&hop.from))
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            let labels = neighbor.relation_path();

            let text = format!(
                "{} (via {} from {})",
                describe(concept.name(), concept.description()),
                labels.join(" > "),
                origin_name
            );

            ranked.push(Ranked {
                group: 1,
                depth: neighbor.depth,
                position: position(&concept.id),
                fact: ContextFact {
                    concept_id: concept.id.clone(),
                    origin: FactOrigin::Neighbor {
                        depth: neighbor.depth,
                    },
                    text,
                },
                source: Source {
                    concept_id: concept.id.clone(),
                    relation_path: labels,
                    rule: None,
                    supports: Vec::new(),
                    relevance: 0.7 / neighbor.depth.max(1) as f32,
                },
            });
        }

        for fact in &retrieval.inference.derived {
            let Fact::Derived { atom, rule, supports } = fact else {
                continue;
            };
            if atom.is_reflexive() {
                continue;
            }
            let Some(subject) = atom.args.first() else {
                continue;
            };

            let name_of = |id: &str| store.get(id).map(|c| c.name().to_string()).unwrap_or_else(|| id.to_string());
            let args: Vec<String> = atom.args.iter().map(|a| name_of(a)).collect();
            let statement = match (atom.predicate.as_str(), args.as_slice()) {
                ("causes", [a, b]) => format!("{} can lead to changes in {}", a, b),
                ("asset_type", [a, b]) => format!("{} has the property {}", a, b),
                ("suitable_asset_for", [investor, asset]) => format!("{} is suitable for a {}", asset, investor),
                _ => format!("{}({})", atom.predicate, args.join(", ")),
            };
            let support_text: Vec<String> = supports.iter().map(ToString::to_string).collect();

            ranked.push(Ranked {
                group: 2,
                depth: 0,
                position: position(subject),
                fact: ContextFact {
                    concept_id: subject.clone(),
                    origin: FactOrigin::Inferred,
                    text: format!("{} [{} from {}]", statement, rule, support_text.join(", ")),
                },
                source: Source {
                    concept_id: subject.clone(),
                    relation_path: supports.iter().map(|s| s.predicate.clone()).collect(),
                    rule: Some(rule.clone()),
                    supports: support_text,
                    relevance: 0.5,
                },
            });
        }

        // stable: equal keys keep retrieval order
        ranked.sort_by_key(|r| (r.group, r.depth, r.position));

        let dropped = ranked.len().saturating_sub(self.config.max_facts);
        ranked.truncate(self.config.max_facts);

        let (facts, sources) = ranked.into_iter().map(|r| (r.fact, r.source)).unzip();
        GroundingContext {
            facts,
            sources,
            dropped,
        }
    }
}

fn describe(name: &str, description: Option<&str>) -> String {
    match description {
        Some(d) => format!("{}: {}", name, d),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{
        Concept, ConceptKind, GraphQueryConfig, GraphQueryEngine, InferenceConfig, InferenceEngine,
        RelationType, RuleBase,
    };
    use std::sync::Arc;

    fn engine() -> GraphQueryEngine {
        let store = ConceptStore::new(vec![
            Concept::new("bond", ConceptKind::Concept)
                .named("Bond")
                .describe("A debt security.")
                .relate(RelationType::RelatedTo, "interest_rate"),
            Concept::new("interest_rate", ConceptKind::Concept)
                .named("Interest Rate")
                .relate(RelationType::Affects, "inflation"),
            Concept::new("inflation", ConceptKind::Concept)
                .named("Inflation")
                .relate(RelationType::Affects, "purchasing_power"),
            Concept::new("purchasing_power", ConceptKind::Concept).named("Purchasing Power"),
        ])
        .unwrap();
        GraphQueryEngine::new(
            Arc::new(store),
            InferenceEngine::new(Arc::new(RuleBase::builtin()), InferenceConfig::default()),
            GraphQueryConfig::default(),
        )
    }

    #[test]
    fn test_ranking_order() {
        let engine = engine();
        let retrieval = engine.retrieve("How are bonds affected by interest rates?");
        let context = ContextAssembler::new(ContextAssemblerConfig::default()).assemble(engine.store(), &retrieval);

        let origins: Vec<_> = context.facts.iter().map(|f| f.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![
                FactOrigin::DirectMatch,
                FactOrigin::DirectMatch,
                FactOrigin::Neighbor { depth: 1 },
                FactOrigin::Inferred,
            ]
        );
        assert_eq!(context.facts[0].concept_id, "bond");
        assert_eq!(context.facts[1].concept_id, "interest_rate");
        assert_eq!(context.facts[2].concept_id, "inflation");
        assert_eq!(context.sources[3].rule.as_deref(), Some("causes_transitive"));
        assert_eq!(context.sources[3].supports.len(), 2);
        assert_eq!(context.dropped, 0);
    }

    #[test]
    fn test_sources_parallel_to_facts() {
        let engine = engine();
        let retrieval = engine.retrieve("bonds and interest rates");
        let context = ContextAssembler::new(ContextAssemblerConfig::default()).assemble(engine.store(), &retrieval);

        assert_eq!(context.facts.len(), context.sources.len());
        for (fact, source) in context.facts.iter().zip(&context.sources) {
            assert_eq!(fact.concept_id, source.concept_id);
        }
        assert_eq!(context.sources[2].relation_path, vec!["AFFECTS"]);
    }

    #[test]
    fn test_truncation_drops_tail() {
        let engine = engine();
        let retrieval = engine.retrieve("How are bonds affected by interest rates?");
        let full = ContextAssembler::new(ContextAssemblerConfig::default()).assemble(engine.store(), &retrieval);
        let capped = ContextAssembler::new(ContextAssemblerConfig { max_facts: 2 }).assemble(engine.store(), &retrieval);

        assert_eq!(capped.facts.len(), 2);
        assert_eq!(capped.sources.len(), 2);
        assert_eq!(capped.dropped, full.facts.len() - 2);
        assert_eq!(capped.sources[..], full.sources[..2]);
    }

    #[test]
    fn test_empty_retrieval() {
        let engine = engine();
        let context = ContextAssembler::new(ContextAssemblerConfig::default())
            .assemble(engine.store(), &GraphRetrieval::default());
        assert!(context.is_empty());
        assert!(context.render().is_empty());
    }

    #[test]
    fn test_render_numbers_match_sources() {
        let engine = engine();
        let retrieval = engine.retrieve("bonds and interest rates");
        let context = ContextAssembler::new(ContextAssemblerConfig::default()).assemble(engine.store(), &retrieval);
        let rendered = context.render();

        assert!(rendered.starts_with("## Financial Concepts\n[1] Bond: A debt security."));
        assert!(rendered.contains("## Related Concepts\n[3] Inflation (via AFFECTS from Interest Rate)"));
        assert!(rendered.contains("[4] Interest Rate can lead to changes in Purchasing Power"));
    }

    #[test]
    fn test_render_section_order() {
        let engine = engine();
        let retrieval = engine.retrieve("How are bonds affected by interest rates?");
        let context = ContextAssembler::new(ContextAssemblerConfig::default()).assemble(engine.store(), &retrieval);
        let rendered = context.render();

        let direct = rendered.find("## Financial Concepts").unwrap();
        let related = rendered.find("## Related Concepts").unwrap();
        let inferred = rendered.find("## Inferred Relationships").unwrap();
        assert!(direct < related && related < inferred);
        assert!(rendered.contains("## Inferred Relationships\n[4] "));
        assert_eq!(rendered.matches("## ").count(), 3);
    }
}
