//! Forward-chaining inference with provenance
//!
//! Applies the rule base round by round over a growing fact set until a round
//! adds nothing (fixpoint) or a hard budget is hit. Rules in a round only see
//! facts known at the start of that round, so output order depends only on
//! input order and rule order.

use super::rules::{Atom, Bindings, Pattern, RuleBase};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A fact and where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum Fact {
    /// Present in the concept store
    Stored { atom: Atom },
    /// Produced by `rule` from `supports`
    Derived {
        atom: Atom,
        rule: String,
        supports: Vec<Atom>,
    },
}

impl Fact {
    pub fn stored(atom: Atom) -> Self {
        Fact::Stored { atom }
    }

    pub fn atom(&self) -> &Atom {
        match self {
            Fact::Stored { atom } | Fact::Derived { atom, .. } => atom,
        }
    }

    pub fn rule(&self) -> Option<&str> {
        match self {
            Fact::Stored { .. } => None,
            Fact::Derived { rule, .. } => Some(rule),
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Fact::Derived { .. })
    }
}

/// Inference budget
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Maximum forward-chaining rounds
    pub max_iterations: usize,

    /// Maximum derived facts per run
    pub max_derived: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_derived: 256,
        }
    }
}

/// Outcome of one inference run
#[derive(Debug, Clone, Default, Serialize)]
pub struct InferenceResult {
    /// New facts in derivation order; never contains an input atom
    pub derived: Vec<Fact>,

    /// Rounds executed
    pub iterations: usize,

    /// A round produced nothing new
    pub reached_fixpoint: bool,

    /// Stopped by the iteration or fact budget; `derived` is partial
    pub budget_exceeded: bool,
}

/// Forward-chaining engine over a shared rule base
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    rules: Arc<RuleBase>,
    config: InferenceConfig,
}

impl InferenceEngine {
    /// At least one round always runs, so an empty input can reach a fixpoint
    pub fn new(rules: Arc<RuleBase>, mut config: InferenceConfig) -> Self {
        config.max_iterations = config.max_iterations.max(1);
        Self { rules, config }
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    /// Derive every fact reachable from `facts` within budget
    pub fn infer(&self, facts: &[Fact]) -> InferenceResult {
        let mut known: HashSet<Atom> = HashSet::with_capacity(facts.len());
        let mut working: Vec<Atom> = Vec::with_capacity(facts.len());
        for fact in facts {
            if known.insert(fact.atom().clone()) {
                working.push(fact.atom().clone());
            }
        }

        let mut result = InferenceResult::default();

        'rounds: for iteration in 1..=self.config.max_iterations {
            result.iterations = iteration;
            let visible = working.len();
            let mut round: Vec<Fact> = Vec::new();

            for rule in self.rules.rules() {
                for (bindings, supports) in match_body(&rule.body, &working[..visible]) {
                    let Some(head) = rule.head.instantiate(&bindings) else {
                        continue;
                    };
                    if known.insert(head.clone()) {
                        round.push(Fact::Derived {
                            atom: head,
                            rule: rule.name.clone(),
                            supports,
                        });
                    }
                }
            }

            debug!(iteration, new_facts = round.len(), "Inference round complete");

            if round.is_empty() {
                result.reached_fixpoint = true;
                break;
            }

            for fact in round {
                if result.derived.len() >= self.config.max_derived {
                    break 'rounds;
                }
                working.push(fact.atom().clone());
                result.derived.push(fact);
            }
        }

        if !result.reached_fixpoint {
            result.budget_exceeded = true;
            warn!(
                iterations = result.iterations,
                derived = result.derived.len(),
                max_iterations = self.config.max_iterations,
                max_derived = self.config.max_derived,
                "Inference budget exceeded; returning partial result"
            );
        }

        metrics::record_inference(result.iterations, result.derived.len(), result.budget_exceeded);
        result
    }
}

/// All consistent ways to satisfy `body` from `atoms`, with the atoms used
fn match_body(body: &[Pattern], atoms: &[Atom]) -> Vec<(Bindings, Vec<Atom>)> {
    let mut partial = vec![(Bindings::new(), Vec::new())];

    for pattern in body {
        let mut next = Vec::new();
        for (bindings, supports) in &partial {
            for atom in atoms.iter().filter(|a| a.predicate == pattern.predicate) {
                if let Some(extended) = pattern.match_atom(atom, bindings) {
                    let mut used = supports.clone();
                    used.push(atom.clone());
                    next.push((extended, used));
                }
            }
        }
        if next.is_empty() {
            return next;
        }
        partial = next;
    }

    partial
}
