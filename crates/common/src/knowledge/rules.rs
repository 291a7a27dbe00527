//! Rule Base - forward-chaining rules over predicate atoms
//!
//! Rules read `name: head(?X, ?Z) :- body(?X, ?Y), body(?Y, ?Z)`. Arguments
//! starting with `?` are variables, anything else is a constant concept id.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Variable bindings accumulated while matching a rule body
pub type Bindings = BTreeMap<String, String>;

/// Ground fact: `predicate(arg, ...)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: String,
    pub args: Vec<String>,
}

impl Atom {
    pub fn new<I, S>(predicate: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            predicate: predicate.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// True when every argument names the same concept, e.g. `causes(x, x)`
    pub fn is_reflexive(&self) -> bool {
        self.args.len() > 1 && self.args.windows(2).all(|w| w[0] == w[1])
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.join(", "))
    }
}

/// Pattern argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(String),
    Const(String),
}

impl Term {
    fn parse(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        match text.strip_prefix('?') {
            Some("") => Err("empty variable name".to_string()),
            Some(name) => Ok(Term::Var(name.to_string())),
            None if text.is_empty() => Err("empty argument".to_string()),
            None => Ok(Term::Const(text.to_string())),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "?{}", name),
            Term::Const(value) => f.write_str(value),
        }
    }
}

/// Atom with variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl Pattern {
    pub fn new(predicate: &str, args: Vec<Term>) -> Self {
        Self {
            predicate: predicate.to_string(),
            args,
        }
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| format!("expected '(' in '{}'", text))?;
        let inner = text[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| format!("expected ')' at end of '{}'", text))?;

        let predicate = text[..open].trim();
        if predicate.is_empty() || !predicate.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(format!("invalid predicate name '{}'", predicate));
        }

        let args = inner
            .split(',')
            .map(Term::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::new(predicate, args))
    }

    fn variables(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|t| match t {
            Term::Var(name) => Some(name.as_str()),
            Term::Const(_) => None,
        })
    }

    /// Extend `bindings` so this pattern equals `atom`, if consistent
    pub fn match_atom(&self, atom: &Atom, bindings: &Bindings) -> Option<Bindings> {
        if self.predicate != atom.predicate || self.args.len() != atom.args.len() {
            return None;
        }

        let mut extended = bindings.clone();
        for (term, value) in self.args.iter().zip(&atom.args) {
            match term {
                Term::Const(c) if c != value => return None,
                Term::Const(_) => {}
                Term::Var(name) => match extended.get(name) {
                    Some(bound) if bound != value => return None,
                    Some(_) => {}
                    None => {
                        extended.insert(name.clone(), value.clone());
                    }
                },
            }
        }
        Some(extended)
    }

    /// Ground this pattern; `None` if a variable is unbound
    pub fn instantiate(&self, bindings: &Bindings) -> Option<Atom> {
        let args = self
            .args
            .iter()
            .map(|t| match t {
                Term::Const(c) => Some(c.clone()),
                Term::Var(name) => bindings.get(name).cloned(),
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Atom {
            predicate: self.predicate.clone(),
            args,
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(Term::to_string).collect();
        write!(f, "{}({})", self.predicate, args.join(", "))
    }
}

/// `head :- body_1, ..., body_n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub head: Pattern,
    pub body: Vec<Pattern>,
}

impl Rule {
    /// Build a rule, rejecting empty bodies and head variables the body never binds
    pub fn new(name: &str, head: Pattern, body: Vec<Pattern>) -> Result<Self> {
        let syntax = |message: String| AppError::RuleSyntax {
            rule: name.to_string(),
            message,
        };

        if body.is_empty() {
            return Err(syntax("rule body is empty".to_string()));
        }
        if let Some(unbound) = head
            .variables()
            .find(|v| !body.iter().any(|p| p.variables().any(|b| b == *v)))
        {
            return Err(syntax(format!("head variable ?{} does not appear in the body", unbound)));
        }

        Ok(Self {
            name: name.to_string(),
            head,
            body,
        })
    }

    /// Parse `name: head(...) :- body(...), body(...)`
    pub fn parse(line: &str) -> Result<Self> {
        let syntax = |message: String| AppError::RuleSyntax {
            rule: line.trim().to_string(),
            message,
        };

        let (name, clause) = line
            .split_once(':')
            .filter(|(_, rest)| !rest.starts_with('-'))
            .ok_or_else(|| syntax("expected 'name:' prefix".to_string()))?;
        let (head, body) = clause
            .split_once(":-")
            .ok_or_else(|| syntax("expected ':-'".to_string()))?;

        let head = Pattern::parse(head).map_err(syntax)?;
        let body = split_top_level(body)
            .into_iter()
            .map(Pattern::parse)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(syntax)?;

        Rule::new(name.trim(), head, body)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: Vec<String> = self.body.iter().map(Pattern::to_string).collect();
        write!(f, "{}: {} :- {}", self.name, self.head, body.join(", "))
    }
}

/// Split on commas that are not inside parentheses
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn var(name: &str) -> Term {
    Term::Var(name.to_string())
}

/// Ordered, read-only rule set shared by all queries
#[derive(Debug, Clone, Default)]
pub struct RuleBase {
    rules: Vec<Rule>,
}

impl RuleBase {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Cause/effect transitivity, type-to-property inheritance and investor suitability
    pub fn builtin() -> Self {
        let rule = |name: &str, head: Pattern, body: Vec<Pattern>| Rule {
            name: name.to_string(),
            head,
            body,
        };

        Self::new(vec![
            rule(
                "causes_transitive",
                Pattern::new("causes", vec![var("X"), var("Z")]),
                vec![
                    Pattern::new("effect_of", vec![var("X"), var("Y")]),
                    Pattern::new("effect_of", vec![var("Y"), var("Z")]),
                ],
            ),
            rule(
                "causes_chain",
                Pattern::new("causes", vec![var("X"), var("Z")]),
                vec![
                    Pattern::new("causes", vec![var("X"), var("Y")]),
                    Pattern::new("effect_of", vec![var("Y"), var("Z")]),
                ],
            ),
            rule(
                "property_inheritance",
                Pattern::new("asset_type", vec![var("A"), var("P")]),
                vec![
                    Pattern::new("has_type", vec![var("A"), var("T")]),
                    Pattern::new("asset_type", vec![var("T"), var("P")]),
                ],
            ),
            rule(
                "suitable_asset",
                Pattern::new("suitable_asset_for", vec![var("I"), var("A")]),
                vec![
                    Pattern::new("asset_type", vec![var("A"), var("P")]),
                    Pattern::new("suitable_for", vec![var("I"), var("P")]),
                ],
            ),
        ])
    }

    /// Parse one rule per line; blank lines and `#` comments are skipped
    pub fn parse(text: &str) -> Result<Self> {
        let rules = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Rule::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
            message: format!("failed to read rules from {}: {}", path.display(), e),
        })?;
        Self::parse(&text)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule() {
        let rule = Rule::parse("causes_transitive: causes(?X, ?Z) :- effect_of(?X, ?Y), effect_of(?Y, ?Z)")
            .unwrap();
        assert_eq!(rule.name, "causes_transitive");
        assert_eq!(rule.head.predicate, "causes");
        assert_eq!(rule.body.len(), 2);
        assert_eq!(rule.body[1].args[0], Term::Var("Y".into()));
    }

    #[test]
    fn test_builtin_rules_round_trip_through_text() {
        let builtin = RuleBase::builtin();
        let text: Vec<String> = builtin.rules().iter().map(Rule::to_string).collect();
        let parsed = RuleBase::parse(&text.join("\n")).unwrap();
        assert_eq!(parsed.rules(), builtin.rules());
    }

    #[test]
    fn test_unbound_head_variable_rejected() {
        let err = Rule::parse("bad: causes(?X, ?W) :- effect_of(?X, ?Y)").unwrap_err();
        assert!(matches!(err, AppError::RuleSyntax { .. }));
    }

    #[test]
    fn test_malformed_rules_rejected() {
        assert!(Rule::parse("causes(?X) :- effect_of(?X, ?Y)").is_err());
        assert!(Rule::parse("r: causes(?X, ?Y)").is_err());
        assert!(Rule::parse("r: causes(?X, ?Y :- effect_of(?X, ?Y)").is_err());
        assert!(Rule::parse("r: causes(?, ?Y) :- effect_of(?X, ?Y)").is_err());
    }

    #[test]
    fn test_parse_skips_comments() {
        let base = RuleBase::parse(
            "# cause and effect\n\nr1: causes(?X, ?Y) :- effect_of(?X, ?Y)\n",
        )
        .unwrap();
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn test_match_and_instantiate() {
        let pattern = Pattern::new("effect_of", vec![var("X"), Term::Const("inflation".into())]);
        let atom = Atom::new("effect_of", ["interest_rate", "inflation"]);

        let bindings = pattern.match_atom(&atom, &Bindings::new()).unwrap();
        assert_eq!(bindings["X"], "interest_rate");

        let mismatched = Atom::new("effect_of", ["interest_rate", "bond"]);
        assert!(pattern.match_atom(&mismatched, &Bindings::new()).is_none());

        let head = Pattern::new("causes", vec![var("X"), var("X")]);
        assert_eq!(
            head.instantiate(&bindings),
            Some(Atom::new("causes", ["interest_rate", "interest_rate"]))
        );
        assert!(Pattern::new("causes", vec![var("Q")]).instantiate(&bindings).is_none());
    }
}
