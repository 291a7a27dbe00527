//! Concept and relationship types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a node is an abstract class or a concrete named instance
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConceptKind {
    /// Abstract idea, e.g. "stock"
    #[default]
    Concept,
    /// Concrete instance, e.g. an exchange or a coin
    Entity,
}

/// Typed directed edge label.
///
/// The known set is closed; `Other` keeps JSON-loaded knowledge bases usable
/// without a rebuild when they introduce a new label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationType {
    Includes,
    HasType,
    Example,
    Affects,
    SetBy,
    RelatedTo,
    HasProperty,
    SuitableFor,
    Other(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            RelationType::Includes => "INCLUDES",
            RelationType::HasType => "HAS_TYPE",
            RelationType::Example => "EXAMPLE",
            RelationType::Affects => "AFFECTS",
            RelationType::SetBy => "SET_BY",
            RelationType::RelatedTo => "RELATED_TO",
            RelationType::HasProperty => "HAS_PROPERTY",
            RelationType::SuitableFor => "SUITABLE_FOR",
            RelationType::Other(label) => label,
        }
    }

    /// Predicate name this edge contributes to the fact set
    pub fn predicate(&self) -> String {
        match self {
            RelationType::Affects => "effect_of".to_string(),
            RelationType::HasProperty => "asset_type".to_string(),
            other => other.as_str().to_lowercase(),
        }
    }
}

impl From<String> for RelationType {
    fn from(label: String) -> Self {
        match label.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "INCLUDES" => RelationType::Includes,
            "HAS_TYPE" => RelationType::HasType,
            "EXAMPLE" => RelationType::Example,
            "AFFECTS" => RelationType::Affects,
            "SET_BY" => RelationType::SetBy,
            "RELATED_TO" => RelationType::RelatedTo,
            "HAS_PROPERTY" => RelationType::HasProperty,
            "SUITABLE_FOR" => RelationType::SuitableFor,
            normalized => RelationType::Other(normalized.to_string()),
        }
    }
}

impl From<&str> for RelationType {
    fn from(label: &str) -> Self {
        RelationType::from(label.to_string())
    }
}

impl From<RelationType> for String {
    fn from(relation: RelationType) -> Self {
        relation.as_str().to_string()
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(x: f64) -> Self {
        AttributeValue::Float(x)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// Outgoing edge of a concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub relation: RelationType,
    pub target: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, AttributeValue>,
}

/// A node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,

    #[serde(default)]
    pub kind: ConceptKind,

    /// Extra surface forms matched during entity extraction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Ordered outgoing edges
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Concept {
    pub fn new(id: impl Into<String>, kind: ConceptKind) -> Self {
        Self {
            id: id.into(),
            kind,
            aliases: Vec::new(),
            attributes: BTreeMap::new(),
            relationships: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.attributes.insert("name".to_string(), name.into());
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.attributes
            .insert("description".to_string(), description.into());
        self
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.attributes.insert("category".to_string(), category.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn relate(mut self, relation: RelationType, target: &str) -> Self {
        self.relationships.push(Relationship {
            relation,
            target: target.to_string(),
            properties: BTreeMap::new(),
        });
        self
    }

    /// Display name, falling back to the id
    pub fn name(&self) -> &str {
        self.attribute_str("name").unwrap_or(&self.id)
    }

    pub fn description(&self) -> Option<&str> {
        self.attribute_str("description")
    }

    pub fn category(&self) -> Option<&str> {
        self.attribute_str("category")
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_str)
    }

    /// Lowercased surface forms: name, id with spaces, aliases. Deduplicated,
    /// first occurrence wins.
    pub fn match_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::with_capacity(self.aliases.len() + 2);
        let candidates = std::iter::once(self.name().to_lowercase())
            .chain(std::iter::once(self.id.replace('_', " ").to_lowercase()))
            .chain(self.aliases.iter().map(|a| a.to_lowercase()));

        for term in candidates {
            let term = term.trim().to_string();
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        terms
    }
}
