//! Join definitions and relationship kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::SqlExpr;

/// Canonical relationship of a join, seen from the declaring cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    /// Many rows of the declaring cube point at one row of the target.
    BelongsTo,
    /// One row of the declaring cube has many rows in the target.
    HasMany,
    /// One-to-one.
    HasOne,
}

impl Relationship {
    /// Canonicalize an authored relationship name.
    ///
    /// Accepts the canonical names plus their snake_case spellings and the
    /// `many_to_one` / `one_to_many` / `one_to_one` synonyms in any casing.
    pub fn normalize(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "belongsto" | "manytoone" => Some(Relationship::BelongsTo),
            "hasmany" | "onetomany" => Some(Relationship::HasMany),
            "hasone" | "onetoone" => Some(Relationship::HasOne),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::BelongsTo => "belongsTo",
            Relationship::HasMany => "hasMany",
            Relationship::HasOne => "hasOne",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A join from the declaring cube to `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinDefinition {
    /// Target cube name.
    pub name: String,
    /// Relationship as authored; canonicalized by the evaluator.
    pub relationship: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlExpr>,
}

impl JoinDefinition {
    pub fn new(target: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            name: target.into(),
            relationship: relationship.as_str().to_string(),
            sql: None,
        }
    }

    pub fn belongs_to(target: impl Into<String>) -> Self {
        Self::new(target, Relationship::BelongsTo)
    }

    pub fn has_many(target: impl Into<String>) -> Self {
        Self::new(target, Relationship::HasMany)
    }

    pub fn has_one(target: impl Into<String>) -> Self {
        Self::new(target, Relationship::HasOne)
    }

    pub fn with_sql(mut self, sql: impl Into<SqlExpr>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// The canonical relationship, if the authored name is known.
    pub fn relationship_kind(&self) -> Option<Relationship> {
        Relationship::normalize(&self.relationship)
    }
}
