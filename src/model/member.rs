//! Measures, dimensions and segments.
//!
//! All three member kinds share one definition shape. Which fields are
//! required or forbidden for a given `type` is decided by the validator, not
//! by the Rust type, so that a single compile run can report every problem
//! in a model at once.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::{RefPath, SqlExpr};

/// Measure types whose value is computed rather than aggregated.
pub const CALCULATED_TYPES: &[&str] = &["number", "string", "time", "boolean"];

/// Is `member_type` one of the calculated measure types?
pub fn is_calculated_type(member_type: &str) -> bool {
    CALCULATED_TYPES.contains(&member_type)
}

/// The data type a measure exposes: calculated types as-is, aggregates as `number`.
pub fn to_member_data_type(member_type: &str) -> &str {
    if is_calculated_type(member_type) {
        member_type
    } else {
        "number"
    }
}

/// The member collections a cube carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemberKind {
    #[serde(rename = "measures")]
    Measure,
    #[serde(rename = "dimensions")]
    Dimension,
    #[serde(rename = "segments")]
    Segment,
    #[serde(rename = "hierarchies")]
    Hierarchy,
}

impl MemberKind {
    /// Kinds stored as [`MemberDefinition`] maps, in lookup order.
    pub const MEMBERS: [MemberKind; 3] = [
        MemberKind::Measure,
        MemberKind::Dimension,
        MemberKind::Segment,
    ];

    /// Collection name, e.g. `measures`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Measure => "measures",
            MemberKind::Dimension => "dimensions",
            MemberKind::Segment => "segments",
            MemberKind::Hierarchy => "hierarchies",
        }
    }

    /// Singular name, e.g. `measure`.
    pub fn singular(&self) -> &'static str {
        match self {
            MemberKind::Measure => "measure",
            MemberKind::Dimension => "dimension",
            MemberKind::Segment => "segment",
            MemberKind::Hierarchy => "hierarchy",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A nested `{ sql }` block (measure filters, geo coordinates, range bounds).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SqlSnippet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlExpr>,
}

impl SqlSnippet {
    pub fn new(sql: impl Into<SqlExpr>) -> Self {
        Self {
            sql: Some(sql.into()),
        }
    }
}

/// Window of a cumulative measure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RollingWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

/// Custom granularity of a time dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GranularityDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A measure, dimension or segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberDefinition {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlExpr>,
    /// Aggregation of a view measure generated from a cube measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agg_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<SqlSnippet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill_members: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_window: Option<RollingWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularities: Option<BTreeMap<String, GranularityDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<SqlSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<SqlSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_query: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggest_filter_values: Option<bool>,

    /// Set by the evaluator: does the expression belong to the declaring cube alone?
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub owned_by_cube: Option<bool>,
    /// Set by the evaluator: `Cube.member` this member is a one-to-one alias of.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub alias_member: Option<String>,
}

impl MemberDefinition {
    /// A member of the given `type`.
    pub fn of_type(member_type: impl Into<String>) -> Self {
        Self {
            member_type: Some(member_type.into()),
            ..Default::default()
        }
    }

    /// A segment (segments carry no type).
    pub fn segment(sql: impl Into<SqlExpr>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    pub fn with_sql(mut self, sql: impl Into<SqlExpr>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = Some(true);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    pub fn with_drill_members(mut self, members: Vec<RefPath>) -> Self {
        self.drill_members = Some(members);
        self
    }

    pub fn with_granularity(mut self, name: impl Into<String>, interval: impl Into<String>) -> Self {
        self.granularities.get_or_insert_with(BTreeMap::new).insert(
            name.into(),
            GranularityDefinition {
                interval: Some(interval.into()),
                ..Default::default()
            },
        );
        self
    }

    pub fn member_type(&self) -> Option<&str> {
        self.member_type.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key.unwrap_or(false)
    }

    pub fn is_time(&self) -> bool {
        self.member_type() == Some("time")
    }

    /// `public`, falling back to the legacy `shown` flag.
    pub fn visibility(&self) -> Option<bool> {
        self.public.or(self.shown)
    }

    /// Is the measure cumulative (rolling window or running total)?
    pub fn is_cumulative(&self) -> bool {
        self.rolling_window.is_some() || self.member_type() == Some("runningTotal")
    }

    /// Does a time dimension expose `granularity`, predefined or custom?
    pub fn has_granularity(&self, granularity: &str) -> bool {
        if !self.is_time() {
            return false;
        }
        crate::model::is_predefined_granularity(granularity)
            || self
                .granularities
                .as_ref()
                .is_some_and(|g| g.contains_key(granularity))
    }
}
