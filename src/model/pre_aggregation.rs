//! Pre-aggregation definitions.
//!
//! Two field families describe the same references: the singular family
//! (`measures`, `timeDimension`, ...) and the reference-suffixed family
//! (`measureReferences`, `timeDimensionReference`, ...). A definition uses one
//! of them; the evaluator folds the singular family into the suffixed one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::{RefPath, SqlExpr};
use super::member::SqlSnippet;

/// Kind of pre-aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreAggregationType {
    Rollup,
    OriginalSql,
    RollupJoin,
    RollupLambda,
    AutoRollup,
}

impl PreAggregationType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rollup" => Some(Self::Rollup),
            "originalSql" => Some(Self::OriginalSql),
            "rollupJoin" => Some(Self::RollupJoin),
            "rollupLambda" => Some(Self::RollupLambda),
            "autoRollup" => Some(Self::AutoRollup),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rollup => "rollup",
            Self::OriginalSql => "originalSql",
            Self::RollupJoin => "rollupJoin",
            Self::RollupLambda => "rollupLambda",
            Self::AutoRollup => "autoRollup",
        }
    }
}

impl fmt::Display for PreAggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry of `timeDimensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimensionDefinition {
    pub dimension: RefPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
}

/// Refresh policy of a cube or pre-aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incremental: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_window: Option<String>,
}

/// Index on a materialized pre-aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexDefinition {
    pub columns: Vec<RefPath>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
}

/// A pre-aggregation as authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreAggregationDefinition {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub pre_aggregation_type: Option<String>,

    // Singular family
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measures: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_dimension: Option<RefPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_dimensions: Option<Vec<TimeDimensionDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollups: Option<Vec<RefPath>>,

    // Reference-suffixed family
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure_references: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_references: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_references: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_dimension_reference: Option<RefPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_dimension_references: Option<Vec<TimeDimensionDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup_references: Option<Vec<RefPath>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_granularity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_key: Option<RefreshKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_range_start: Option<SqlSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_range_end: Option<SqlSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_range_start: Option<SqlSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_range_end: Option<SqlSnippet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_refresh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_non_strict_date_range_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub union_with_source_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pre_aggregations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<BTreeMap<String, IndexDefinition>>,

    /// Set by the evaluator.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub references: Option<PreAggregationReferences>,
    /// Set by the evaluator.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub indexes_references: Option<BTreeMap<String, IndexReferences>>,
}

impl PreAggregationDefinition {
    /// A rollup over the given measures and dimensions.
    pub fn rollup(measures: Vec<RefPath>, dimensions: Vec<RefPath>) -> Self {
        Self {
            pre_aggregation_type: Some(PreAggregationType::Rollup.as_str().to_string()),
            measures: Some(measures),
            dimensions: Some(dimensions),
            ..Default::default()
        }
    }

    pub fn with_time_dimension(mut self, dimension: RefPath, granularity: impl Into<String>) -> Self {
        self.time_dimension = Some(dimension);
        self.granularity = Some(granularity.into());
        self
    }

    /// The parsed type, `rollup` when absent.
    pub fn kind(&self) -> Option<PreAggregationType> {
        match self.pre_aggregation_type.as_deref() {
            None => Some(PreAggregationType::Rollup),
            Some(raw) => PreAggregationType::parse(raw),
        }
    }

    /// Names of the singular-family fields that are set.
    pub fn singular_fields_used(&self) -> Vec<&'static str> {
        let mut used = Vec::new();
        if self.measures.is_some() {
            used.push("measures");
        }
        if self.dimensions.is_some() {
            used.push("dimensions");
        }
        if self.segments.is_some() {
            used.push("segments");
        }
        if self.time_dimension.is_some() {
            used.push("timeDimension");
        }
        if self.time_dimensions.is_some() {
            used.push("timeDimensions");
        }
        if self.rollups.is_some() {
            used.push("rollups");
        }
        used
    }

    /// Names of the reference-suffixed fields that are set.
    pub fn reference_fields_used(&self) -> Vec<&'static str> {
        let mut used = Vec::new();
        if self.measure_references.is_some() {
            used.push("measureReferences");
        }
        if self.dimension_references.is_some() {
            used.push("dimensionReferences");
        }
        if self.segment_references.is_some() {
            used.push("segmentReferences");
        }
        if self.time_dimension_reference.is_some() {
            used.push("timeDimensionReference");
        }
        if self.time_dimension_references.is_some() {
            used.push("timeDimensionReferences");
        }
        if self.rollup_references.is_some() {
            used.push("rollupReferences");
        }
        used
    }

    /// Does the definition name a time dimension in either family?
    pub fn has_time_dimension(&self) -> bool {
        self.time_dimension.is_some()
            || self.time_dimension_reference.is_some()
            || self.time_dimensions.as_ref().is_some_and(|t| !t.is_empty())
            || self
                .time_dimension_references
                .as_ref()
                .is_some_and(|t| !t.is_empty())
    }

    /// Does the definition name rollups in either family?
    pub fn has_rollups(&self) -> bool {
        self.rollups.as_ref().is_some_and(|r| !r.is_empty())
            || self.rollup_references.as_ref().is_some_and(|r| !r.is_empty())
    }

    /// Does the definition reference any members?
    pub fn has_member_references(&self) -> bool {
        !self.singular_fields_used().is_empty() || !self.reference_fields_used().is_empty()
    }
}

/// A time dimension reference after evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimensionReference {
    pub dimension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
}

/// Fully-qualified member paths a pre-aggregation covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAggregationReferences {
    /// Dimensions followed by segments.
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
    pub time_dimensions: Vec<TimeDimensionReference>,
    pub rollups: Vec<String>,
}

/// An index after evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReferences {
    pub columns: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: String,
}
