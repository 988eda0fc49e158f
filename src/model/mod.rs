//! Cube definitions as handed over by the parser.
//!
//! Everything in this module is plain data: serde-deserializable from the
//! camelCase shape models are authored in, with builder-style constructors
//! for tests and programmatic use. Fields marked "set by the evaluator" are
//! derived during compilation and never read from input.

pub mod cube;
pub mod expr;
pub mod join;
pub mod member;
pub mod pre_aggregation;

pub use cube::{
    AccessPolicyDefinition, CubeDefinition, EvaluatedFolder, EvaluatedHierarchy,
    FolderDefinition, HierarchyDefinition, IncludeItem, IncludeItemDetail, IncludedMember,
    Includes, MemberLevelPolicy, RowLevelFilter, RowLevelPolicy, ViewCubeDefinition,
};
pub use expr::{ExprError, ExprPart, RefPath, SqlExpr};
pub use join::{JoinDefinition, Relationship};
pub use member::{
    is_calculated_type, to_member_data_type, GranularityDefinition, MemberDefinition, MemberKind,
    RollingWindow, SqlSnippet,
};
pub use pre_aggregation::{
    IndexDefinition, IndexReferences, PreAggregationDefinition, PreAggregationReferences,
    PreAggregationType, RefreshKey, TimeDimensionDefinition, TimeDimensionReference,
};

/// Granularities every time dimension supports.
pub const PREDEFINED_GRANULARITIES: &[&str] = &[
    "second", "minute", "hour", "day", "week", "month", "quarter", "year",
];

pub fn is_predefined_granularity(granularity: &str) -> bool {
    PREDEFINED_GRANULARITIES.contains(&granularity)
}

/// Read cube definitions from JSON: either one cube or an array of cubes.
///
/// Cubes without a `fileName` are attributed to `file_name`.
pub fn cubes_from_json(source: &str, file_name: &str) -> Result<Vec<CubeDefinition>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(source)?;
    let mut cubes: Vec<CubeDefinition> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    for cube in &mut cubes {
        if cube.file_name.is_empty() {
            cube.file_name = file_name.to_string();
        }
    }
    Ok(cubes)
}
