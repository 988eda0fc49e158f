//! Validation of cubes and views.
//!
//! Every cube is checked against the shape tables in [`rules`] plus a handful
//! of cross-field rules. Validation never stops at the first problem: all
//! violations of a cube are collected and reported as one grouped error, so a
//! single run shows everything that needs fixing.
//!
//! A cube that fails validation is excluded from every later phase; see
//! [`CubeValidator::is_cube_valid`].

pub mod rules;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::model::{
    AccessPolicyDefinition, CubeDefinition, Includes, JoinDefinition, MemberDefinition,
    PreAggregationDefinition, RowLevelFilter, PREDEFINED_GRANULARITIES,
};
use crate::semantic::error::ErrorReporter;

use rules::{Requirement, Shape};

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the offending field, e.g. `measures.revenue.sql`.
    pub path: String,
    pub value: Option<String>,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.path.is_empty()) {
            (_, true) => write!(f, "{}", self.message),
            (Some(value), false) => write!(f, "({} = {}) {}", self.path, value, self.message),
            (None, false) => write!(f, "({}) {}", self.path, self.message),
        }
    }
}

/// Check `cube` against every rule.
pub fn validate_cube(cube: &CubeDefinition) -> Vec<Violation> {
    let mut checker = ShapeChecker::default();
    checker.check_cube(cube);
    checker.violations
}

/// Validates cubes and remembers which ones passed.
#[derive(Debug, Default)]
pub struct CubeValidator {
    validated: HashSet<String>,
}

impl CubeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `cube`, reporting one grouped error on failure.
    pub fn validate(&mut self, cube: &CubeDefinition, reporter: &mut ErrorReporter<'_>) -> bool {
        self.validated.remove(&cube.name);
        let violations = validate_cube(cube);

        if violations.is_empty() {
            self.validated.insert(cube.name.clone());
            return true;
        }

        tracing::debug!(cube = %cube.name, count = violations.len(), "cube failed validation");
        let message = violations
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        reporter
            .in_file(cube.file_name.clone())
            .in_context(format!("{} {}", cube.name, cube.kind_name()))
            .error(message);
        false
    }

    /// Cubes that failed (or have not gone through) validation are skipped by
    /// later phases. Split views are generated, never authored, and always pass.
    pub fn is_cube_valid(&self, cube: &CubeDefinition) -> bool {
        self.validated.contains(&cube.name) || cube.is_split_view
    }
}

// ============================================================================
// Checker
// ============================================================================

#[derive(Default)]
struct ShapeChecker {
    violations: Vec<Violation>,
}

fn serialized<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_present(fields: &Value, field: &str) -> bool {
    fields.get(field).is_some_and(|v| !v.is_null())
}

impl ShapeChecker {
    fn violation(&mut self, path: impl Into<String>, value: Option<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            value,
            message: message.into(),
        });
    }

    /// Apply a shape's field requirements to a serialized definition.
    fn check_shape(&mut self, path: &str, fields: &Value, shape: &Shape) {
        for (field, requirement) in shape.fields {
            let present = is_present(fields, field);
            match requirement {
                Requirement::Required if !present => {
                    self.violation(format!("{}.{}", path, field), None, "is required");
                }
                Requirement::Forbidden if present => {
                    let value = fields.get(*field).map(render);
                    self.violation(format!("{}.{}", path, field), value, "is not allowed");
                }
                _ => {}
            }
        }
    }

    fn check_type(&mut self, path: &str, fields: &Value, shapes: &'static [Shape]) {
        let Some(member_type) = fields.get("type").and_then(Value::as_str) else {
            self.violation(format!("{}.type", path), None, "is required");
            return;
        };
        match Shape::find(shapes, member_type) {
            Some(shape) => self.check_shape(path, fields, shape),
            None => self.violation(
                format!("{}.type", path),
                Some(member_type.to_string()),
                format!("must be one of [{}]", Shape::all_types(shapes).join(", ")),
            ),
        }
    }

    fn check_identifier(&mut self, path: String, name: &str) {
        if !rules::is_identifier(name) {
            self.violation(
                path,
                Some(name.to_string()),
                "must match pattern ^[_a-zA-Z][_a-zA-Z0-9]*$",
            );
        }
    }

    fn check_one_of(&mut self, path: String, value: Option<&str>, allowed: &[&str]) {
        if let Some(value) = value {
            if !allowed.contains(&value) {
                self.violation(
                    path,
                    Some(value.to_string()),
                    format!("must be one of [{}]", allowed.join(", ")),
                );
            }
        }
    }

    fn check_includes(&mut self, path: String, includes: Option<&Includes>) {
        if let Some(Includes::All(raw)) = includes {
            if raw != "*" {
                self.violation(path, Some(raw.clone()), "must be \"*\" or a list of members");
            }
        }
    }

    // ========================================================================
    // Cube
    // ========================================================================

    fn check_cube(&mut self, cube: &CubeDefinition) {
        self.check_identifier("name".to_string(), &cube.name);

        let duplicates = cube.duplicate_member_names();
        if !duplicates.is_empty() {
            self.violation("", None, format!("{} defined more than once", duplicates.join(", ")));
        }

        if cube.is_view {
            self.check_view(cube);
        } else {
            match (&cube.sql, &cube.sql_table) {
                (Some(_), Some(_)) => self.violation(
                    "sql",
                    None,
                    "You must use either sql or sqlTable within a model, but not both",
                ),
                (None, None) => self.violation("sql", None, "either sql or sqlTable is required"),
                _ => {}
            }
        }

        if let Some(every) = cube.refresh_key.as_ref().and_then(|k| k.every.as_deref()) {
            if !rules::is_refresh_every(every) {
                self.violation(
                    "refreshKey.every",
                    Some(every.to_string()),
                    "must be an interval such as `1 hour` or a cron expression",
                );
            }
        }

        for (name, measure) in &cube.measures {
            self.check_measure(name, measure);
        }
        for (name, dimension) in &cube.dimensions {
            self.check_dimension(name, dimension);
        }
        for (name, segment) in &cube.segments {
            let path = format!("segments.{}", name);
            self.check_identifier(path.clone(), name);
            self.check_shape(&path, &serialized(segment), &rules::SEGMENT_SHAPE);
        }
        for join in &cube.joins {
            self.check_join(join);
        }
        for (name, pre_aggregation) in &cube.pre_aggregations {
            self.check_pre_aggregation(name, pre_aggregation);
        }
        for (name, hierarchy) in &cube.hierarchies {
            let path = format!("hierarchies.{}", name);
            self.check_identifier(path.clone(), name);
            if hierarchy.levels.is_empty() {
                self.violation(format!("{}.levels", path), None, "must contain at least 1 item");
            }
        }
        for (i, folder) in cube.folders.iter().enumerate() {
            self.check_includes(format!("folders[{}].includes", i), Some(&folder.includes));
        }
        for (i, policy) in cube.access_policy.iter().enumerate() {
            self.check_access_policy(i, policy);
        }
    }

    fn check_view(&mut self, view: &CubeDefinition) {
        if view.sql.is_some() {
            self.violation("sql", None, "is not allowed in a view");
        }
        if view.sql_table.is_some() {
            self.violation("sqlTable", None, "is not allowed in a view");
        }
        if !view.joins.is_empty() {
            self.violation("joins", None, "is not allowed in a view");
        }

        for (i, entry) in view.cubes.iter().enumerate() {
            let path = format!("cubes[{}]", i);
            if entry.join_path.is_none() {
                self.violation(format!("{}.joinPath", path), None, "is required");
            }
            if entry.split.unwrap_or(false) && entry.prefix.unwrap_or(false) {
                self.violation(path.clone(), None, "Using split together with prefix is not supported");
            }
            if let Some(alias) = &entry.alias {
                self.check_identifier(format!("{}.alias", path), alias);
            }
            self.check_includes(format!("{}.includes", path), entry.includes.as_ref());
        }
    }

    // ========================================================================
    // Members
    // ========================================================================

    fn check_measure(&mut self, name: &str, measure: &MemberDefinition) {
        let path = format!("measures.{}", name);
        self.check_identifier(path.clone(), name);
        self.check_type(&path, &serialized(measure), rules::MEASURE_SHAPES);
        self.check_one_of(format!("{}.format", path), measure.format.as_deref(), rules::MEASURE_FORMATS);

        for (i, filter) in measure.filters.iter().flatten().enumerate() {
            if filter.sql.is_none() {
                self.violation(format!("{}.filters[{}].sql", path, i), None, "is required");
            }
        }

        if let Some(window) = &measure.rolling_window {
            for (field, value) in [("trailing", &window.trailing), ("leading", &window.leading)] {
                if let Some(value) = value {
                    if value != "unbounded" && !rules::is_interval(value) {
                        self.violation(
                            format!("{}.rollingWindow.{}", path, field),
                            Some(value.clone()),
                            "must be an interval or `unbounded`",
                        );
                    }
                }
            }
        }
    }

    fn check_dimension(&mut self, name: &str, dimension: &MemberDefinition) {
        let path = format!("dimensions.{}", name);
        self.check_identifier(path.clone(), name);
        self.check_type(&path, &serialized(dimension), rules::DIMENSION_SHAPES);
        self.check_one_of(
            format!("{}.format", path),
            dimension.format.as_deref(),
            rules::DIMENSION_FORMATS,
        );

        for (field, snippet) in [("latitude", &dimension.latitude), ("longitude", &dimension.longitude)] {
            if snippet.as_ref().is_some_and(|s| s.sql.is_none()) {
                self.violation(format!("{}.{}.sql", path, field), None, "is required");
            }
        }

        for (granularity_name, granularity) in dimension.granularities.iter().flatten() {
            let granularity_path = format!("{}.granularities.{}", path, granularity_name);
            self.check_identifier(granularity_path.clone(), granularity_name);
            match granularity.interval.as_deref() {
                None => self.violation(format!("{}.interval", granularity_path), None, "is required"),
                Some(interval) if !rules::is_interval(interval) => self.violation(
                    format!("{}.interval", granularity_path),
                    Some(interval.to_string()),
                    "must be a valid interval",
                ),
                Some(_) => {}
            }
        }
    }

    fn check_join(&mut self, join: &JoinDefinition) {
        let path = format!("joins.{}", join.name);
        self.check_identifier(path.clone(), &join.name);
        if join.sql.is_none() {
            self.violation(format!("{}.sql", path), None, "is required");
        }
        if join.relationship_kind().is_none() {
            self.violation(
                format!("{}.relationship", path),
                Some(join.relationship.clone()),
                "must be one of [belongsTo, hasMany, hasOne] or a synonym",
            );
        }
    }

    // ========================================================================
    // Pre-aggregations
    // ========================================================================

    fn check_pre_aggregation(&mut self, name: &str, pre_aggregation: &PreAggregationDefinition) {
        let path = format!("preAggregations.{}", name);
        self.check_identifier(path.clone(), name);

        let mut fields = serialized(pre_aggregation);
        if let Value::Object(map) = &mut fields {
            map.entry("type").or_insert_with(|| Value::String("rollup".to_string()));
        }
        self.check_type(&path, &fields, rules::PRE_AGGREGATION_SHAPES);

        if !pre_aggregation.singular_fields_used().is_empty()
            && !pre_aggregation.reference_fields_used().is_empty()
        {
            self.violation(
                path.clone(),
                None,
                "[timeDimensionReference, rollupReferences, measureReferences, \
                 dimensionReferences, segmentReferences] are deprecated, please, use \
                 [timeDimension, timeDimensions, rollups, measures, dimensions, segments] instead",
            );
        }

        self.check_one_of(
            format!("{}.granularity", path),
            pre_aggregation.granularity.as_deref(),
            PREDEFINED_GRANULARITIES,
        );
        self.check_one_of(
            format!("{}.partitionGranularity", path),
            pre_aggregation.partition_granularity.as_deref(),
            PREDEFINED_GRANULARITIES,
        );

        let single_time_dimension =
            pre_aggregation.time_dimension.is_some() || pre_aggregation.time_dimension_reference.is_some();
        let kind = pre_aggregation.pre_aggregation_type.as_deref().unwrap_or("rollup");
        if kind == "rollup" && single_time_dimension && pre_aggregation.granularity.is_none() {
            self.violation(format!("{}.granularity", path), None, "is required");
        }
        for (i, entry) in pre_aggregation
            .time_dimensions
            .iter()
            .chain(&pre_aggregation.time_dimension_references)
            .flatten()
            .enumerate()
        {
            if entry.granularity.is_none() {
                self.violation(
                    format!("{}.timeDimensions[{}].granularity", path, i),
                    None,
                    "is required",
                );
            }
        }

        if matches!(kind, "rollupJoin" | "rollupLambda") && !pre_aggregation.has_rollups() {
            self.violation(format!("{}.rollups", path), None, "is required");
        }

        if let Some(refresh_key) = &pre_aggregation.refresh_key {
            for (field, value) in [("every", &refresh_key.every), ("updateWindow", &refresh_key.update_window)] {
                if let Some(value) = value {
                    if !rules::is_refresh_every(value) {
                        self.violation(
                            format!("{}.refreshKey.{}", path, field),
                            Some(value.clone()),
                            "must be an interval such as `1 hour` or a cron expression",
                        );
                    }
                }
            }
        }

        for (field, range) in [
            ("buildRangeStart", &pre_aggregation.build_range_start),
            ("buildRangeEnd", &pre_aggregation.build_range_end),
            ("refreshRangeStart", &pre_aggregation.refresh_range_start),
            ("refreshRangeEnd", &pre_aggregation.refresh_range_end),
        ] {
            if range.as_ref().is_some_and(|r| r.sql.is_none()) {
                self.violation(format!("{}.{}.sql", path, field), None, "is required");
            }
        }

        for (index_name, index) in pre_aggregation.indexes.iter().flatten() {
            let index_path = format!("{}.indexes.{}", path, index_name);
            if index.columns.is_empty() {
                self.violation(format!("{}.columns", index_path), None, "must contain at least 1 item");
            }
            self.check_one_of(format!("{}.type", index_path), index.index_type.as_deref(), rules::INDEX_TYPES);
        }
    }

    // ========================================================================
    // Access policies
    // ========================================================================

    fn check_access_policy(&mut self, index: usize, policy: &AccessPolicyDefinition) {
        let path = format!("accessPolicy[{}]", index);
        if policy.role.is_none() {
            self.violation(format!("{}.role", path), None, "is required");
        }
        if let Some(member_level) = &policy.member_level {
            self.check_includes(format!("{}.memberLevel.includes", path), member_level.includes.as_ref());
            self.check_includes(format!("{}.memberLevel.excludes", path), member_level.excludes.as_ref());
        }
        if let Some(row_level) = &policy.row_level {
            if row_level.filters.is_empty() && !row_level.allow_all.unwrap_or(false) {
                self.violation(
                    format!("{}.rowLevel", path),
                    None,
                    "must declare filters or allowAll",
                );
            }
            for (i, filter) in row_level.filters.iter().enumerate() {
                self.check_row_filter(&format!("{}.rowLevel.filters[{}]", path, i), filter);
            }
        }
    }

    fn check_row_filter(&mut self, path: &str, filter: &RowLevelFilter) {
        let groups = [("or", &filter.or), ("and", &filter.and)];
        let is_group = groups.iter().any(|(_, g)| g.is_some());

        if is_group {
            for (name, group) in groups {
                for (i, nested) in group.iter().flatten().enumerate() {
                    self.check_row_filter(&format!("{}.{}[{}]", path, name, i), nested);
                }
            }
            return;
        }

        if filter.member.is_none() {
            self.violation(format!("{}.member", path), None, "is required");
        }
        if filter.operator.is_none() {
            self.violation(format!("{}.operator", path), None, "is required");
        }
    }
}
