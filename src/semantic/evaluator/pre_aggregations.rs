//! Pre-aggregation evaluation and lookup.
//!
//! The singular field family is folded into the reference family, references
//! are resolved to member paths, and unset flags take their defaults from
//! [`PreAggregationSettings`](crate::config::PreAggregationSettings).

use serde::Serialize;

use crate::model::{
    CubeDefinition, IndexReferences, PreAggregationDefinition, PreAggregationReferences,
    PreAggregationType, RefPath, TimeDimensionDefinition, TimeDimensionReference,
};
use crate::semantic::error::{CompilerError, CompilerResult, ErrorReporter};
use crate::semantic::symbols::CubeSymbols;

use super::CubeEvaluator;

const DEFAULT_DATA_SOURCE: &str = "default";

/// A pre-aggregation as handed to query builders and refresh schedulers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAggregationDescriptor {
    /// `cube.name`
    pub id: String,
    pub cube: String,
    pub pre_aggregation_name: String,
    pub data_source: String,
    pub pre_aggregation: PreAggregationDefinition,
    pub references: PreAggregationReferences,
}

/// Which pre-aggregations [`CubeEvaluator::pre_aggregations`] returns.
#[derive(Debug, Clone, Default)]
pub struct PreAggregationFilter {
    /// Only those with `scheduledRefresh` set.
    pub scheduled: bool,
    pub data_sources: Option<Vec<String>>,
    pub cubes: Option<Vec<String>>,
    pub pre_aggregation_ids: Option<Vec<String>>,
}

impl PreAggregationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(mut self) -> Self {
        self.scheduled = true;
        self
    }

    pub fn with_data_sources(mut self, data_sources: Vec<String>) -> Self {
        self.data_sources = Some(data_sources);
        self
    }

    pub fn with_cubes(mut self, cubes: Vec<String>) -> Self {
        self.cubes = Some(cubes);
        self
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.pre_aggregation_ids = Some(ids);
        self
    }

    fn matches(&self, descriptor: &PreAggregationDescriptor) -> bool {
        let contains = |list: &Option<Vec<String>>, value: &str| {
            list.as_ref().map_or(true, |l| l.iter().any(|v| v == value))
        };
        (!self.scheduled || descriptor.pre_aggregation.scheduled_refresh == Some(true))
            && contains(&self.data_sources, &descriptor.data_source)
            && contains(&self.cubes, &descriptor.cube)
            && contains(&self.pre_aggregation_ids, &descriptor.id)
    }
}

impl CubeEvaluator {
    /// Every evaluated pre-aggregation matching `filter`.
    pub fn pre_aggregations(&self, filter: &PreAggregationFilter) -> Vec<PreAggregationDescriptor> {
        self.cubes()
            .flat_map(|cube| {
                cube.pre_aggregations.iter().map(move |(name, pre_aggregation)| {
                    PreAggregationDescriptor {
                        id: format!("{}.{}", cube.name, name),
                        cube: cube.name.clone(),
                        pre_aggregation_name: name.clone(),
                        data_source: cube
                            .data_source
                            .clone()
                            .unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_string()),
                        references: pre_aggregation.references.clone().unwrap_or_default(),
                        pre_aggregation: pre_aggregation.clone(),
                    }
                })
            })
            .filter(|descriptor| filter.matches(descriptor))
            .collect()
    }

    pub(super) fn evaluate_pre_aggregations(
        &self,
        symbols: &CubeSymbols,
        cube: &mut CubeDefinition,
        reporter: &mut ErrorReporter<'_>,
    ) {
        let names: Vec<String> = cube.pre_aggregations.keys().cloned().collect();
        for name in names {
            let Some(mut pre_aggregation) = cube.pre_aggregations.get(&name).cloned() else {
                continue;
            };
            let mut pre_aggregation_reporter = reporter.in_context(format!("{} pre-aggregation", name));

            self.apply_defaults(&mut pre_aggregation, &mut pre_aggregation_reporter);
            fold_singular_fields(&mut pre_aggregation);

            match evaluate_references(symbols, cube, &pre_aggregation) {
                Ok(references) => pre_aggregation.references = Some(references),
                Err(err) => pre_aggregation_reporter.report(&err),
            }

            if let Some(indexes) = &pre_aggregation.indexes {
                let mut evaluated = std::collections::BTreeMap::new();
                for (index_name, index) in indexes {
                    match symbols.evaluate_references(&cube.name, &index.columns, false) {
                        Ok(columns) => {
                            evaluated.insert(
                                index_name.clone(),
                                IndexReferences {
                                    columns,
                                    index_type: index
                                        .index_type
                                        .clone()
                                        .unwrap_or_else(|| "regular".to_string()),
                                },
                            );
                        }
                        Err(err) => pre_aggregation_reporter
                            .in_context(format!("{} index", index_name))
                            .report(&err),
                    }
                }
                pre_aggregation.indexes_references = Some(evaluated);
            }

            cube.pre_aggregations.insert(name, pre_aggregation);
        }
    }

    fn apply_defaults(
        &self,
        pre_aggregation: &mut PreAggregationDefinition,
        reporter: &mut ErrorReporter<'_>,
    ) {
        let kind = pre_aggregation.kind().unwrap_or(PreAggregationType::Rollup);
        pre_aggregation
            .pre_aggregation_type
            .get_or_insert_with(|| kind.as_str().to_string());

        if pre_aggregation.build_range_start.is_some() && pre_aggregation.refresh_range_start.is_some() {
            reporter.warning(
                "You specified both buildRangeStart and refreshRangeStart, buildRangeStart will be used.",
            );
        }
        if pre_aggregation.build_range_end.is_some() && pre_aggregation.refresh_range_end.is_some() {
            reporter.warning(
                "You specified both buildRangeEnd and refreshRangeEnd, buildRangeEnd will be used.",
            );
        }
        if let Some(start) = &pre_aggregation.build_range_start {
            pre_aggregation.refresh_range_start = Some(start.clone());
        }
        if let Some(end) = &pre_aggregation.build_range_end {
            pre_aggregation.refresh_range_end = Some(end.clone());
        }

        if pre_aggregation.scheduled_refresh.is_none()
            && !matches!(kind, PreAggregationType::RollupJoin | PreAggregationType::RollupLambda)
        {
            pre_aggregation.scheduled_refresh = Some(self.defaults.scheduled_refresh);
        }
        if pre_aggregation.external.is_none()
            && matches!(kind, PreAggregationType::Rollup | PreAggregationType::RollupJoin)
        {
            pre_aggregation.external = Some(self.defaults.external);
        }
        if pre_aggregation.allow_non_strict_date_range_match.is_none()
            && pre_aggregation.has_time_dimension()
            && matches!(
                kind,
                PreAggregationType::OriginalSql | PreAggregationType::Rollup | PreAggregationType::RollupJoin
            )
        {
            pre_aggregation.allow_non_strict_date_range_match =
                Some(self.defaults.allow_non_strict_date_range_match);
        }

        if let Some(indexes) = &mut pre_aggregation.indexes {
            for index in indexes.values_mut() {
                index.index_type.get_or_insert_with(|| "regular".to_string());
            }
        }
    }
}

/// Move the singular family into the reference family.
fn fold_singular_fields(pre_aggregation: &mut PreAggregationDefinition) {
    fn fold<T>(singular: &mut Option<T>, reference: &mut Option<T>) {
        if let Some(value) = singular.take() {
            reference.get_or_insert(value);
        }
    }

    fold(&mut pre_aggregation.measures, &mut pre_aggregation.measure_references);
    fold(&mut pre_aggregation.dimensions, &mut pre_aggregation.dimension_references);
    fold(&mut pre_aggregation.segments, &mut pre_aggregation.segment_references);
    fold(&mut pre_aggregation.rollups, &mut pre_aggregation.rollup_references);
    fold(&mut pre_aggregation.time_dimension, &mut pre_aggregation.time_dimension_reference);
    fold(&mut pre_aggregation.time_dimensions, &mut pre_aggregation.time_dimension_references);

    // A single time dimension becomes a one-element list carrying the granularity.
    if let Some(dimension) = pre_aggregation.time_dimension_reference.take() {
        pre_aggregation
            .time_dimension_references
            .get_or_insert_with(Vec::new)
            .insert(
                0,
                TimeDimensionDefinition {
                    dimension,
                    granularity: pre_aggregation.granularity.clone(),
                },
            );
    }
}

fn evaluate_references(
    symbols: &CubeSymbols,
    cube: &CubeDefinition,
    pre_aggregation: &PreAggregationDefinition,
) -> CompilerResult<PreAggregationReferences> {
    let paths = |list: &Option<Vec<RefPath>>| -> CompilerResult<Vec<String>> {
        symbols.evaluate_references(&cube.name, list.as_deref().unwrap_or_default(), true)
    };

    let mut dimensions = paths(&pre_aggregation.dimension_references)?;
    dimensions.extend(paths(&pre_aggregation.segment_references)?);

    let time_dimensions = pre_aggregation
        .time_dimension_references
        .iter()
        .flatten()
        .map(|entry| {
            Ok(TimeDimensionReference {
                dimension: symbols.evaluate_reference(&cube.name, &entry.dimension, true)?,
                granularity: entry.granularity.clone(),
            })
        })
        .collect::<CompilerResult<Vec<_>>>()?;

    let rollups = pre_aggregation
        .rollup_references
        .iter()
        .flatten()
        .map(|rollup| resolve_rollup(symbols, cube, rollup))
        .collect::<CompilerResult<Vec<_>>>()?;

    Ok(PreAggregationReferences {
        dimensions,
        measures: paths(&pre_aggregation.measure_references)?,
        time_dimensions,
        rollups,
    })
}

/// `name` or `Cube.name` of another pre-aggregation.
fn resolve_rollup(symbols: &CubeSymbols, cube: &CubeDefinition, rollup: &RefPath) -> CompilerResult<String> {
    let (target, name) = match rollup.segments() {
        [name] => (cube, name.as_str()),
        [.., target, name] => {
            let target = if target == &cube.name {
                cube
            } else {
                symbols.cube(target).ok_or_else(|| {
                    CompilerError::user(format!(
                        "Cube '{}' referenced in rollups of '{}' not found",
                        target, cube.name
                    ))
                })?
            };
            (target, name.as_str())
        }
        [] => return Err(CompilerError::internal("empty rollup reference")),
    };

    if target.pre_aggregations.contains_key(name) {
        Ok(format!("{}.{}", target.name, name))
    } else {
        Err(CompilerError::user(format!(
            "Pre-aggregation '{}' referenced in rollups of '{}' not found",
            rollup, cube.name
        )))
    }
}
