//! Public description of evaluated cubes and views.
//!
//! This is what API consumers see: titles, visibility, member types, drill
//! members, hierarchies and folders. Everything is derived from the evaluated
//! model; nothing here feeds back into compilation.

use inflector::Inflector;
use serde::Serialize;

use crate::model::{CubeDefinition, MemberDefinition, to_member_data_type};
use crate::semantic::error::ErrorReporter;
use crate::semantic::evaluator::CubeEvaluator;
use crate::semantic::join_graph::JoinGraph;
use crate::semantic::symbols::CubeSymbols;

/// One exported cube or view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeMeta {
    pub name: String,
    /// `cube` or `view`
    #[serde(rename = "type")]
    pub cube_type: String,
    pub title: String,
    pub is_visible: bool,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_component: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    pub measures: Vec<MeasureMeta>,
    pub dimensions: Vec<DimensionMeta>,
    pub segments: Vec<SegmentMeta>,
    pub hierarchies: Vec<HierarchyMeta>,
    pub folders: Vec<FolderMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureMeta {
    /// `Cube.measure`
    pub name: String,
    pub title: String,
    pub short_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub measure_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agg_type: Option<String>,
    pub cumulative: bool,
    pub drill_members: Vec<String>,
    pub drill_members_grouped: DrillMembersGrouped,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub is_visible: bool,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_member: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrillMembersGrouped {
    pub measures: Vec<String>,
    pub dimensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionMeta {
    /// `Cube.dimension`
    pub name: String,
    pub title: String,
    pub short_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub dimension_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub suggest_filter_values: bool,
    pub primary_key: bool,
    pub is_visible: bool,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_member: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularities: Option<Vec<GranularityMeta>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GranularityMeta {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMeta {
    pub name: String,
    pub title: String,
    pub short_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_visible: bool,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyMeta {
    pub name: String,
    pub title: String,
    pub levels: Vec<String>,
    pub public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_member: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderMeta {
    pub name: String,
    pub members: Vec<String>,
}

/// Export every evaluated cube and view, in registration order.
pub fn transform(
    symbols: &CubeSymbols,
    evaluator: &CubeEvaluator,
    join_graph: &JoinGraph,
    reporter: &mut ErrorReporter<'_>,
) -> Vec<CubeMeta> {
    evaluator
        .cubes()
        .map(|cube| {
            let mut file_reporter = reporter.in_file(cube.file_name.clone());
            let mut cube_reporter = file_reporter.in_context(format!("{} {}", cube.name, cube.kind_name()));
            transform_cube(symbols, evaluator, join_graph, cube, &mut cube_reporter)
        })
        .collect()
}

fn transform_cube(
    symbols: &CubeSymbols,
    evaluator: &CubeEvaluator,
    join_graph: &JoinGraph,
    cube: &CubeDefinition,
    reporter: &mut ErrorReporter<'_>,
) -> CubeMeta {
    let title = cube.title.clone().unwrap_or_else(|| titleize(&cube.name));
    let visible = cube.is_visible();
    let member_visible = |member: &MemberDefinition, default: bool| visible && member.visibility().unwrap_or(default);
    let path = |name: &str| format!("{}.{}", cube.name, name);

    let measures = cube
        .measures
        .iter()
        .map(|(name, measure)| {
            let drill_members = match &measure.drill_members {
                Some(members) => symbols
                    .evaluate_references(&cube.name, members, false)
                    .unwrap_or_else(|err| {
                        reporter.report(&err);
                        Vec::new()
                    }),
                None => Vec::new(),
            };
            let drill_members_grouped = DrillMembersGrouped {
                measures: drill_members.iter().filter(|m| evaluator.is_measure(m)).cloned().collect(),
                dimensions: drill_members.iter().filter(|m| evaluator.is_dimension(m)).cloned().collect(),
            };
            let member_type = measure.member_type().unwrap_or("number");

            MeasureMeta {
                name: path(name),
                title: member_title(&title, name, measure),
                short_title: short_title(name, measure),
                description: measure.description.clone(),
                measure_type: to_member_data_type(member_type).to_string(),
                agg_type: measure.agg_type.clone().or_else(|| measure.member_type.clone()),
                cumulative: measure.is_cumulative(),
                drill_members,
                drill_members_grouped,
                format: measure.format.clone(),
                is_visible: member_visible(measure, true),
                public: member_visible(measure, true),
                alias_member: measure.alias_member.clone(),
                meta: measure.meta.clone(),
            }
        })
        .collect();

    let dimensions = cube
        .dimensions
        .iter()
        .map(|(name, dimension)| {
            let shown_by_default = !dimension.is_primary_key();
            DimensionMeta {
                name: path(name),
                title: member_title(&title, name, dimension),
                short_title: short_title(name, dimension),
                description: dimension.description.clone(),
                dimension_type: dimension.member_type().unwrap_or_default().to_string(),
                format: dimension.format.clone(),
                suggest_filter_values: dimension.suggest_filter_values.unwrap_or(true),
                primary_key: dimension.is_primary_key(),
                is_visible: member_visible(dimension, shown_by_default),
                public: member_visible(dimension, shown_by_default),
                alias_member: dimension.alias_member.clone(),
                granularities: dimension.granularities.as_ref().map(|granularities| {
                    granularities
                        .iter()
                        .map(|(name, granularity)| GranularityMeta {
                            name: name.clone(),
                            title: granularity.title.clone().unwrap_or_else(|| titleize(name)),
                            interval: granularity.interval.clone(),
                            offset: granularity.offset.clone(),
                            origin: granularity.origin.clone(),
                        })
                        .collect()
                }),
                meta: dimension.meta.clone(),
            }
        })
        .collect();

    let segments = cube
        .segments
        .iter()
        .map(|(name, segment)| SegmentMeta {
            name: path(name),
            title: member_title(&title, name, segment),
            short_title: short_title(name, segment),
            description: segment.description.clone(),
            is_visible: member_visible(segment, true),
            public: member_visible(segment, true),
            meta: segment.meta.clone(),
        })
        .collect();

    let hierarchies = cube
        .evaluated_hierarchies
        .iter()
        .map(|hierarchy| HierarchyMeta {
            name: path(&hierarchy.name),
            title: hierarchy.title.clone().unwrap_or_else(|| titleize(&hierarchy.name)),
            levels: hierarchy.levels.clone(),
            public: visible && hierarchy.public.unwrap_or(true),
            alias_member: hierarchy.alias_member.clone(),
        })
        .collect();

    let folders = cube
        .evaluated_folders
        .iter()
        .map(|folder| FolderMeta {
            name: folder.name.clone(),
            members: folder.members.clone(),
        })
        .collect();

    CubeMeta {
        name: cube.name.clone(),
        cube_type: cube.kind_name().to_string(),
        title,
        is_visible: visible,
        public: visible,
        description: cube.description.clone(),
        connected_component: join_graph.connected_component(&cube.name),
        meta: cube.meta.clone(),
        measures,
        dimensions,
        segments,
        hierarchies,
        folders,
    }
}

/// `orderCount` / `order_count` -> `Order Count`
pub fn titleize(name: &str) -> String {
    name.to_title_case()
}

fn member_title(cube_title: &str, name: &str, member: &MemberDefinition) -> String {
    format!("{} {}", cube_title, short_title(name, member))
}

fn short_title(name: &str, member: &MemberDefinition) -> String {
    member.title.clone().unwrap_or_else(|| titleize(name))
}
