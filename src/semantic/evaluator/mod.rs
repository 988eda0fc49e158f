//! Evaluated cubes.
//!
//! The evaluator takes the built symbol objects of every valid cube and view
//! and derives what the join graph, metadata export and query builders read:
//!
//! - canonical relationship names on joins
//! - member ownership (`ownedByCube`) and alias members
//! - pre-aggregation references and defaults
//! - hierarchy levels, folder members and access policy member paths
//! - primary keys per cube
//!
//! Problems are reported per cube and never abort the batch.

mod access_policy;
mod hierarchies;
mod pre_aggregations;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use crate::config::PreAggregationSettings;
use crate::model::{CubeDefinition, MemberDefinition, MemberKind, is_calculated_type};
use crate::semantic::error::{CompilerError, CompilerResult, ErrorReporter};
use crate::semantic::symbols::CubeSymbols;
use crate::validation::CubeValidator;

pub use pre_aggregations::{PreAggregationDescriptor, PreAggregationFilter};

/// Evaluated cubes and views, in registration order.
#[derive(Debug, Clone, Default)]
pub struct CubeEvaluator {
    order: Vec<String>,
    cubes: HashMap<String, CubeDefinition>,
    primary_keys: HashMap<String, Vec<String>>,
    defaults: PreAggregationSettings,
}

impl CubeEvaluator {
    pub fn new(defaults: PreAggregationSettings) -> Self {
        Self {
            defaults,
            ..Default::default()
        }
    }

    /// Evaluate every valid cube of `symbols`.
    pub fn evaluate(
        &mut self,
        symbols: &CubeSymbols,
        validator: &CubeValidator,
        reporter: &mut ErrorReporter<'_>,
    ) {
        self.order.clear();
        self.cubes.clear();
        self.primary_keys.clear();

        for cube in symbols.cube_list() {
            if !validator.is_cube_valid(cube) {
                continue;
            }
            let mut file_reporter = reporter.in_file(cube.file_name.clone());
            let mut cube_reporter =
                file_reporter.in_context(format!("{} {}", cube.name, cube.kind_name()));

            let evaluated = self.evaluate_cube(symbols, cube.clone(), &mut cube_reporter);
            self.primary_keys
                .insert(evaluated.name.clone(), evaluated.primary_key_names());
            self.order.push(evaluated.name.clone());
            self.cubes.insert(evaluated.name.clone(), evaluated);
        }

        tracing::debug!(cubes = self.order.len(), "evaluated cubes");
    }

    fn evaluate_cube(
        &self,
        symbols: &CubeSymbols,
        mut cube: CubeDefinition,
        reporter: &mut ErrorReporter<'_>,
    ) -> CubeDefinition {
        for join in &mut cube.joins {
            if let Some(kind) = join.relationship_kind() {
                join.relationship = kind.as_str().to_string();
            }
        }

        let generated: HashSet<String> = cube.included_members.iter().map(|m| m.name.clone()).collect();
        for kind in MemberKind::MEMBERS {
            let name = cube.name.clone();
            let is_view = cube.is_view;
            if let Some(members) = cube.members_mut(kind) {
                for (member_name, member) in members.iter_mut() {
                    let owner = Owner {
                        cube: &name,
                        is_view,
                        generated: generated.contains(member_name),
                    };
                    evaluate_ownership(symbols, &owner, kind, member_name, member, reporter);
                }
            }
        }

        self.evaluate_pre_aggregations(symbols, &mut cube, reporter);
        hierarchies::evaluate_hierarchies(symbols, &mut cube, reporter);
        hierarchies::evaluate_folders(&mut cube, reporter);
        access_policy::evaluate_access_policies(symbols, &mut cube, reporter);

        cube
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn cube(&self, name: &str) -> Option<&CubeDefinition> {
        self.cubes.get(name)
    }

    pub fn cube_exists(&self, name: &str) -> bool {
        self.cubes.contains_key(name)
    }

    /// Evaluated cubes and views in registration order.
    pub fn cubes(&self) -> impl Iterator<Item = &CubeDefinition> {
        self.order.iter().filter_map(|name| self.cubes.get(name))
    }

    pub fn cube_names(&self) -> &[String] {
        &self.order
    }

    pub fn cubes_by_file_name(&self, file_name: &str) -> Vec<&CubeDefinition> {
        self.cubes().filter(|c| c.file_name == file_name).collect()
    }

    /// Primary key dimension names of `cube`.
    pub fn primary_keys(&self, cube: &str) -> &[String] {
        self.primary_keys.get(cube).map(Vec::as_slice).unwrap_or_default()
    }

    /// `Cube.dimension` of every time dimension.
    pub fn time_dimension_paths_for_cube(&self, cube: &str) -> Vec<String> {
        self.cube(cube)
            .map(|c| {
                c.dimensions
                    .iter()
                    .filter(|(_, d)| d.is_time())
                    .map(|(name, _)| format!("{}.{}", c.name, name))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn measure_by_path(&self, path: &str) -> CompilerResult<&MemberDefinition> {
        self.by_path(MemberKind::Measure, path)
    }

    pub fn dimension_by_path(&self, path: &str) -> CompilerResult<&MemberDefinition> {
        self.by_path(MemberKind::Dimension, path)
    }

    pub fn segment_by_path(&self, path: &str) -> CompilerResult<&MemberDefinition> {
        self.by_path(MemberKind::Segment, path)
    }

    /// Look up `Cube.member` among members of `kind`.
    pub fn by_path(&self, kind: MemberKind, path: &str) -> CompilerResult<&MemberDefinition> {
        let (cube_name, member_name) = parse_path(path)?;
        let cube = self.cube(cube_name).ok_or_else(|| {
            CompilerError::user(format!("Cube '{}' not found for path '{}'", cube_name, path))
        })?;
        cube.members(kind)
            .and_then(|members| members.get(member_name))
            .ok_or_else(|| {
                CompilerError::user(format!("'{}' not found for path '{}'", member_name, path))
            })
    }

    /// Look up `Cube.member` in any member collection.
    pub fn by_path_any_type(&self, path: &str) -> CompilerResult<(MemberKind, &MemberDefinition)> {
        MemberKind::MEMBERS
            .into_iter()
            .find_map(|kind| self.by_path(kind, path).ok().map(|m| (kind, m)))
            .ok_or_else(|| CompilerError::user(format!("Can't resolve member '{}'", path)))
    }

    pub fn is_measure(&self, path: &str) -> bool {
        self.by_path(MemberKind::Measure, path).is_ok()
    }

    pub fn is_dimension(&self, path: &str) -> bool {
        self.by_path(MemberKind::Dimension, path).is_ok()
    }

    pub fn is_segment(&self, path: &str) -> bool {
        self.by_path(MemberKind::Segment, path).is_ok()
    }
}

/// Split `Cube.member`.
fn parse_path(path: &str) -> CompilerResult<(&str, &str)> {
    match path.split_once('.') {
        Some((cube, member)) if !cube.is_empty() && !member.is_empty() && !member.contains('.') => {
            Ok((cube, member))
        }
        _ => Err(CompilerError::user(format!(
            "Member path '{}' must be in the form Cube.member",
            path
        ))),
    }
}

/// The cube or view a member is evaluated in.
struct Owner<'a> {
    cube: &'a str,
    is_view: bool,
    /// The member was generated by view composition.
    generated: bool,
}

/// Set `owned_by_cube` and `alias_member` on one member.
///
/// Cubes may only define members over their own columns; views may only
/// carry members generated from the cubes they include.
fn evaluate_ownership(
    symbols: &CubeSymbols,
    owner: &Owner<'_>,
    kind: MemberKind,
    name: &str,
    member: &mut MemberDefinition,
    reporter: &mut ErrorReporter<'_>,
) {
    let cube = owner.cube;
    let usage = match &member.sql {
        Some(sql) => match symbols.collect_referenced_cubes(cube, sql) {
            Ok(usage) => Some(usage),
            Err(err) => {
                member.owned_by_cube = Some(true);
                reporter
                    .in_context(format!("{} {}", name, kind.singular()))
                    .report(&err);
                return;
            }
        },
        None => None,
    };

    let foreign = usage.as_ref().map(|u| u.foreign_cubes(cube)).unwrap_or_default();
    let owned = foreign.is_empty();
    member.owned_by_cube = Some(owned);

    if !owner.is_view && !owned {
        reporter.error(format!(
            "Member '{}.{}' references foreign cubes: {}. Please split and move this definition to corresponding cubes.",
            cube,
            name,
            foreign.join(", ")
        ));
    }
    if owner.is_view && owned && !owner.generated {
        reporter.error(format!(
            "View '{}' defines own member '{}.{}'. Please move this member definition to one of the cubes.",
            cube, cube, name
        ));
    }

    let Some(usage) = usage else {
        return;
    };
    let has_filters = member.filters.as_ref().is_some_and(|f| !f.is_empty());
    let calculated = member.member_type().map_or(true, is_calculated_type);
    if !owned && !has_filters && calculated {
        member.alias_member = usage.single_member_path;
    }
}
