//! Access policy member references.
//!
//! Member-level policies name members of the cube they sit on; row-level
//! filters name a member that must resolve to a plain `Cube.member` path.

use crate::model::{CubeDefinition, Includes, MemberKind, RowLevelFilter};
use crate::semantic::error::ErrorReporter;
use crate::semantic::symbols::CubeSymbols;

pub(super) fn evaluate_access_policies(
    symbols: &CubeSymbols,
    cube: &mut CubeDefinition,
    reporter: &mut ErrorReporter<'_>,
) {
    if cube.access_policy.is_empty() {
        return;
    }

    let mut policies = std::mem::take(&mut cube.access_policy);
    for policy in &mut policies {
        let role = policy.role.clone().unwrap_or_default();
        let mut policy_reporter = reporter.in_context(format!("{} access policy", role));

        if let Some(member_level) = &mut policy.member_level {
            member_level.includes_members =
                member_paths(cube, member_level.includes.as_ref(), &mut policy_reporter);
            member_level.excludes_members =
                member_paths(cube, member_level.excludes.as_ref(), &mut policy_reporter);
        }

        if let Some(row_level) = &mut policy.row_level {
            for filter in &mut row_level.filters {
                evaluate_filter(symbols, &cube.name, filter, &mut policy_reporter);
            }
        }
    }
    cube.access_policy = policies;
}

fn member_paths(
    cube: &CubeDefinition,
    includes: Option<&Includes>,
    reporter: &mut ErrorReporter<'_>,
) -> Vec<String> {
    match includes {
        None => Vec::new(),
        Some(Includes::All(_)) => MemberKind::MEMBERS
            .into_iter()
            .filter_map(|kind| cube.members(kind))
            .flat_map(|members| members.keys())
            .map(|name| format!("{}.{}", cube.name, name))
            .collect(),
        Some(Includes::Members(items)) => items
            .iter()
            .filter_map(|item| {
                let name = item.name();
                if cube.member(name).is_some() {
                    Some(format!("{}.{}", cube.name, name))
                } else {
                    reporter.error(format!(
                        "Member '{}' referenced in the accessPolicy of {} not found",
                        name, cube.name
                    ));
                    None
                }
            })
            .collect(),
    }
}

fn evaluate_filter(
    symbols: &CubeSymbols,
    cube: &str,
    filter: &mut RowLevelFilter,
    reporter: &mut ErrorReporter<'_>,
) {
    for group in [&mut filter.or, &mut filter.and].into_iter().flatten() {
        for nested in group {
            evaluate_filter(symbols, cube, nested, reporter);
        }
    }

    let Some(member) = &filter.member else {
        return;
    };
    match symbols.evaluate_reference(cube, member, true) {
        Ok(path) if path.split('.').count() != 2 => reporter.error(format!(
            "Paths aren't allowed in the accessPolicy policy but '{}' provided as a filter member reference for {}",
            path, cube
        )),
        Ok(path) => filter.member_reference = Some(path),
        Err(err) => reporter.report(&err),
    }
}
