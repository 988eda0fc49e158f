//! Hierarchy levels and folder members.

use crate::model::{CubeDefinition, EvaluatedFolder, EvaluatedHierarchy, Includes, MemberKind};
use crate::semantic::error::ErrorReporter;
use crate::semantic::symbols::{CubeSymbols, ResolvedReference};

/// Resolve hierarchy levels to `Cube.dimension` paths.
///
/// Levels of a cube hierarchy must be dimensions. Levels of a view hierarchy
/// point at source cube dimensions and are mapped to the view's own members;
/// levels the view does not include are dropped.
pub(super) fn evaluate_hierarchies(
    symbols: &CubeSymbols,
    cube: &mut CubeDefinition,
    reporter: &mut ErrorReporter<'_>,
) {
    let mut evaluated = Vec::with_capacity(cube.hierarchies.len());

    for (name, hierarchy) in &cube.hierarchies {
        let mut levels = Vec::with_capacity(hierarchy.levels.len());
        let mut alias_member = None;

        if cube.is_view {
            for level in &hierarchy.levels {
                let source_path = level.to_string();
                let included = cube.included_members.iter().find(|m| {
                    m.kind == MemberKind::Dimension && m.member_path == source_path
                });
                match included {
                    Some(member) => levels.push(format!("{}.{}", cube.name, member.name)),
                    None if !level.is_dotted() && cube.dimensions.contains_key(level.head()) => {
                        levels.push(format!("{}.{}", cube.name, level.head()));
                    }
                    None => {}
                }
            }
            alias_member = cube
                .included_members
                .iter()
                .find(|m| m.kind == MemberKind::Hierarchy && m.name == *name)
                .map(|m| m.member_path.clone());
        } else {
            for level in &hierarchy.levels {
                match symbols.resolve_reference(&cube.name, level) {
                    Ok(ResolvedReference::Member {
                        cube: level_cube,
                        member,
                        kind: MemberKind::Dimension,
                        ..
                    }) => levels.push(format!("{}.{}", level_cube, member)),
                    Ok(_) => reporter.error(format!(
                        "Only dimensions can be part of a hierarchy. Please remove the '{}' member from the '{}' hierarchy.",
                        level, name
                    )),
                    Err(err) => reporter.report(&err),
                }
            }
        }

        evaluated.push(EvaluatedHierarchy {
            name: name.clone(),
            title: hierarchy.title.clone(),
            levels,
            alias_member,
            public: hierarchy.public,
        });
    }

    cube.evaluated_hierarchies = evaluated;
}

/// Resolve folder includes to `View.member` paths.
pub(super) fn evaluate_folders(cube: &mut CubeDefinition, reporter: &mut ErrorReporter<'_>) {
    let mut evaluated = Vec::with_capacity(cube.folders.len());

    for folder in &cube.folders {
        let members = match &folder.includes {
            Includes::All(_) => MemberKind::MEMBERS
                .into_iter()
                .filter_map(|kind| cube.members(kind))
                .flat_map(|members| members.keys())
                .map(|name| format!("{}.{}", cube.name, name))
                .collect(),
            Includes::Members(items) => {
                let mut members = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.name();
                    if cube.has_member(name) {
                        members.push(format!("{}.{}", cube.name, name));
                    } else {
                        reporter.error(format!(
                            "Member '{}' included in folder '{}' not found",
                            name, folder.name
                        ));
                    }
                }
                members
            }
        };
        evaluated.push(EvaluatedFolder {
            name: folder.name.clone(),
            members,
        });
    }

    cube.evaluated_folders = evaluated;
}
