//! View composition.
//!
//! Each `cubes` entry of a view names a join path and the members to pull in
//! from the cube at its end:
//!
//! ```text
//! cubes:
//!   - joinPath: Orders.Users      -> members of Users, reached via Orders
//!     includes: [city, {name: name, alias: user_name}]
//!     prefix: true                -> Users_city
//!     split: true                 -> into a synthetic view `<view>_Users`
//! ```
//!
//! Every generated member is a reference to the source member along the join
//! path (`{Orders.Users.city}`), so the view's SQL and its join hints come
//! from ordinary reference resolution. The legacy `includes`/`excludes` lists
//! of flat member paths are applied afterwards with lower priority.

use crate::model::{
    CubeDefinition, HierarchyDefinition, IncludeItem, IncludedMember, Includes, MemberDefinition,
    MemberKind, RefPath, SqlExpr, SqlSnippet, ViewCubeDefinition, to_member_data_type,
};
use crate::semantic::error::ErrorReporter;

use super::resolution::CURRENT_CUBE;
use super::CubeSymbols;

/// A member selected for inclusion from a source cube.
struct Selection<'a> {
    kind: MemberKind,
    name: String,
    item: Option<&'a IncludeItem>,
}

impl CubeSymbols {
    /// Compose `view`; returns the view and the split views it produced.
    pub(super) fn compose_view(
        &self,
        mut view: CubeDefinition,
        reporter: &mut ErrorReporter<'_>,
    ) -> (CubeDefinition, Vec<CubeDefinition>) {
        let mut splits: Vec<CubeDefinition> = Vec::new();
        let entries = std::mem::take(&mut view.cubes);

        for entry in &entries {
            let Some(join_path) = &entry.join_path else {
                continue;
            };

            if let Some(missing) = join_path.segments().iter().find(|s| !self.is_cube(s)) {
                reporter.error(format!(
                    "{} cannot be resolved. There's no such member or cube.",
                    missing
                ));
                continue;
            }

            let cube_name = join_path.last();
            // Not built: invalid, or a view composed later in this pass.
            let Some(source) = self.cube(cube_name) else {
                continue;
            };
            let cube_alias = entry.alias.clone().unwrap_or_else(|| cube_name.to_string());

            let selections = select_members(&view.name, source, entry, reporter);

            let target = if entry.split.unwrap_or(false) {
                let split_name = format!("{}_{}", view.name, cube_alias);
                match splits.iter().position(|s| s.name == split_name) {
                    Some(i) => &mut splits[i],
                    None => {
                        let mut split = CubeDefinition::view(split_name);
                        split.file_name = view.file_name.clone();
                        split.is_split_view = true;
                        splits.push(split);
                        let last = splits.len() - 1;
                        &mut splits[last]
                    }
                }
            } else {
                &mut view
            };

            for selection in selections {
                let name = match selection.item.and_then(IncludeItem::alias) {
                    Some(alias) => alias.to_string(),
                    None if entry.prefix.unwrap_or(false) => {
                        format!("{}_{}", cube_alias, selection.name)
                    }
                    None => selection.name.clone(),
                };

                if target.has_member(&name) {
                    reporter.error(format!(
                        "Included member '{}' conflicts with existing member of '{}'. \
                         Please consider excluding this member or assigning it an alias.",
                        name, target.name
                    ));
                    continue;
                }

                add_member(target, source, join_path, &selection, name);
            }
        }

        view.cubes = entries;
        self.apply_legacy_includes(&mut view, reporter);
        (view, splits)
    }

    /// Flat `includes: [Cube.member, Cube]` paths.
    fn apply_legacy_includes(&self, view: &mut CubeDefinition, reporter: &mut ErrorReporter<'_>) {
        let Some(includes) = view.includes.clone() else {
            return;
        };
        let excludes = view.excludes.clone().unwrap_or_default();

        for path in &includes {
            let mut targets: Vec<(RefPath, String, MemberKind)> = Vec::new();

            if path.len() == 1 && self.is_cube(path.head()) {
                let Some(source) = self.cube(path.head()) else {
                    continue;
                };
                for kind in MemberKind::MEMBERS {
                    if let Some(members) = source.members(kind) {
                        for name in members.keys() {
                            targets.push((path.clone(), name.clone(), kind));
                        }
                    }
                }
            } else if path.is_dotted() {
                let segments = path.segments();
                let join_path = RefPath::new(segments[..segments.len() - 1].iter().cloned());
                match self.member(join_path.last(), path.last()) {
                    Some((kind, _)) => {
                        targets.push((join_path, path.last().to_string(), kind));
                    }
                    None => {
                        reporter.error(format!(
                            "Member '{}' is included in '{}' but not defined in any cube",
                            path, view.name
                        ));
                        continue;
                    }
                }
            } else {
                reporter.error(format!(
                    "Member '{}' is included in '{}' but not defined in any cube",
                    path, view.name
                ));
                continue;
            }

            for (join_path, name, kind) in targets {
                let full = join_path.child(name.clone());
                let excluded = excludes
                    .iter()
                    .any(|e| *e == full || (e.len() == 1 && e.head() == name));
                if excluded || view.has_member(&name) {
                    continue;
                }
                let Some(source) = self.cube(join_path.last()) else {
                    continue;
                };
                let selection = Selection {
                    kind,
                    name: name.clone(),
                    item: None,
                };
                add_member(view, source, &join_path, &selection, name);
            }
        }
    }
}

/// Members of `source` an entry selects, minus its excludes.
fn select_members<'a>(
    view_name: &str,
    source: &CubeDefinition,
    entry: &'a ViewCubeDefinition,
    reporter: &mut ErrorReporter<'_>,
) -> Vec<Selection<'a>> {
    let mut selections: Vec<Selection<'a>> = Vec::new();

    match &entry.includes {
        Some(includes) if includes.is_wildcard() => {
            for name in source.hierarchies.keys() {
                selections.push(Selection {
                    kind: MemberKind::Hierarchy,
                    name: name.clone(),
                    item: None,
                });
            }
            for kind in MemberKind::MEMBERS {
                if let Some(members) = source.members(kind) {
                    for name in members.keys() {
                        selections.push(Selection {
                            kind,
                            name: name.clone(),
                            item: None,
                        });
                    }
                }
            }
        }
        Some(Includes::Members(items)) => {
            for item in items {
                let name = item.name();
                if name.contains('.') {
                    reporter.error(format!(
                        "Paths aren't allowed in cube includes but '{}' provided as include member",
                        name
                    ));
                    continue;
                }
                let kind = if source.hierarchies.contains_key(name) {
                    Some(MemberKind::Hierarchy)
                } else {
                    source.member(name).map(|(kind, _)| kind)
                };
                match kind {
                    Some(kind) => selections.push(Selection {
                        kind,
                        name: name.to_string(),
                        item: Some(item),
                    }),
                    None => reporter.error(format!(
                        "Member '{}.{}' is included in '{}' but not defined in any cube",
                        source.name, name, view_name
                    )),
                }
            }
        }
        // Non-wildcard strings are reported by the validator.
        Some(Includes::All(_)) | None => {}
    }

    let excludes = entry.excludes.as_deref().unwrap_or_default();
    for name in excludes {
        if name.contains('.') {
            reporter.error(format!(
                "Paths aren't allowed in cube excludes but '{}' provided as exclude member",
                name
            ));
        }
    }
    selections.retain(|s| !excludes.contains(&s.name));

    // Hierarchy levels come along with their hierarchy.
    let mut levels: Vec<Selection<'a>> = Vec::new();
    for selection in &selections {
        if selection.kind != MemberKind::Hierarchy {
            continue;
        }
        let Some(hierarchy) = source.hierarchies.get(&selection.name) else {
            continue;
        };
        for level in &hierarchy.levels {
            let own_level = !level.is_dotted() || level.segments()[level.len() - 2] == source.name;
            let name = level.last().to_string();
            if own_level
                && source.dimensions.contains_key(&name)
                && !excludes.contains(&name)
                && !selections.iter().any(|s| s.name == name)
                && !levels.iter().any(|s| s.name == name)
            {
                levels.push(Selection {
                    kind: MemberKind::Dimension,
                    name,
                    item: None,
                });
            }
        }
    }
    selections.extend(levels);

    selections
}

/// Re-root a coordinate snippet of `source` onto `join_path`.
///
/// `{CUBE}` and sibling member references become paths through the view's
/// join path; anything else already names its cube.
fn rebase_snippet(snippet: &SqlSnippet, source: &CubeDefinition, join_path: &RefPath) -> SqlSnippet {
    let rebase = |path: &RefPath| {
        let head = path.head();
        let rest = if CURRENT_CUBE.contains(&head) {
            &path.segments()[1..]
        } else if source.member(head).is_some() {
            path.segments()
        } else {
            return path.clone();
        };
        rest.iter().fold(join_path.clone(), |acc, segment| acc.child(segment.clone()))
    };
    SqlSnippet {
        sql: snippet.sql.as_ref().map(|sql| sql.map_references(rebase)),
    }
}

/// Add the member `selection` of `source` to `target` under `name`.
fn add_member(
    target: &mut CubeDefinition,
    source: &CubeDefinition,
    join_path: &RefPath,
    selection: &Selection<'_>,
    name: String,
) {
    let member_path = format!("{}.{}", source.name, selection.name);
    let detail = selection.item.and_then(IncludeItem::detail);

    if selection.kind == MemberKind::Hierarchy {
        let Some(original) = source.hierarchies.get(&selection.name) else {
            return;
        };
        let levels = original
            .levels
            .iter()
            .map(|level| RefPath::new([source.name.clone(), level.last().to_string()]))
            .collect();
        target.hierarchies.insert(
            name.clone(),
            HierarchyDefinition {
                title: detail.and_then(|d| d.title.clone()).or_else(|| original.title.clone()),
                levels,
                public: original.public,
            },
        );
    } else {
        let Some((_, original)) = source.member(&selection.name) else {
            return;
        };
        let mut member = MemberDefinition {
            sql: Some(SqlExpr::reference(&join_path.child(selection.name.clone()))),
            title: detail.and_then(|d| d.title.clone()).or_else(|| original.title.clone()),
            description: detail
                .and_then(|d| d.description.clone())
                .or_else(|| original.description.clone()),
            format: detail.and_then(|d| d.format.clone()).or_else(|| original.format.clone()),
            meta: detail.and_then(|d| d.meta.clone()).or_else(|| original.meta.clone()),
            public: original.public,
            shown: original.shown,
            ..Default::default()
        };
        match selection.kind {
            MemberKind::Measure => {
                member.member_type = original
                    .member_type()
                    .map(|t| to_member_data_type(t).to_string());
                member.agg_type = original.member_type.clone();
            }
            MemberKind::Dimension => {
                member.member_type = original.member_type.clone();
                member.granularities = original.granularities.clone();
                if original.member_type.as_deref() == Some("geo") {
                    member.sql = None;
                    member.latitude = original.latitude.as_ref().map(|s| rebase_snippet(s, source, join_path));
                    member.longitude = original.longitude.as_ref().map(|s| rebase_snippet(s, source, join_path));
                }
            }
            MemberKind::Segment | MemberKind::Hierarchy => {
                member.format = None;
            }
        }
        if let Some(members) = target.members_mut(selection.kind) {
            members.insert(name.clone(), member);
        }
    }

    target.included_members.push(IncludedMember {
        member_path,
        name,
        kind: selection.kind,
    });
}
