//! Symbol table for cubes and views.
//!
//! The table is filled in phases:
//!
//! ```text
//! register_names   name + file of every cube and view
//!       |
//! compile          definitions stored, cubes built (extends merged),
//!       |          views composed from the cubes built so far
//!       |
//! compile_views    views composed again with every view available
//! ```
//!
//! A built cube is a plain [`CubeDefinition`] with inherited members merged in
//! and, for views, the members generated by composition. References inside
//! expressions are resolved against the built cubes (see `resolution`).
//!
//! The module is organized into submodules:
//! - `inheritance`: `extends` chains with cycle detection
//! - `resolution`: reference resolution, SQL rendering and static analysis
//! - `views`: view composition (`cubes`, legacy `includes`/`excludes`, split views)

mod inheritance;
mod resolution;
mod views;


use std::collections::HashMap;

use crate::model::{CubeDefinition, MemberDefinition, MemberKind};

use super::error::ErrorReporter;

pub use resolution::{
    join_hint_from_path, ContextSymbol, InlineSqlResolver, MemberReference, ReferenceUsage,
    ResolvedReference, SqlResolver,
};

/// Symbol objects for every cube and view of a project.
#[derive(Debug, Clone, Default)]
pub struct CubeSymbols {
    /// Registration order of cube and view names.
    order: Vec<String>,
    /// Source file per registered name.
    file_names: HashMap<String, String>,
    /// Definitions as handed over by the parser.
    definitions: HashMap<String, CubeDefinition>,
    /// Built symbol objects.
    built: HashMap<String, CubeDefinition>,
    /// Synthetic split views: (parent view, split view name).
    split_views: Vec<(String, String)>,
}

impl CubeSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// Register names and source files only.
    ///
    /// Expressions may reference cubes whose definitions have not been
    /// processed yet, so every name has to be known up front.
    pub fn register_names(&mut self, cubes: &[CubeDefinition]) {
        for cube in cubes {
            if !self.file_names.contains_key(&cube.name) {
                self.order.push(cube.name.clone());
            }
            self.file_names
                .insert(cube.name.clone(), cube.file_name.clone());
        }
        tracing::debug!(names = self.order.len(), "registered cube names");
    }

    /// Store definitions, build every cube, then compose views.
    pub fn compile(&mut self, cubes: &[CubeDefinition], reporter: &mut ErrorReporter<'_>) {
        self.register_names(cubes);
        for cube in cubes {
            self.definitions.insert(cube.name.clone(), cube.clone());
        }

        let mut memo = HashMap::new();
        for name in self.order.clone() {
            let Some(definition) = self.definitions.get(&name) else {
                continue;
            };
            if definition.is_view {
                continue;
            }
            let mut file_reporter = reporter.in_file(definition.file_name.clone());
            let mut cube_reporter = file_reporter.in_context(format!("{} cube", name));

            match inheritance::resolve_extends(&self.definitions, &name, &mut memo, &mut Vec::new()) {
                Ok(cube) => {
                    self.built.insert(name, cube);
                }
                Err(err) => cube_reporter.report(&err),
            }
        }

        self.compile_views(reporter);
    }

    /// Compose every view from the cubes and views built so far.
    ///
    /// Composition always starts from the view's definition, so running it
    /// again yields the same members; views composed from other views pick up
    /// their sources' members on the second run.
    pub fn compile_views(&mut self, reporter: &mut ErrorReporter<'_>) {
        let mut memo = HashMap::new();
        let mut composed = 0;

        for name in self.order.clone() {
            let Some(definition) = self.definitions.get(&name) else {
                continue;
            };
            if !definition.is_view {
                continue;
            }
            let mut file_reporter = reporter.in_file(definition.file_name.clone());
            let mut view_reporter = file_reporter.in_context(format!("{} view", name));

            let view = match inheritance::resolve_extends(
                &self.definitions,
                &name,
                &mut memo,
                &mut Vec::new(),
            ) {
                Ok(view) => view,
                Err(err) => {
                    view_reporter.report(&err);
                    continue;
                }
            };

            let (view, splits) = self.compose_view(view, &mut view_reporter);
            self.replace_split_views(&name, splits);
            self.built.insert(name, view);
            composed += 1;
        }

        tracing::debug!(views = composed, splits = self.split_views.len(), "composed views");
    }

    fn replace_split_views(&mut self, parent: &str, splits: Vec<CubeDefinition>) {
        let built = &mut self.built;
        self.split_views.retain(|(owner, split)| {
            if owner == parent {
                built.remove(split);
                false
            } else {
                true
            }
        });
        for split in splits {
            self.split_views.push((parent.to_string(), split.name.clone()));
            self.built.insert(split.name.clone(), split);
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Built symbol object of a cube or view.
    pub fn cube(&self, name: &str) -> Option<&CubeDefinition> {
        self.built.get(name)
    }

    /// Definition as registered, before inheritance and composition.
    pub fn definition(&self, name: &str) -> Option<&CubeDefinition> {
        self.definitions.get(name)
    }

    /// Is `name` a registered cube, view or split view?
    pub fn is_cube(&self, name: &str) -> bool {
        self.file_names.contains_key(name) || self.built.contains_key(name)
    }

    /// Source file of a registered cube.
    pub fn file_name(&self, name: &str) -> Option<&str> {
        self.file_names
            .get(name)
            .map(String::as_str)
            .or_else(|| self.built.get(name).map(|c| c.file_name.as_str()))
    }

    /// Built cubes in registration order, split views after their parent.
    pub fn cube_list(&self) -> Vec<&CubeDefinition> {
        let mut list = Vec::with_capacity(self.built.len());
        for name in &self.order {
            if let Some(cube) = self.built.get(name) {
                list.push(cube);
            }
            for (parent, split) in &self.split_views {
                if parent == name {
                    if let Some(cube) = self.built.get(split) {
                        list.push(cube);
                    }
                }
            }
        }
        list
    }

    /// Registered names in order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// A member of a built cube, falling back to the raw definition.
    pub fn member(&self, cube: &str, member: &str) -> Option<(MemberKind, &MemberDefinition)> {
        self.built
            .get(cube)
            .or_else(|| self.definitions.get(cube))
            .and_then(|c| c.member(member))
    }
}
