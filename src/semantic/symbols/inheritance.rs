//! `extends` chains.
//!
//! A child cube sees every member, join, pre-aggregation and policy of its
//! parent; its own definitions win on name clashes. Chains are resolved
//! depth-first with a resolving stack so cycles surface as errors instead of
//! recursing forever.

use std::collections::HashMap;

use crate::model::{CubeDefinition, MemberKind};
use crate::semantic::error::{CompilerError, CompilerResult};

/// Resolve `name` with its whole `extends` chain merged in.
///
/// `memo` holds already-merged cubes; `resolving` is the chain currently on
/// the stack.
pub(super) fn resolve_extends(
    definitions: &HashMap<String, CubeDefinition>,
    name: &str,
    memo: &mut HashMap<String, CubeDefinition>,
    resolving: &mut Vec<String>,
) -> CompilerResult<CubeDefinition> {
    if let Some(done) = memo.get(name) {
        return Ok(done.clone());
    }

    if let Some(start) = resolving.iter().position(|n| n == name) {
        let mut chain: Vec<&str> = resolving[start..].iter().map(String::as_str).collect();
        chain.push(name);
        return Err(CompilerError::user(format!(
            "Cube '{}' has cyclic extends: {}",
            chain[0],
            chain.join(" -> ")
        )));
    }

    let child = definitions
        .get(name)
        .ok_or_else(|| CompilerError::internal(format!("Cube '{}' is not registered", name)))?;

    let Some(parent_name) = child.extends.as_deref() else {
        memo.insert(name.to_string(), child.clone());
        return Ok(child.clone());
    };

    if !definitions.contains_key(parent_name) {
        return Err(CompilerError::user(format!(
            "Cube '{}' extends '{}' which doesn't exist",
            name, parent_name
        )));
    }

    resolving.push(name.to_string());
    let parent = resolve_extends(definitions, parent_name, memo, resolving);
    resolving.pop();

    let merged = merge(&parent?, child);
    memo.insert(name.to_string(), merged.clone());
    Ok(merged)
}

/// `child` layered over `parent`.
fn merge(parent: &CubeDefinition, child: &CubeDefinition) -> CubeDefinition {
    let mut merged = child.clone();

    for kind in MemberKind::MEMBERS {
        if let (Some(inherited), Some(target)) = (parent.members(kind), merged.members_mut(kind)) {
            for (name, member) in inherited {
                target.entry(name.clone()).or_insert_with(|| member.clone());
            }
        }
    }

    // `sql` and `sqlTable` are alternatives: a child defining either hides both.
    if child.sql.is_none() && child.sql_table.is_none() {
        merged.sql = parent.sql.clone();
        merged.sql_table = parent.sql_table.clone();
    }

    merged.data_source = child.data_source.clone().or_else(|| parent.data_source.clone());
    merged.title = child.title.clone().or_else(|| parent.title.clone());
    merged.description = child.description.clone().or_else(|| parent.description.clone());
    merged.public = child.public.or(parent.public);
    merged.shown = child.shown.or(parent.shown);
    merged.meta = child.meta.clone().or_else(|| parent.meta.clone());
    merged.refresh_key = child.refresh_key.clone().or_else(|| parent.refresh_key.clone());

    // Parent joins keep their position; a child join to the same target replaces it.
    let mut joins = Vec::with_capacity(parent.joins.len() + child.joins.len());
    for join in &parent.joins {
        let replacement = child.joins.iter().find(|j| j.name == join.name);
        joins.push(replacement.unwrap_or(join).clone());
    }
    for join in &child.joins {
        if !parent.joins.iter().any(|j| j.name == join.name) {
            joins.push(join.clone());
        }
    }
    merged.joins = joins;

    for (name, pre_aggregation) in &parent.pre_aggregations {
        merged
            .pre_aggregations
            .entry(name.clone())
            .or_insert_with(|| pre_aggregation.clone());
    }
    for (name, hierarchy) in &parent.hierarchies {
        merged
            .hierarchies
            .entry(name.clone())
            .or_insert_with(|| hierarchy.clone());
    }

    merged.folders = parent.folders.iter().chain(&child.folders).cloned().collect();
    merged.access_policy = parent
        .access_policy
        .iter()
        .chain(&child.access_policy)
        .cloned()
        .collect();

    merged.cubes = parent.cubes.iter().chain(&child.cubes).cloned().collect();
    merged.includes = child.includes.clone().or_else(|| parent.includes.clone());
    merged.excludes = child.excludes.clone().or_else(|| parent.excludes.clone());

    merged
}
