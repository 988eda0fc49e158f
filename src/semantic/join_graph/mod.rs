//! JoinGraph - joins between evaluated cubes, for join tree construction.
//!
//! Every valid join declared on a cube becomes a directed edge
//! `cube -> target` carrying its [`JoinDefinition`]. Path finding walks the
//! undirected projection of those edges, so a cube can be reached against the
//! declared direction; [`JoinEdge::original_from`] and
//! [`JoinEdge::original_to`] keep the declared direction for fan-out checks.
//!
//! The module is organized into submodules:
//! - `path`: shortest paths between two cubes (BFS)

mod path;


use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::cache::compute_hash;
use crate::model::{CubeDefinition, JoinDefinition, Relationship};
use crate::semantic::error::{CompilerError, CompilerResult, ErrorReporter};
use crate::semantic::evaluator::CubeEvaluator;

/// Measure types that fan out when a join multiplies rows.
const MULTIPLIED_MEASURE_TYPES: &[&str] = &["sum", "avg", "count", "number"];

/// A cube that must take part in a join, or the path to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinHint {
    Cube(String),
    /// `[A, B, C]`: reach `C` through `B` starting from `A`.
    Path(Vec<String>),
}

impl JoinHint {
    /// Parse `A` or `A.B.C`.
    pub fn parse(raw: &str) -> Self {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        Self::from(segments)
    }

    /// The cube the hint ends at.
    pub fn cube(&self) -> &str {
        match self {
            JoinHint::Cube(cube) => cube,
            JoinHint::Path(path) => path.last().map(String::as_str).unwrap_or_default(),
        }
    }

    fn cubes(&self) -> &[String] {
        match self {
            JoinHint::Cube(cube) => std::slice::from_ref(cube),
            JoinHint::Path(path) => path,
        }
    }
}

impl From<&str> for JoinHint {
    fn from(cube: &str) -> Self {
        JoinHint::Cube(cube.to_string())
    }
}

impl From<Vec<String>> for JoinHint {
    fn from(mut path: Vec<String>) -> Self {
        if path.len() == 1 {
            JoinHint::Cube(path.remove(0))
        } else {
            JoinHint::Path(path)
        }
    }
}

impl fmt::Display for JoinHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cubes().join("."))
    }
}

/// One join of a join tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEdge {
    /// Traversal direction.
    pub from: String,
    pub to: String,
    /// Declared direction.
    pub original_from: String,
    pub original_to: String,
    pub join: JoinDefinition,
}

impl JoinEdge {
    /// `original_from-original_to`
    pub fn key(&self) -> String {
        format!("{}-{}", self.original_from, self.original_to)
    }

    fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            original_from: self.original_from.clone(),
            original_to: self.original_to.clone(),
            join: self.join.clone(),
        }
    }

    fn relationship(&self) -> Option<Relationship> {
        self.join.relationship_kind()
    }
}

/// Joins connecting a set of cubes, rooted at one of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTree {
    pub root: String,
    pub joins: Vec<JoinEdge>,
    /// Per requested cube: does this join shape multiply its rows?
    pub multiplication_factor: BTreeMap<String, bool>,
}

/// Graph of joins between valid cubes.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    graph: DiGraph<String, JoinEdge>,
    node_indices: HashMap<String, NodeIndex>,
    built_joins: RefCell<HashMap<String, JoinTree>>,
    connected_components: OnceCell<HashMap<String, usize>>,
}

impl JoinGraph {
    /// Build the graph from the joins of every evaluated cube.
    ///
    /// Joins to unknown cubes and joins where a side has multiplied measures
    /// but no primary key are reported and left out.
    pub fn new(evaluator: &CubeEvaluator, reporter: &mut ErrorReporter<'_>) -> Self {
        let mut graph = Self::default();

        for cube in evaluator.cubes() {
            graph.add_node(&cube.name);
        }

        for cube in evaluator.cubes() {
            if cube.joins.is_empty() {
                continue;
            }
            let mut file_reporter = reporter.in_file(cube.file_name.clone());
            let mut cube_reporter = file_reporter.in_context(format!("{} cube", cube.name));

            for join in &cube.joins {
                if !graph.accepts_join(evaluator, cube, join, &mut cube_reporter) {
                    continue;
                }
                let from = graph.node_indices[&cube.name];
                let to = graph.node_indices[&join.name];
                graph.graph.add_edge(
                    from,
                    to,
                    JoinEdge {
                        from: cube.name.clone(),
                        to: join.name.clone(),
                        original_from: cube.name.clone(),
                        original_to: join.name.clone(),
                        join: join.clone(),
                    },
                );
            }
        }

        tracing::debug!(
            cubes = graph.graph.node_count(),
            joins = graph.graph.edge_count(),
            "built join graph"
        );
        graph
    }

    fn add_node(&mut self, name: &str) {
        if !self.node_indices.contains_key(name) {
            let idx = self.graph.add_node(name.to_string());
            self.node_indices.insert(name.to_string(), idx);
        }
    }

    fn accepts_join(
        &self,
        evaluator: &CubeEvaluator,
        cube: &CubeDefinition,
        join: &JoinDefinition,
        reporter: &mut ErrorReporter<'_>,
    ) -> bool {
        let Some(target) = evaluator.cube(&join.name) else {
            reporter.error(format!("Cube {} doesn't exist", join.name));
            return false;
        };

        for side in [cube, target] {
            if has_multiplied_measures(side) && evaluator.primary_keys(&side.name).is_empty() {
                reporter.error(format!(
                    "primary key for '{}' is required when join is defined in order to make aggregates work properly",
                    side.name
                ));
                return false;
            }
        }
        true
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Declared joins in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &JoinEdge> {
        self.graph.edge_weights()
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.node_indices.get(from), self.node_indices.get(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(*a, *b),
            _ => false,
        }
    }

    /// Build the join tree connecting every hinted cube.
    ///
    /// Each hint is tried as the root; the tree with the fewest joins wins,
    /// the earliest root on ties. Results are memoized per hint list.
    pub fn build_join(&self, hints: &[JoinHint]) -> CompilerResult<Option<JoinTree>> {
        if hints.is_empty() {
            return Ok(None);
        }

        let key = compute_hash(&hints)?;
        if let Some(tree) = self.built_joins.borrow().get(&key) {
            tracing::debug!(root = %tree.root, "join tree memo hit");
            return Ok(Some(tree.clone()));
        }

        let mut best: Option<(String, Vec<JoinEdge>)> = None;
        for (i, root) in hints.iter().enumerate() {
            let others: Vec<&JoinHint> = hints
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, hint)| hint)
                .collect();
            if let Some((root, joins)) = self.build_tree_for_root(root, &others) {
                if best.as_ref().map_or(true, |(_, b)| joins.len() < b.len()) {
                    best = Some((root, joins));
                }
            }
        }

        let Some((root, joins)) = best else {
            let cubes: Vec<String> = hints.iter().map(|h| format!("'{}'", h)).collect();
            return Err(CompilerError::user(format!(
                "Can't find join path to join {}",
                cubes.join(", ")
            )));
        };

        let multiplication_factor = hints
            .iter()
            .map(|hint| {
                let cube = hint.cube().to_string();
                let multiplied = find_multiplication_factor(&cube, &joins);
                (cube, multiplied)
            })
            .collect();

        let tree = JoinTree {
            root,
            joins,
            multiplication_factor,
        };
        tracing::debug!(root = %tree.root, joins = tree.joins.len(), "join tree memo miss");
        self.built_joins.borrow_mut().insert(key, tree.clone());
        Ok(Some(tree))
    }

    fn build_tree_for_root(&self, root: &JoinHint, others: &[&JoinHint]) -> Option<(String, Vec<JoinEdge>)> {
        let (root, rest) = root.cubes().split_first()?;

        let mut sequences: Vec<&[String]> = Vec::with_capacity(others.len() + 1);
        if !rest.is_empty() {
            sequences.push(rest);
        }
        sequences.extend(others.iter().map(|hint| hint.cubes()));

        let mut joined: HashSet<&str> = HashSet::from([root.as_str()]);
        let mut seen: HashSet<String> = HashSet::new();
        let mut joins = Vec::new();

        for sequence in sequences {
            let mut prev = root.as_str();
            for cube in sequence {
                if cube == prev {
                    continue;
                }
                if joined.contains(cube.as_str()) {
                    prev = cube.as_str();
                    continue;
                }
                let path = self.find_path(prev, cube)?;
                for edge in path {
                    if seen.insert(edge.key()) {
                        joins.push(edge);
                    }
                }
                joined.insert(cube.as_str());
                prev = cube.as_str();
            }
        }

        Some((root.clone(), joins))
    }

    /// Component id per cube that takes part in at least one join.
    ///
    /// Ids start at 1 and follow cube registration order.
    pub fn connected_components(&self) -> &HashMap<String, usize> {
        self.connected_components.get_or_init(|| {
            let mut components = HashMap::new();
            let mut next_id = 1;

            for start in self.graph.node_indices() {
                if components.contains_key(&self.graph[start])
                    || self.graph.neighbors_undirected(start).next().is_none()
                {
                    continue;
                }
                let mut stack = vec![start];
                while let Some(node) = stack.pop() {
                    if components.contains_key(&self.graph[node]) {
                        continue;
                    }
                    components.insert(self.graph[node].clone(), next_id);
                    stack.extend(self.graph.neighbors_undirected(node));
                }
                next_id += 1;
            }
            components
        })
    }

    pub fn connected_component(&self, cube: &str) -> Option<usize> {
        self.connected_components().get(cube).copied()
    }
}

/// Does `cube` have a measure whose value changes when rows are duplicated?
fn has_multiplied_measures(cube: &CubeDefinition) -> bool {
    cube.measures.values().any(|measure| {
        measure
            .member_type()
            .is_some_and(|t| MULTIPLIED_MEASURE_TYPES.contains(&t))
            || measure.sql.as_ref().is_some_and(|sql| sql.is_count_star())
    })
}

/// Walk the tree outward from `cube`; it is multiplied if some join reachable
/// before revisiting a cube fans its rows out.
fn find_multiplication_factor(cube: &str, joins: &[JoinEdge]) -> bool {
    fn walk<'a>(current: &'a str, joins: &'a [JoinEdge], visited: &mut HashSet<&'a str>) -> bool {
        if !visited.insert(current) {
            return false;
        }
        let next_node = |edge: &'a JoinEdge| -> &'a str {
            if edge.from == current {
                &edge.to
            } else {
                &edge.from
            }
        };
        let adjacent: Vec<&JoinEdge> = joins
            .iter()
            .filter(|edge| edge.from == current || edge.to == current)
            .collect();

        if adjacent
            .iter()
            .any(|edge| multiplies(current, edge) && !visited.contains(next_node(*edge)))
        {
            return true;
        }
        adjacent.into_iter().any(|edge| walk(next_node(edge), joins, visited))
    }

    walk(cube, joins, &mut HashSet::new())
}

/// Does `edge` fan out the rows of `cube`?
///
/// The marked cube is the "one" side, whose rows repeat once per matching
/// row on the "many" side and whose measures therefore need de-duplication.
/// For `Orders hasMany LineItems` that is `Orders`, not `LineItems`; for
/// `Orders belongsTo Users` it is `Users`, not `Orders`.
fn multiplies(cube: &str, edge: &JoinEdge) -> bool {
    match edge.relationship() {
        Some(Relationship::HasMany) => edge.original_from == cube,
        Some(Relationship::BelongsTo) => edge.original_to == cube,
        _ => false,
    }
}
