//! Shortest join paths between two cubes.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::{JoinEdge, JoinGraph};

/// Parent information for path reconstruction.
struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
    /// The edge was walked against its declared direction.
    reversed: bool,
}

impl JoinGraph {
    /// Shortest path from `from` to `to`, walking joins in either direction.
    ///
    /// Declared (outgoing) joins are explored before incoming ones, so among
    /// paths of equal length the one following declared joins wins.
    /// Returns `None` when either cube is unknown or no path exists.
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<JoinEdge>> {
        if from == to {
            return Some(Vec::new());
        }
        let from_idx = *self.node_indices.get(from)?;
        let to_idx = *self.node_indices.get(to)?;

        let mut visited: HashSet<NodeIndex> = HashSet::from([from_idx]);
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([from_idx]);

        while let Some(current) = queue.pop_front() {
            let outgoing = self
                .graph
                .edges_directed(current, Direction::Outgoing)
                .map(|e| (e.target(), e.id(), false));
            let incoming = self
                .graph
                .edges_directed(current, Direction::Incoming)
                .map(|e| (e.source(), e.id(), true));

            for (neighbor, edge_idx, reversed) in outgoing.chain(incoming) {
                if !visited.insert(neighbor) {
                    continue;
                }
                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx,
                        reversed,
                    },
                );
                if neighbor == to_idx {
                    return Some(self.reconstruct_path(from_idx, to_idx, &parents));
                }
                queue.push_back(neighbor);
            }
        }

        None
    }

    /// Walk parent pointers back from `to_idx`, then reverse.
    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> Vec<JoinEdge> {
        let mut edges = Vec::new();
        let mut current = to_idx;

        while current != from_idx {
            let info = &parents[&current];
            let edge = &self.graph[info.edge_idx];
            edges.push(if info.reversed { edge.reversed() } else { edge.clone() });
            current = info.parent;
        }

        edges.reverse();
        edges
    }
}
