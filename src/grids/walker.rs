use std::collections::{BTreeSet, HashSet};

use log::{debug, trace};

use crate::graph::{ChannelMetadata, NodeGraph, NodeId, ParamType};

use super::expand::expand_links;

/// Result of one shading-network walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridDiscovery {
    /// Distinct, non-empty channel names read from `volume_sample` parameters.
    pub grids: BTreeSet<String>,
    /// Nodes in the order they were processed. Each node appears once.
    pub visited: Vec<NodeId>,
}

/// Walks every node reachable from `root` through parameter links and collects
/// the channel names referenced by flagged string parameters.
///
/// Traversal is depth-first over an explicit stack, so deep networks never grow
/// the call stack. String parameters are never followed as links; every other
/// parameter is probed through its base name and its components. Absent links,
/// unknown nodes and unset values contribute nothing.
pub fn walk_shading_network<G: NodeGraph + ?Sized>(
    graph: &G,
    metadata: &ChannelMetadata,
    root: Option<NodeId>,
) -> GridDiscovery {
    let mut out = GridDiscovery::default();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = root.into_iter().collect();

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        out.visited.push(node);

        let node_type = graph.node_type(node).unwrap_or_default();
        trace!("[grids] visiting {node} ({node_type})");

        let mut linked: Vec<NodeId> = Vec::new();
        for param in graph.parameters(node) {
            if param.ty == ParamType::String {
                if !metadata.is_flagged(node_type, &param.name) {
                    continue;
                }
                match graph.string_value(node, &param.name) {
                    Some(channel) if !channel.is_empty() => {
                        if out.grids.insert(channel.to_string()) {
                            debug!("[grids] {node} ({node_type}).{} samples {channel:?}", param.name);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            for (query, target) in expand_links(graph, node, &param.name, param.ty) {
                let Some(target) = target else {
                    continue;
                };
                trace!("[grids] {node}.{query} -> {target}");
                linked.push(target);
            }
        }

        // Reverse so the first declared link is processed next, matching a recursive walk.
        stack.extend(linked.into_iter().rev().filter(|n| !visited.contains(n)));
    }

    out
}

/// Channel names referenced anywhere in the network under `root`.
///
/// A `None` root yields the empty set.
pub fn discover_grids<G: NodeGraph + ?Sized>(
    graph: &G,
    metadata: &ChannelMetadata,
    root: Option<NodeId>,
) -> BTreeSet<String> {
    walk_shading_network(graph, metadata, root).grids
}
