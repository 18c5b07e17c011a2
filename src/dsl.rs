use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::scene::SceneGraph;
use crate::schema::{self, NodeScheme};

/// A shading network as exported by the host: renderer nodes plus the links
/// between their parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShadingNetwork {
    pub version: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Metadata {
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Connection {
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Endpoint {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    /// On the source side this names an output and is informational; on the
    /// target side it is the link query (`param` or `param.component`).
    #[serde(rename = "portId", default)]
    pub port_id: String,
}

pub fn parse_network(text: &str) -> Result<ShadingNetwork> {
    serde_json::from_str(text).context("failed to parse shading network json")
}

pub fn load_network_from_path(path: impl AsRef<std::path::Path>) -> Result<ShadingNetwork> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read shading network at {}", path.display()))?;
    parse_network(&text).with_context(|| format!("invalid shading network in {}", path.display()))
}

/// Validates `network` against `scheme` and instantiates it as renderer nodes.
///
/// Node ids become node names in the returned graph.
pub fn build_scene_graph(network: &ShadingNetwork, scheme: Arc<NodeScheme>) -> Result<SceneGraph> {
    schema::validate_network_against(network, &scheme)
        .with_context(|| format!("shading network '{}' is invalid", network.metadata.name))?;

    let mut graph = SceneGraph::new(scheme);
    for n in &network.nodes {
        let id = graph.add_node(&n.node_type, n.id.clone())?;
        // Sorted so error messages and value order don't depend on hash order.
        let mut params: Vec<(&String, &serde_json::Value)> = n.params.iter().collect();
        params.sort_by(|a, b| a.0.cmp(b.0));
        for (param, value) in params {
            graph.set_json(id, param, value)?;
        }
    }

    for c in &network.connections {
        let from = graph
            .find(&c.from.node_id)
            .ok_or_else(|| anyhow!("node not found: {}", c.from.node_id))?;
        let to = graph
            .find(&c.to.node_id)
            .ok_or_else(|| anyhow!("node not found: {}", c.to.node_id))?;
        graph
            .connect(from, to, &c.to.port_id)
            .with_context(|| format!("failed to apply connection '{}'", c.id))?;
    }

    debug!(
        "[dsl] built '{}': {} node(s), {} connection(s)",
        network.metadata.name,
        network.nodes.len(),
        network.connections.len()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> ShadingNetwork {
        parse_network(
            r#"{
                "version": "1.0",
                "metadata": { "name": "smoke" },
                "nodes": [
                    { "id": "shader", "type": "standard_volume", "params": { "density_channel": "smoke" } },
                    { "id": "tint", "type": "volume_sample_rgb", "params": { "channel": "Cd" } }
                ],
                "connections": [
                    { "id": "c1", "from": { "nodeId": "tint", "portId": "out" }, "to": { "nodeId": "shader", "portId": "scatter_color" } }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn validation_errors_are_reported_together() {
        let mut net = network();
        net.nodes[0]
            .params
            .insert("density".into(), serde_json::json!("thick"));
        net.connections[0].to.port_id = "scatter_color.w".into();
        let scheme = Arc::new(schema::load_default_scheme().unwrap());
        let err = format!("{:#}", build_scene_graph(&net, scheme).unwrap_err());
        assert!(err.contains("2 error(s)"), "{err}");
        assert!(err.contains("shader.density"), "{err}");
        assert!(err.contains("no component 'w'"), "{err}");
    }
}
