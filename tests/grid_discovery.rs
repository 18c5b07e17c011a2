use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use volume_grid_translator::{
    NodeGraph, build_grid_array, discover_grids, dsl,
    grids::walk_shading_network,
    scene::{ParamValue, SceneGraph},
    schema,
};

fn case_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("cases")
        .join(name)
}

fn load_case(name: &str) -> Result<SceneGraph> {
    let network = dsl::load_network_from_path(case_path(name))?;
    dsl::build_scene_graph(&network, Arc::new(schema::load_default_scheme()?))
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn pyro_network_collects_channels_of_every_linked_sampler() -> Result<()> {
    let graph = load_case("pyro_network.json")?;
    let meta = graph.scheme().channel_metadata();
    let root = graph.find("pyro_shader");

    let grids = discover_grids(&graph, &meta, root);
    assert_eq!(grids, names(&["Cd", "density", "heat", "temperature"]));
    Ok(())
}

#[test]
fn pyro_network_visits_reachable_nodes_once_in_depth_first_order() -> Result<()> {
    let graph = load_case("pyro_network.json")?;
    let meta = graph.scheme().channel_metadata();
    let out = walk_shading_network(&graph, &meta, graph.find("pyro_shader"));

    let visited: Vec<&str> = out
        .visited
        .iter()
        .filter_map(|id| graph.node(*id).map(|n| n.name()))
        .collect();
    assert_eq!(
        visited,
        ["pyro_shader", "scatter_tint", "scatter_ramp", "heat_sample", "warp"]
    );
    Ok(())
}

#[test]
fn cyclic_network_terminates() -> Result<()> {
    let graph = load_case("feedback_network.json")?;
    let meta = graph.scheme().channel_metadata();
    let out = walk_shading_network(&graph, &meta, graph.find("a"));

    assert_eq!(out.visited.len(), 3);
    assert_eq!(out.grids, names(&["density", "velocity"]));
    Ok(())
}

#[test]
fn discovery_is_idempotent() -> Result<()> {
    let graph = load_case("pyro_network.json")?;
    let meta = graph.scheme().channel_metadata();
    let root = graph.find("pyro_shader");
    assert_eq!(
        discover_grids(&graph, &meta, root),
        discover_grids(&graph, &meta, root)
    );
    Ok(())
}

#[test]
fn missing_root_discovers_nothing() -> Result<()> {
    let graph = load_case("pyro_network.json")?;
    let meta = graph.scheme().channel_metadata();
    assert!(discover_grids(&graph, &meta, None).is_empty());
    assert!(discover_grids(&graph, &meta, graph.find("no_such_node")).is_empty());
    Ok(())
}

#[test]
fn clearing_a_flagged_channel_removes_it() -> Result<()> {
    let mut graph = load_case("pyro_network.json")?;
    let meta = graph.scheme().channel_metadata();
    let shader = graph.find("pyro_shader").expect("pyro_shader");
    graph.set(shader, "temperature_channel", ParamValue::String(String::new()))?;

    let grids = discover_grids(&graph, &meta, Some(shader));
    assert!(!grids.contains("temperature"));
    assert!(grids.contains("density"));
    Ok(())
}

#[test]
fn grids_merge_with_additional_names() -> Result<()> {
    let graph = load_case("pyro_network.json")?;
    let meta = graph.scheme().channel_metadata();
    let grids = discover_grids(&graph, &meta, graph.find("pyro_shader"));

    assert_eq!(
        build_grid_array(&grids, " flame\tdensity  "),
        ["Cd", "density", "flame", "heat", "temperature"]
    );
    Ok(())
}

#[test]
fn component_links_are_visible_through_the_accessor() -> Result<()> {
    let graph = load_case("pyro_network.json")?;
    let shader = graph.find("pyro_shader").expect("pyro_shader");
    assert_eq!(graph.link(shader, "scatter_color.g"), graph.find("scatter_tint"));
    assert_eq!(graph.link(shader, "scatter_color.r"), None);
    assert_eq!(graph.link(shader, "scatter_color"), None);
    Ok(())
}
