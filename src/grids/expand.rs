//! Component link expansion for composite parameters.
//!
//! A renderer link may target a whole parameter (`albedo`) or a single
//! component of it (`albedo.r`). Composite types are probed per component so
//! partially linked colors and vectors are still followed.

use crate::graph::{NodeGraph, NodeId, ParamType};

pub const COMPONENT_SEPARATOR: char = '.';

const RGB_COMPONENTS: &[&str] = &["r", "g", "b"];
const RGBA_COMPONENTS: &[&str] = &["r", "g", "b", "a"];
const VECTOR_COMPONENTS: &[&str] = &["x", "y", "z"];
const POINT2_COMPONENTS: &[&str] = &["x", "y"];

/// Component suffixes a parameter of type `ty` exposes for links.
pub fn component_suffixes(ty: ParamType) -> &'static [&'static str] {
    match ty {
        ParamType::Rgb => RGB_COMPONENTS,
        ParamType::Rgba => RGBA_COMPONENTS,
        ParamType::Vector | ParamType::Point => VECTOR_COMPONENTS,
        ParamType::Point2 => POINT2_COMPONENTS,
        _ => &[],
    }
}

/// Link queries to probe for `param`: the parameter itself, then one per component.
pub fn link_queries(param: &str, ty: ParamType) -> Vec<String> {
    let components = component_suffixes(ty);
    let mut out = Vec::with_capacity(1 + components.len());
    out.push(param.to_string());
    for c in components {
        out.push(format!("{param}{COMPONENT_SEPARATOR}{c}"));
    }
    out
}

/// Splits `albedo.r` into (`albedo`, Some(`r`)); a plain name has no component.
pub fn split_component(query: &str) -> (&str, Option<&str>) {
    match query.rsplit_once(COMPONENT_SEPARATOR) {
        Some((param, component)) => (param, Some(component)),
        None => (query, None),
    }
}

/// Resolves every link query of `param` on `node`. Unconnected queries map to `None`.
pub fn expand_links<G: NodeGraph + ?Sized>(
    graph: &G,
    node: NodeId,
    param: &str,
    ty: ParamType,
) -> Vec<(String, Option<NodeId>)> {
    link_queries(param, ty)
        .into_iter()
        .map(|query| {
            let linked = graph.link(node, &query);
            (query, linked)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_types_only_probe_the_base_parameter() {
        for ty in [
            ParamType::Float,
            ParamType::Int,
            ParamType::Bool,
            ParamType::Matrix,
            ParamType::Node,
            ParamType::Array,
            ParamType::Enum,
        ] {
            assert_eq!(link_queries("value", ty), vec!["value".to_string()]);
        }
    }

    #[test]
    fn composite_types_add_one_query_per_component() {
        assert_eq!(
            link_queries("albedo", ParamType::Rgb),
            ["albedo", "albedo.r", "albedo.g", "albedo.b"]
        );
        assert_eq!(
            link_queries("tint", ParamType::Rgba),
            ["tint", "tint.r", "tint.g", "tint.b", "tint.a"]
        );
        assert_eq!(
            link_queries("offset", ParamType::Vector),
            ["offset", "offset.x", "offset.y", "offset.z"]
        );
        assert_eq!(
            link_queries("P", ParamType::Point),
            ["P", "P.x", "P.y", "P.z"]
        );
        assert_eq!(link_queries("uv", ParamType::Point2), ["uv", "uv.x", "uv.y"]);
    }

    #[test]
    fn split_component_handles_plain_and_component_queries() {
        assert_eq!(split_component("albedo"), ("albedo", None));
        assert_eq!(split_component("albedo.g"), ("albedo", Some("g")));
    }
}
