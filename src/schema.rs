use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::dsl::{Connection, Node, ShadingNetwork};
use crate::graph::{ChannelMetadata, ParamType};
use crate::grids::{component_suffixes, split_component};
use crate::scene::ParamValue;

const DEFAULT_NODE_SCHEME_JSON: &str = include_str!("../assets/node-scheme.json");

/// Renderer node types known to the translator, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct NodeScheme {
    pub nodes: HashMap<String, NodeTypeScheme>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawNodeScheme {
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub nodes: Vec<RawNodeDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawNodeDef {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamScheme>,
}

#[derive(Debug, Clone)]
pub struct NodeTypeScheme {
    pub category: Option<String>,
    /// Parameters in declaration order.
    pub params: Vec<ParamScheme>,
}

impl NodeTypeScheme {
    pub fn param(&self, name: &str) -> Option<&ParamScheme> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamScheme {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Item type of an `array` parameter.
    #[serde(default)]
    pub element: Option<ParamType>,
    /// Accepted names of an `enum` parameter.
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: ParamMetadata,
}

impl ParamScheme {
    /// Converts a JSON value to this parameter's type, including array items and
    /// enum names.
    pub fn coerce(&self, value: &serde_json::Value) -> Result<ParamValue> {
        match (self.ty, self.element) {
            (ParamType::Array, Some(element)) => coerce_array(element, value),
            (ParamType::Enum, _) if !self.values.is_empty() => {
                let coerced = coerce_param_value(ParamType::Enum, value)?;
                match coerced.as_str() {
                    Some(name) if !self.values.iter().any(|v| v == name) => bail!(
                        "'{name}' is not one of {}",
                        self.values.join(", ")
                    ),
                    _ => Ok(coerced),
                }
            }
            (ty, _) => coerce_param_value(ty, value),
        }
    }

    /// Whether `value` can be stored in this parameter.
    pub fn accepts(&self, value: &ParamValue) -> bool {
        match (self.ty, self.element, value) {
            (ParamType::Array, Some(element), ParamValue::Array(items)) => {
                items.iter().all(|v| v.matches(element))
            }
            (ParamType::Array, Some(_), _) => false,
            (ParamType::Enum, _, v) if !self.values.is_empty() => {
                v.as_str().is_some_and(|name| self.values.iter().any(|n| n == name))
            }
            (ty, _, v) => v.matches(ty),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamMetadata {
    /// The string value names a channel sampled from the volume.
    #[serde(default)]
    pub volume_sample: bool,
}

impl NodeScheme {
    pub fn node_type(&self, node_type: &str) -> Option<&NodeTypeScheme> {
        self.nodes.get(node_type)
    }

    /// `volume_sample` flags of every string parameter in the scheme.
    pub fn channel_metadata(&self) -> ChannelMetadata {
        self.nodes
            .iter()
            .flat_map(|(node_type, scheme)| {
                scheme
                    .params
                    .iter()
                    .filter(|p| p.ty == ParamType::String && p.metadata.volume_sample)
                    .map(move |p| (node_type.clone(), p.name.clone()))
            })
            .collect()
    }
}

pub fn load_default_scheme() -> Result<NodeScheme> {
    parse_scheme(DEFAULT_NODE_SCHEME_JSON).context("failed to parse assets/node-scheme.json")
}

pub fn load_scheme_from_path(path: impl AsRef<std::path::Path>) -> Result<NodeScheme> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read node scheme at {}", path.display()))?;
    parse_scheme(&text).with_context(|| format!("invalid node scheme in {}", path.display()))
}

pub fn parse_scheme(text: &str) -> Result<NodeScheme> {
    let raw: RawNodeScheme = serde_json::from_str(text)?;
    let mut nodes: HashMap<String, NodeTypeScheme> = HashMap::new();
    for def in raw.nodes {
        validate_node_def(&def)?;
        if nodes.contains_key(&def.node_type) {
            bail!("node type '{}' is declared twice", def.node_type);
        }
        nodes.insert(
            def.node_type,
            NodeTypeScheme {
                category: def.category,
                params: def.params,
            },
        );
    }
    Ok(NodeScheme { nodes })
}

fn validate_node_def(def: &RawNodeDef) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for p in &def.params {
        if !seen.insert(p.name.as_str()) {
            bail!("node type '{}' declares param '{}' twice", def.node_type, p.name);
        }
        if p.metadata.volume_sample && p.ty != ParamType::String {
            bail!(
                "'{}.{}' is flagged volume_sample but has type {}",
                def.node_type,
                p.name,
                p.ty
            );
        }
        if p.element.is_some() && p.ty != ParamType::Array {
            bail!(
                "'{}.{}' declares an element type but has type {}",
                def.node_type,
                p.name,
                p.ty
            );
        }
        if matches!(p.element, Some(ParamType::Array)) {
            bail!("'{}.{}' cannot hold nested arrays", def.node_type, p.name);
        }
        if let Some(default) = p.default.as_ref() {
            p.coerce(default)
                .with_context(|| format!("invalid default for '{}.{}'", def.node_type, p.name))?;
        }
    }
    Ok(())
}

fn parse_floats<const N: usize>(value: &serde_json::Value) -> Option<[f32; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, v) in out.iter_mut().zip(items) {
        *slot = v.as_f64()? as f32;
    }
    Some(out)
}

/// Converts a JSON value to a parameter value of type `ty`.
///
/// Node references can't be expressed as literal values; they are links.
pub fn coerce_param_value(ty: ParamType, value: &serde_json::Value) -> Result<ParamValue> {
    let coerced = match ty {
        ParamType::Byte => value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(ParamValue::Byte),
        ParamType::Int => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(ParamValue::Int),
        ParamType::UInt => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(ParamValue::UInt),
        ParamType::Bool => value.as_bool().map(ParamValue::Bool),
        ParamType::Float => value.as_f64().map(|v| ParamValue::Float(v as f32)),
        ParamType::Rgb => parse_floats::<3>(value).map(ParamValue::Rgb),
        ParamType::Rgba => parse_floats::<4>(value).map(ParamValue::Rgba),
        ParamType::Vector => parse_floats::<3>(value).map(ParamValue::Vector),
        ParamType::Point => parse_floats::<3>(value).map(ParamValue::Point),
        ParamType::Point2 => parse_floats::<2>(value).map(ParamValue::Point2),
        ParamType::String | ParamType::Enum => {
            value.as_str().map(|s| ParamValue::String(s.to_string()))
        }
        ParamType::Matrix => parse_floats::<16>(value).map(ParamValue::Matrix),
        ParamType::Pointer | ParamType::Node => {
            value.is_null().then_some(ParamValue::Node(None))
        }
        ParamType::Array => return coerce_untyped_array(value),
    };
    coerced.ok_or_else(|| anyhow!("expected {ty}, got {value}"))
}

/// Converts a JSON array whose items all have type `element`.
pub fn coerce_array(element: ParamType, value: &serde_json::Value) -> Result<ParamValue> {
    if element == ParamType::Array {
        bail!("nested arrays are not supported");
    }
    let Some(items) = value.as_array() else {
        bail!("expected ARRAY of {element}, got {value}");
    };
    let items = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            coerce_param_value(element, item).with_context(|| format!("array item {i}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ParamValue::Array(items))
}

fn coerce_untyped_array(value: &serde_json::Value) -> Result<ParamValue> {
    let Some(items) = value.as_array() else {
        bail!("expected ARRAY, got {value}");
    };
    match infer_element_type(items)? {
        Some(element) => coerce_array(element, value),
        None => Ok(ParamValue::Array(Vec::new())),
    }
}

/// Single item type for an untyped JSON array, from the shape of all its items.
///
/// Numbers read as ints unless one of them has a fraction. Three-element items
/// read as rgb; a vector array needs an explicit element type.
fn infer_element_type(items: &[serde_json::Value]) -> Result<Option<ParamType>> {
    use serde_json::Value;

    let Some(first) = items.first() else {
        return Ok(None);
    };
    let element = match first {
        Value::Bool(_) => ParamType::Bool,
        Value::String(_) => ParamType::String,
        Value::Number(_) => {
            let all_ints = items
                .iter()
                .all(|v| v.as_i64().is_some_and(|i| i32::try_from(i).is_ok()));
            if all_ints { ParamType::Int } else { ParamType::Float }
        }
        Value::Array(inner) => match inner.len() {
            2 => ParamType::Point2,
            3 => ParamType::Rgb,
            4 => ParamType::Rgba,
            16 => ParamType::Matrix,
            n => bail!("unsupported {n}-element array item {first}"),
        },
        other => bail!("unsupported array item {other}"),
    };
    let same_kind = |v: &Value| match (first, v) {
        (Value::Array(a), Value::Array(b)) => a.len() == b.len(),
        (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
    };
    if let Some(odd) = items.iter().find(|v| !same_kind(*v)) {
        bail!("array mixes {element} items with {odd}");
    }
    Ok(Some(element))
}

/// Checks that a link query names a parameter of `node_type` and, for component
/// queries, a component that parameter's type exposes.
pub fn validate_link_query(scheme: &NodeTypeScheme, query: &str) -> Result<ParamType> {
    let (base, component) = split_component(query);
    let Some(param) = scheme.param(base) else {
        bail!("unknown parameter '{base}'");
    };
    if let Some(c) = component {
        if !component_suffixes(param.ty).contains(&c) {
            bail!("parameter '{base}' of type {} has no component '{c}'", param.ty);
        }
    }
    Ok(param.ty)
}

/// Validates every node and connection of `network`, reporting all problems at once.
pub fn validate_network_against(network: &ShadingNetwork, scheme: &NodeScheme) -> Result<()> {
    let mut nodes_by_id: HashMap<&str, &Node> = HashMap::new();
    let mut errors: Vec<String> = Vec::new();

    for n in &network.nodes {
        if nodes_by_id.insert(n.id.as_str(), n).is_some() {
            errors.push(format!("duplicate node id '{}'", n.id));
        }
    }

    for n in &network.nodes {
        let Some(node_scheme) = scheme.node_type(&n.node_type) else {
            errors.push(format!(
                "unknown node type '{}' at node '{}'",
                n.node_type, n.id
            ));
            continue;
        };

        for (k, v) in &n.params {
            let Some(param_scheme) = node_scheme.param(k) else {
                errors.push(format!(
                    "unknown param '{}.{}' (type {})",
                    n.id, k, n.node_type
                ));
                continue;
            };
            if let Err(e) = param_scheme.coerce(v) {
                errors.push(format!("invalid param '{}.{}': {e}", n.id, k));
            }
        }
    }

    for c in &network.connections {
        validate_connection(c, &nodes_by_id, scheme, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!(
            "network failed scheme validation ({} error(s)):\n- {}",
            errors.len(),
            errors.join("\n- ")
        )
    }
}

fn validate_connection(
    c: &Connection,
    nodes_by_id: &HashMap<&str, &Node>,
    scheme: &NodeScheme,
    errors: &mut Vec<String>,
) {
    if !nodes_by_id.contains_key(c.from.node_id.as_str()) {
        errors.push(format!(
            "connection '{}' references missing from.nodeId '{}'",
            c.id, c.from.node_id
        ));
        return;
    }
    let Some(to_node) = nodes_by_id.get(c.to.node_id.as_str()).copied() else {
        errors.push(format!(
            "connection '{}' references missing to.nodeId '{}'",
            c.id, c.to.node_id
        ));
        return;
    };
    let Some(to_scheme) = scheme.node_type(&to_node.node_type) else {
        // Unknown node type already reported in node loop.
        return;
    };
    if let Err(e) = validate_link_query(to_scheme, &c.to.port_id) {
        errors.push(format!(
            "connection '{}' targets '{}.{}' (type {}): {e}",
            c.id, c.to.node_id, c.to.port_id, to_node.node_type
        ));
    }
}

/// Initial value of `param` on a freshly created node.
pub(crate) fn default_value(param: &ParamScheme) -> Option<ParamValue> {
    let default = param.default.as_ref()?;
    param.coerce(default).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scheme_loads_and_flags_channel_params() {
        let scheme = load_default_scheme().unwrap();
        let meta = scheme.channel_metadata();
        assert!(meta.is_flagged("openvdb_shader", "scattering_channel"));
        assert!(meta.is_flagged("openvdb_simple_shader", "smoke_channel"));
        assert!(meta.is_flagged("volume_sample_float", "channel"));
        assert!(!meta.is_flagged("image", "filename"));
        assert!(!meta.is_flagged("noise", "coord_space"));
    }

    #[test]
    fn duplicate_params_are_rejected() {
        let text = r#"{"version":"1","nodes":[{"type":"t","params":[
            {"name":"a","type":"float"},{"name":"a","type":"int"}]}]}"#;
        let err = parse_scheme(text).unwrap_err();
        assert!(format!("{err:#}").contains("declares param 'a' twice"));
    }

    #[test]
    fn volume_sample_on_non_string_is_rejected() {
        let text = r#"{"version":"1","nodes":[{"type":"t","params":[
            {"name":"a","type":"rgb","metadata":{"volume_sample":true}}]}]}"#;
        assert!(parse_scheme(text).is_err());
    }

    #[test]
    fn coerce_checks_shape_and_range() {
        use serde_json::json;
        assert_eq!(
            coerce_param_value(ParamType::Rgb, &json!([1, 0.5, 0])).unwrap(),
            ParamValue::Rgb([1.0, 0.5, 0.0])
        );
        assert!(coerce_param_value(ParamType::Rgb, &json!([1, 0.5])).is_err());
        assert!(coerce_param_value(ParamType::Byte, &json!(300)).is_err());
        assert!(coerce_param_value(ParamType::String, &json!(1)).is_err());
        assert_eq!(
            coerce_param_value(ParamType::Array, &json!(["a", "b"])).unwrap(),
            ParamValue::Array(vec![
                ParamValue::String("a".into()),
                ParamValue::String("b".into())
            ])
        );
    }

    #[test]
    fn untyped_arrays_get_one_item_type() {
        use serde_json::json;
        assert_eq!(
            coerce_param_value(ParamType::Array, &json!([0, 0.5])).unwrap(),
            ParamValue::Array(vec![ParamValue::Float(0.0), ParamValue::Float(0.5)])
        );
        assert_eq!(
            coerce_param_value(ParamType::Array, &json!([1, 2])).unwrap(),
            ParamValue::Array(vec![ParamValue::Int(1), ParamValue::Int(2)])
        );
        assert!(coerce_param_value(ParamType::Array, &json!([1, "a"])).is_err());
        assert!(coerce_param_value(ParamType::Array, &json!([[0, 1], [0, 1, 2]])).is_err());
    }

    #[test]
    fn array_params_use_their_element_type() {
        use serde_json::json;
        let text = r#"{"version":"1","nodes":[{"type":"t","params":[
            {"name":"offsets","type":"array","element":"vector","default":[]},
            {"name":"weights","type":"array","element":"float","default":[1, 0.5]}]}]}"#;
        let scheme = parse_scheme(text).unwrap();
        let t = scheme.node_type("t").unwrap();

        let offsets = t.param("offsets").unwrap();
        assert_eq!(
            offsets.coerce(&json!([[0, 1, 0], [1, 0, 0]])).unwrap(),
            ParamValue::Array(vec![
                ParamValue::Vector([0.0, 1.0, 0.0]),
                ParamValue::Vector([1.0, 0.0, 0.0])
            ])
        );
        assert!(offsets.coerce(&json!([[0, 1]])).is_err());
        assert!(offsets.accepts(&ParamValue::Array(vec![ParamValue::Vector([0.0; 3])])));
        assert!(!offsets.accepts(&ParamValue::Array(vec![ParamValue::Rgb([0.0; 3])])));

        assert_eq!(
            default_value(t.param("weights").unwrap()),
            Some(ParamValue::Array(vec![ParamValue::Float(1.0), ParamValue::Float(0.5)]))
        );
    }

    #[test]
    fn element_type_requires_an_array_param() {
        let text = r#"{"version":"1","nodes":[{"type":"t","params":[
            {"name":"a","type":"float","element":"float"}]}]}"#;
        assert!(parse_scheme(text).is_err());
        let text = r#"{"version":"1","nodes":[{"type":"t","params":[
            {"name":"a","type":"array","element":"array"}]}]}"#;
        assert!(parse_scheme(text).is_err());
    }

    #[test]
    fn enum_params_accept_listed_names() {
        use serde_json::json;
        let scheme = load_default_scheme().unwrap();
        let coord_space = scheme.node_type("noise").unwrap().param("coord_space").unwrap();
        assert_eq!(coord_space.ty, ParamType::Enum);
        assert_eq!(
            coord_space.coerce(&json!("world")).unwrap(),
            ParamValue::String("world".into())
        );
        assert!(coord_space.coerce(&json!("camera")).is_err());
        assert!(coord_space.coerce(&json!(1)).is_err());
        assert!(!coord_space.accepts(&ParamValue::String("camera".into())));

        let text = r#"{"version":"1","nodes":[{"type":"t","params":[
            {"name":"mode","type":"enum","values":["a","b"],"default":"c"}]}]}"#;
        assert!(parse_scheme(text).is_err());
    }

    #[test]
    fn link_queries_must_match_parameter_components() {
        let scheme = load_default_scheme().unwrap();
        let shader = scheme.node_type("openvdb_shader").unwrap();
        assert_eq!(
            validate_link_query(shader, "scattering_color.g").unwrap(),
            ParamType::Rgb
        );
        assert!(validate_link_query(shader, "scattering_color.x").is_err());
        assert!(validate_link_query(shader, "anisotropy.x").is_err());
        assert!(validate_link_query(shader, "missing").is_err());
    }
}
