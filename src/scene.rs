//! In-memory renderer scene: nodes with typed parameter values, links between
//! parameters, and user-declared parameters.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use crate::graph::{NodeGraph, NodeId, ParamDescriptor, ParamType};
use crate::grids::{component_suffixes, split_component};
use crate::schema::{NodeScheme, ParamScheme, coerce_array, coerce_param_value, default_value};

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Byte(u8),
    Int(i32),
    UInt(u32),
    Bool(bool),
    Float(f32),
    Rgb([f32; 3]),
    Rgba([f32; 4]),
    Vector([f32; 3]),
    Point([f32; 3]),
    Point2([f32; 2]),
    String(String),
    Node(Option<NodeId>),
    Matrix([f32; 16]),
    Array(Vec<ParamValue>),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Byte(_) => ParamType::Byte,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::UInt(_) => ParamType::UInt,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Rgb(_) => ParamType::Rgb,
            ParamValue::Rgba(_) => ParamType::Rgba,
            ParamValue::Vector(_) => ParamType::Vector,
            ParamValue::Point(_) => ParamType::Point,
            ParamValue::Point2(_) => ParamType::Point2,
            ParamValue::String(_) => ParamType::String,
            ParamValue::Node(_) => ParamType::Node,
            ParamValue::Matrix(_) => ParamType::Matrix,
            ParamValue::Array(_) => ParamType::Array,
        }
    }

    /// Whether this value can be stored in a parameter of type `ty`.
    ///
    /// An array of `ty` values is accepted for any `ty` (one key per motion step).
    pub fn matches(&self, ty: ParamType) -> bool {
        match (self, ty) {
            (ParamValue::Node(_), ParamType::Node | ParamType::Pointer) => true,
            (ParamValue::String(_), ParamType::Enum) => true,
            (ParamValue::Array(_), ParamType::Array) => true,
            (ParamValue::Array(items), ty) => !items.is_empty() && items.iter().all(|v| v.matches(ty)),
            (v, ty) => v.param_type() == ty,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn strings<I, S>(items: I) -> ParamValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamValue::Array(
            items
                .into_iter()
                .map(|s| ParamValue::String(s.into()))
                .collect(),
        )
    }
}

/// Type of a user parameter added to a node on top of its built-in ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub ty: ParamType,
    pub array: bool,
}

impl Declaration {
    pub const fn constant(ty: ParamType) -> Self {
        Self { ty, array: false }
    }

    pub const fn constant_array(ty: ParamType) -> Self {
        Self { ty, array: true }
    }

    fn accepts(&self, value: &ParamValue) -> bool {
        match (self.array, value) {
            (true, ParamValue::Array(items)) => items.iter().all(|v| v.matches(self.ty)),
            (true, _) => false,
            (false, v) => v.matches(self.ty),
        }
    }

    fn descriptor_type(&self) -> ParamType {
        if self.array { ParamType::Array } else { self.ty }
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "constant ARRAY {}", self.ty)
        } else {
            write!(f, "constant {}", self.ty)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    name: String,
    node_type: String,
    values: BTreeMap<String, ParamValue>,
    links: BTreeMap<String, NodeId>,
    declarations: BTreeMap<String, Declaration>,
}

impl SceneNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn value(&self, param: &str) -> Option<&ParamValue> {
        self.values.get(param)
    }

    pub fn declaration(&self, param: &str) -> Option<Declaration> {
        self.declarations.get(param).copied()
    }
}

/// Arena of renderer nodes. Handles stay valid for the lifetime of the graph.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    scheme: Arc<NodeScheme>,
    nodes: Vec<SceneNode>,
    by_name: HashMap<String, NodeId>,
}

impl SceneGraph {
    pub fn new(scheme: Arc<NodeScheme>) -> Self {
        Self {
            scheme,
            nodes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn scheme(&self) -> &NodeScheme {
        &self.scheme
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creates a node of a scheme-known type with its default parameter values.
    pub fn add_node(&mut self, node_type: &str, name: impl Into<String>) -> Result<NodeId> {
        let name = name.into();
        let Some(type_scheme) = self.scheme.node_type(node_type) else {
            bail!("unknown node type '{node_type}' for node '{name}'");
        };
        if self.by_name.contains_key(&name) {
            bail!("a node named '{name}' already exists");
        }

        let values = type_scheme
            .params
            .iter()
            .filter_map(|p| default_value(p).map(|v| (p.name.clone(), v)))
            .collect();

        let id = NodeId(u32::try_from(self.nodes.len()).context("scene graph is full")?);
        self.nodes.push(SceneNode {
            name: name.clone(),
            node_type: node_type.to_string(),
            values,
            links: BTreeMap::new(),
            declarations: BTreeMap::new(),
        });
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Drops every node added after the graph held `len` nodes.
    ///
    /// Links and node references on the remaining nodes are not touched.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.nodes.len() {
            return;
        }
        for node in self.nodes.drain(len..) {
            self.by_name.remove(&node.name);
        }
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn get(&self, id: NodeId, param: &str) -> Option<&ParamValue> {
        self.node(id)?.value(param)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| anyhow!("invalid node handle {id}"))
    }

    fn node_ref(&self, id: NodeId) -> Result<&SceneNode> {
        self.node(id).ok_or_else(|| anyhow!("invalid node handle {id}"))
    }

    /// Scheme entry of a built-in parameter, or the declaration of a user parameter.
    fn param_kind(&self, node: &SceneNode, param: &str) -> Option<ParamKind<'_>> {
        if let Some(p) = self
            .scheme
            .node_type(&node.node_type)
            .and_then(|s| s.param(param))
        {
            return Some(ParamKind::BuiltIn(p));
        }
        node.declarations.get(param).copied().map(ParamKind::Declared)
    }

    pub fn set(&mut self, id: NodeId, param: &str, value: ParamValue) -> Result<()> {
        let node = self.node_ref(id)?;
        let ok = match self.param_kind(node, param) {
            Some(ParamKind::BuiltIn(p)) => p.accepts(&value),
            Some(ParamKind::Declared(decl)) => decl.accepts(&value),
            None => bail!(
                "node '{}' ({}) has no parameter '{param}'",
                node.name,
                node.node_type
            ),
        };
        if !ok {
            bail!(
                "cannot set '{}.{param}' to a {} value",
                node.name,
                value.param_type()
            );
        }
        if let ParamValue::Node(Some(target)) = &value {
            self.node_ref(*target)
                .with_context(|| format!("'{}.{param}' references a missing node", node.name))?;
        }
        self.node_mut(id)?.values.insert(param.to_string(), value);
        Ok(())
    }

    /// Sets a parameter from JSON, converting with the parameter's type.
    pub fn set_json(&mut self, id: NodeId, param: &str, value: &serde_json::Value) -> Result<()> {
        let node = self.node_ref(id)?;
        let coerced = match self.param_kind(node, param) {
            Some(ParamKind::BuiltIn(p)) => p.coerce(value),
            Some(ParamKind::Declared(Declaration { ty, array: true })) => coerce_array(ty, value),
            Some(ParamKind::Declared(Declaration { ty, array: false })) => {
                coerce_param_value(ty, value)
            }
            None => bail!(
                "node '{}' ({}) has no parameter '{param}'",
                node.name,
                node.node_type
            ),
        }
        .with_context(|| format!("invalid value for '{}.{param}'", node.name))?;
        self.set(id, param, coerced)
    }

    /// Adds a user parameter. Built-in and already declared names are rejected.
    pub fn declare(&mut self, id: NodeId, param: &str, declaration: Declaration) -> Result<()> {
        let node = self.node_ref(id)?;
        if self.param_kind(node, param).is_some() {
            bail!(
                "cannot declare '{}.{param}': parameter already exists",
                node.name
            );
        }
        self.node_mut(id)?
            .declarations
            .insert(param.to_string(), declaration);
        Ok(())
    }

    /// Links the output of `source` into `query` on `target`.
    ///
    /// `query` is a parameter name or `param.component` for composite types.
    /// Re-linking a query replaces the previous link.
    pub fn connect(&mut self, source: NodeId, target: NodeId, query: &str) -> Result<()> {
        self.node_ref(source)?;
        let node = self.node_ref(target)?;
        let (base, component) = split_component(query);
        let Some(kind) = self.param_kind(node, base) else {
            bail!(
                "cannot link '{}.{query}': node type {} has no parameter '{base}'",
                node.name,
                node.node_type
            );
        };
        if let Some(c) = component {
            let ty = kind.param_type();
            if !component_suffixes(ty).contains(&c) {
                bail!(
                    "cannot link '{}.{query}': {ty} parameter has no component '{c}'",
                    node.name
                );
            }
        }
        self.node_mut(target)?.links.insert(query.to_string(), source);
        Ok(())
    }

    fn value_to_json(&self, value: &ParamValue) -> serde_json::Value {
        use serde_json::json;
        match value {
            ParamValue::Byte(v) => json!(v),
            ParamValue::Int(v) => json!(v),
            ParamValue::UInt(v) => json!(v),
            ParamValue::Bool(v) => json!(v),
            ParamValue::Float(v) => json!(v),
            ParamValue::Rgb(v) | ParamValue::Vector(v) | ParamValue::Point(v) => json!(v),
            ParamValue::Rgba(v) => json!(v),
            ParamValue::Point2(v) => json!(v),
            ParamValue::Matrix(v) => json!(v.to_vec()),
            ParamValue::String(v) => json!(v),
            ParamValue::Node(id) => match id.and_then(|id| self.node(id)) {
                Some(n) => json!(n.name),
                None => serde_json::Value::Null,
            },
            ParamValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| self.value_to_json(v)).collect())
            }
        }
    }

    /// Serializable view of every node, with node references resolved to names.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .iter()
            .map(|n| NodeSnapshot {
                name: n.name.clone(),
                node_type: n.node_type.clone(),
                params: n
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), self.value_to_json(v)))
                    .collect(),
                links: n
                    .links
                    .iter()
                    .filter_map(|(q, id)| self.node(*id).map(|s| (q.clone(), s.name.clone())))
                    .collect(),
                declarations: n
                    .declarations
                    .iter()
                    .map(|(k, d)| (k.clone(), d.to_string()))
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum ParamKind<'a> {
    BuiltIn(&'a ParamScheme),
    Declared(Declaration),
}

impl ParamKind<'_> {
    fn param_type(self) -> ParamType {
        match self {
            ParamKind::BuiltIn(p) => p.ty,
            ParamKind::Declared(decl) => decl.descriptor_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub params: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub declarations: BTreeMap<String, String>,
}

impl NodeGraph for SceneGraph {
    fn node_type(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(SceneNode::node_type)
    }

    fn parameters(&self, node: NodeId) -> Vec<ParamDescriptor> {
        let Some(n) = self.node(node) else {
            return Vec::new();
        };
        let built_in = self
            .scheme
            .node_type(&n.node_type)
            .map(|s| s.params.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|p| ParamDescriptor::new(p.name.clone(), p.ty));
        let declared = n
            .declarations
            .iter()
            .map(|(name, d)| ParamDescriptor::new(name.clone(), d.descriptor_type()));
        built_in.chain(declared).collect()
    }

    fn link(&self, node: NodeId, query: &str) -> Option<NodeId> {
        self.node(node)?.links.get(query).copied()
    }

    fn string_value(&self, node: NodeId, param: &str) -> Option<&str> {
        self.node(node)?.value(param)?.as_str()
    }
}
