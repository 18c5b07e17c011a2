use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata key marking a string parameter whose value names a volume channel.
pub const VOLUME_SAMPLE: &str = "volume_sample";

/// Handle to a node owned by a renderer scene graph.
///
/// Identity is the handle value; two handles are the same node iff they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Semantic type of a renderer node parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Byte,
    Int,
    UInt,
    Bool,
    Float,
    Rgb,
    Rgba,
    Vector,
    Point,
    Point2,
    String,
    Pointer,
    Node,
    Matrix,
    Array,
    /// String-valued parameter restricted to a fixed set of names.
    Enum,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Byte => "BYTE",
            ParamType::Int => "INT",
            ParamType::UInt => "UINT",
            ParamType::Bool => "BOOL",
            ParamType::Float => "FLOAT",
            ParamType::Rgb => "RGB",
            ParamType::Rgba => "RGBA",
            ParamType::Vector => "VECTOR",
            ParamType::Point => "POINT",
            ParamType::Point2 => "POINT2",
            ParamType::String => "STRING",
            ParamType::Pointer => "POINTER",
            ParamType::Node => "NODE",
            ParamType::Matrix => "MATRIX",
            ParamType::Array => "ARRAY",
            ParamType::Enum => "ENUM",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: ParamType,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Read-only view of a renderer shading network.
///
/// Implementations report a dangling or unknown handle as absent (`None` / empty)
/// rather than failing; traversal code relies on that to stay best-effort.
pub trait NodeGraph {
    /// Type name of `node` (e.g. `openvdb_shader`).
    fn node_type(&self, node: NodeId) -> Option<&str>;

    /// Every parameter of `node`, without duplicates.
    fn parameters(&self, node: NodeId) -> Vec<ParamDescriptor>;

    /// Node connected to `query` on `node`. `query` is a parameter name or a
    /// component query such as `color.r`.
    fn link(&self, node: NodeId, query: &str) -> Option<NodeId>;

    /// Literal value of a string parameter.
    fn string_value(&self, node: NodeId, param: &str) -> Option<&str>;
}

/// Set of `(node_type, param_name)` pairs carrying the `volume_sample` flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMetadata {
    flagged: HashMap<String, HashSet<String>>,
}

impl ChannelMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&mut self, node_type: impl Into<String>, param: impl Into<String>) {
        self.flagged
            .entry(node_type.into())
            .or_default()
            .insert(param.into());
    }

    /// Absent metadata reads as `false`.
    pub fn is_flagged(&self, node_type: &str, param: &str) -> bool {
        self.flagged
            .get(node_type)
            .is_some_and(|params| params.contains(param))
    }

    pub fn len(&self) -> usize {
        self.flagged.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }
}

impl<T, P> FromIterator<(T, P)> for ChannelMetadata
where
    T: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (T, P)>>(iter: I) -> Self {
        let mut out = ChannelMetadata::new();
        for (t, p) in iter {
            out.flag(t, p);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_metadata_is_unflagged() {
        let meta: ChannelMetadata = [("openvdb_shader", "smoke_channel")].into_iter().collect();
        assert!(meta.is_flagged("openvdb_shader", "smoke_channel"));
        assert!(!meta.is_flagged("openvdb_shader", "fire_channel"));
        assert!(!meta.is_flagged("standard_volume", "smoke_channel"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn param_type_parses_lowercase_names() {
        let ty: ParamType = serde_json::from_str("\"point2\"").unwrap();
        assert_eq!(ty, ParamType::Point2);
        assert_eq!(ty.to_string(), "POINT2");

        let ty: ParamType = serde_json::from_str("\"enum\"").unwrap();
        assert_eq!(ty, ParamType::Enum);
        assert_eq!(ty.to_string(), "ENUM");
    }
}
