pub mod dsl;
pub mod graph;
pub mod grids;
pub mod scene;
pub mod schema;
pub mod translator;

pub use graph::{ChannelMetadata, NodeGraph, NodeId, ParamDescriptor, ParamType};
pub use grids::{build_grid_array, discover_grids};
