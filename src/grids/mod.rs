//! Discovery of the volume grids a shading network samples.

mod assemble;
mod expand;
mod walker;

pub use assemble::{build_grid_array, split_grid_names};
pub use expand::{
    COMPONENT_SEPARATOR, component_suffixes, expand_links, link_queries, split_component,
};
pub use walker::{GridDiscovery, discover_grids, walk_shading_network};
