//! Translation of a host volume node into renderer nodes.

mod attributes;
mod config;
mod export;

pub use attributes::{IDENTITY_MATRIX, ShaderMode, VolumeAttributes, ray};
pub use config::{ExportConfig, PROCEDURAL_ROOT_ENV, VOLUME_PROCEDURAL};
pub use export::{
    FULL_SHADER_TYPE, SIMPLE_SHADER_TYPE, VOLUME_NODE_TYPE, VolumeExport, translate_volume,
};
