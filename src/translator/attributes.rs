use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Ray-type bits of the volume's `visibility` parameter.
pub mod ray {
    pub const CAMERA: u8 = 0x01;
    pub const SHADOW: u8 = 0x02;
    pub const REFLECTED: u8 = 0x04;
    pub const REFRACTED: u8 = 0x08;
    pub const SUBSURFACE: u8 = 0x10;
    pub const DIFFUSE: u8 = 0x20;
    pub const GLOSSY: u8 = 0x40;
}

pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Which built-in shader the volume gets when no shading group overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i16", into = "i16")]
pub enum ShaderMode {
    #[default]
    Full,
    Simple,
}

impl From<i16> for ShaderMode {
    fn from(v: i16) -> Self {
        if v == 0 { ShaderMode::Full } else { ShaderMode::Simple }
    }
}

impl From<ShaderMode> for i16 {
    fn from(mode: ShaderMode) -> Self {
        match mode {
            ShaderMode::Full => 0,
            ShaderMode::Simple => 1,
        }
    }
}

/// Attribute values of the host volume node being translated.
///
/// Every field is optional in JSON and falls back to the host's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeAttributes {
    pub out_vdb_path: String,
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    /// World matrices, one per motion step.
    pub matrices: Vec<[f32; 16]>,

    /// Use the shader bound through the host's shading group instead of a built-in one.
    pub override_shader: bool,
    /// Network node id of the shading group's surface shader.
    pub shading_group_shader: Option<String>,
    pub shader_mode: ShaderMode,
    /// Values for the built-in shader's parameters.
    pub shader_params: BTreeMap<String, serde_json::Value>,
    /// Link query on the built-in shader -> network node id feeding it.
    pub shader_connections: BTreeMap<String, String>,

    /// Whitespace-separated grid names exported on top of the discovered ones.
    pub additional_channel_export: String,

    pub velocity_grids: String,
    pub velocity_scale: f32,
    pub velocity_fps: f32,
    pub velocity_shutter_start: f32,
    pub velocity_shutter_end: f32,

    pub bounds_slack: f32,
    /// Percentage; 100 steps once per voxel.
    pub sampling_quality: f32,
    pub voxel_size: f32,

    pub matte: bool,
    pub receive_shadows: bool,
    pub self_shadows: bool,
    pub primary_visibility: bool,
    pub casts_shadows: bool,
    pub visible_in_diffuse: bool,
    pub visible_in_reflections: bool,
    pub visible_in_glossy: bool,
    pub visible_in_refractions: bool,
    pub visible_in_subsurface: bool,
}

impl Default for VolumeAttributes {
    fn default() -> Self {
        Self {
            out_vdb_path: String::new(),
            bbox_min: [-1.0, -1.0, -1.0],
            bbox_max: [1.0, 1.0, 1.0],
            matrices: vec![IDENTITY_MATRIX],
            override_shader: false,
            shading_group_shader: None,
            shader_mode: ShaderMode::Full,
            shader_params: BTreeMap::new(),
            shader_connections: BTreeMap::new(),
            additional_channel_export: String::new(),
            velocity_grids: String::new(),
            velocity_scale: 1.0,
            velocity_fps: 24.0,
            velocity_shutter_start: -0.25,
            velocity_shutter_end: 0.25,
            bounds_slack: 0.0,
            sampling_quality: 100.0,
            voxel_size: 0.1,
            matte: false,
            receive_shadows: true,
            self_shadows: true,
            primary_visibility: true,
            casts_shadows: true,
            visible_in_diffuse: true,
            visible_in_reflections: true,
            visible_in_glossy: true,
            visible_in_refractions: true,
            visible_in_subsurface: true,
        }
    }
}

impl VolumeAttributes {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse volume attributes json")
    }

    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read volume attributes at {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid volume attributes in {}", path.display()))
    }

    /// Ray visibility mask built from the per-ray-type toggles.
    pub fn visibility(&self) -> u8 {
        [
            (self.primary_visibility, ray::CAMERA),
            (self.casts_shadows, ray::SHADOW),
            (self.visible_in_diffuse, ray::DIFFUSE),
            (self.visible_in_reflections, ray::REFLECTED),
            (self.visible_in_glossy, ray::GLOSSY),
            (self.visible_in_refractions, ray::REFRACTED),
            (self.visible_in_subsurface, ray::SUBSURFACE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(0, |mask, (_, bit)| mask | bit)
    }

    /// Ray-march step: the voxel size scaled down by the sampling quality percentage.
    pub fn step_size(&self) -> Result<f32> {
        if !(self.sampling_quality > 0.0) {
            bail!(
                "samplingQuality must be positive, got {}",
                self.sampling_quality
            );
        }
        Ok(self.voxel_size / (self.sampling_quality / 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_host_defaults() {
        let attrs = VolumeAttributes::parse("{}").unwrap();
        assert_eq!(attrs, VolumeAttributes::default());
        assert_eq!(attrs.shader_mode, ShaderMode::Full);
    }

    #[test]
    fn shader_mode_reads_host_short() {
        let attrs = VolumeAttributes::parse(r#"{"shaderMode": 1, "outVdbPath": "a.vdb"}"#).unwrap();
        assert_eq!(attrs.shader_mode, ShaderMode::Simple);
        assert_eq!(attrs.out_vdb_path, "a.vdb");
    }

    #[test]
    fn visibility_mask_combines_enabled_rays() {
        let mut attrs = VolumeAttributes::default();
        assert_eq!(attrs.visibility(), 0x7f);

        attrs.visible_in_diffuse = false;
        attrs.visible_in_glossy = false;
        attrs.visible_in_subsurface = false;
        assert_eq!(
            attrs.visibility(),
            ray::CAMERA | ray::SHADOW | ray::REFLECTED | ray::REFRACTED
        );
    }

    #[test]
    fn step_size_scales_voxel_size_by_quality() {
        let mut attrs = VolumeAttributes {
            voxel_size: 0.5,
            sampling_quality: 200.0,
            ..Default::default()
        };
        assert_eq!(attrs.step_size().unwrap(), 0.25);

        attrs.sampling_quality = 0.0;
        assert!(attrs.step_size().is_err());
    }
}
