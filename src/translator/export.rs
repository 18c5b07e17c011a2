use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};

use crate::graph::{NodeId, ParamType};
use crate::grids::{build_grid_array, discover_grids, split_grid_names};
use crate::scene::{Declaration, ParamValue, SceneGraph};

use super::attributes::{IDENTITY_MATRIX, ShaderMode, VolumeAttributes};
use super::config::ExportConfig;

pub const VOLUME_NODE_TYPE: &str = "volume";
pub const FULL_SHADER_TYPE: &str = "openvdb_shader";
pub const SIMPLE_SHADER_TYPE: &str = "openvdb_simple_shader";

/// Renderer nodes produced for one host volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeExport {
    pub volume: NodeId,
    /// Built-in shader created for the volume; `None` when a shading group overrides it.
    pub builtin_shader: Option<NodeId>,
    /// Shader assigned to the volume, built-in or overriding.
    pub shader: Option<NodeId>,
    /// Value of the volume's `grids` parameter.
    pub grids: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct CreatedNodes {
    volume: NodeId,
    shader: Option<NodeId>,
}

fn builtin_shader_type(mode: ShaderMode) -> &'static str {
    match mode {
        ShaderMode::Full => FULL_SHADER_TYPE,
        ShaderMode::Simple => SIMPLE_SHADER_TYPE,
    }
}

fn create_nodes(scene: &mut SceneGraph, name: &str, attrs: &VolumeAttributes) -> Result<CreatedNodes> {
    let volume = scene.add_node(VOLUME_NODE_TYPE, name)?;
    let shader = if attrs.override_shader {
        None
    } else {
        let shader_type = builtin_shader_type(attrs.shader_mode);
        Some(scene.add_node(shader_type, format!("{name}_shader"))?)
    };
    Ok(CreatedNodes { volume, shader })
}

/// Values checked against the scene before any renderer node is created.
#[derive(Debug, Clone)]
struct Prepared {
    dso: String,
    step_size: f32,
    shading_group: Option<NodeId>,
}

fn prepare(
    scene: &SceneGraph,
    name: &str,
    attrs: &VolumeAttributes,
    config: &ExportConfig,
) -> Result<Prepared> {
    let shading_group = if attrs.override_shader {
        find_shading_group(scene, name, attrs)?
    } else {
        None
    };
    Ok(Prepared {
        dso: config.dso_path()?,
        step_size: attrs.step_size()?,
        shading_group,
    })
}

/// Translates one host volume into `scene`: a `volume` node, its built-in shader
/// (unless overridden) and every volume parameter, including the `grids` list
/// discovered from the shading network.
///
/// Network nodes referenced by `attrs` (shading group shader, shader connections)
/// must already be present in `scene`. On error the scene is left as it was.
pub fn translate_volume(
    scene: &mut SceneGraph,
    name: &str,
    attrs: &VolumeAttributes,
    config: &ExportConfig,
) -> Result<VolumeExport> {
    let prepared = prepare(scene, name, attrs, config)
        .with_context(|| format!("failed to export volume '{name}'"))?;

    let first_new = scene.len();
    let exported = create_nodes(scene, name, attrs)
        .with_context(|| format!("failed to create renderer nodes for '{name}'"))
        .and_then(|nodes| {
            export_volume(scene, name, nodes, &prepared, attrs)
                .with_context(|| format!("failed to export volume '{name}'"))
        });
    if exported.is_err() {
        scene.truncate(first_new);
    }
    exported
}

fn export_volume(
    scene: &mut SceneGraph,
    name: &str,
    nodes: CreatedNodes,
    prepared: &Prepared,
    attrs: &VolumeAttributes,
) -> Result<VolumeExport> {
    let volume = nodes.volume;

    scene.set(volume, "dso", ParamValue::String(prepared.dso.clone()))?;
    export_matrix(scene, volume, &attrs.matrices)?;

    scene.declare(volume, "filename", Declaration::constant(ParamType::String))?;
    scene.set(volume, "filename", ParamValue::String(attrs.out_vdb_path.clone()))?;

    scene.set(volume, "min", ParamValue::Point(attrs.bbox_min))?;
    scene.set(volume, "max", ParamValue::Point(attrs.bbox_max))?;

    let shader = nodes.shader.or(prepared.shading_group);
    if let Some(shader) = shader {
        scene.set(volume, "shader", ParamValue::Node(Some(shader)))?;
    }
    if let Some(builtin) = nodes.shader {
        export_shader_params(scene, builtin, attrs)?;
    }

    let metadata = scene.scheme().channel_metadata();
    let discovered = discover_grids(&*scene, &metadata, shader);
    let grids = build_grid_array(&discovered, &attrs.additional_channel_export);
    debug!("[translate] {name}: grids {grids:?}");

    scene.declare(volume, "grids", Declaration::constant_array(ParamType::String))?;
    scene.set(volume, "grids", ParamValue::strings(grids.iter().cloned()))?;

    export_velocity(scene, volume, attrs)?;

    scene.declare(volume, "bounds_slack", Declaration::constant(ParamType::Float))?;
    scene.set(volume, "bounds_slack", ParamValue::Float(attrs.bounds_slack))?;

    scene.set(volume, "step_size", ParamValue::Float(prepared.step_size))?;
    scene.set(volume, "matte", ParamValue::Bool(attrs.matte))?;
    scene.set(volume, "receive_shadows", ParamValue::Bool(attrs.receive_shadows))?;
    scene.set(volume, "visibility", ParamValue::Byte(attrs.visibility()))?;
    scene.set(volume, "self_shadows", ParamValue::Bool(attrs.self_shadows))?;

    info!(
        "[translate] exported volume '{name}' with {} grid(s)",
        grids.len()
    );
    Ok(VolumeExport {
        volume,
        builtin_shader: nodes.shader,
        shader,
        grids,
    })
}

fn export_matrix(scene: &mut SceneGraph, volume: NodeId, matrices: &[[f32; 16]]) -> Result<()> {
    let value = match matrices {
        [] => ParamValue::Matrix(IDENTITY_MATRIX),
        [single] => ParamValue::Matrix(*single),
        steps => ParamValue::Array(steps.iter().copied().map(ParamValue::Matrix).collect()),
    };
    scene.set(volume, "matrix", value)
}

fn export_shader_params(scene: &mut SceneGraph, shader: NodeId, attrs: &VolumeAttributes) -> Result<()> {
    for (param, value) in &attrs.shader_params {
        scene.set_json(shader, param, value)?;
    }
    for (query, source_name) in &attrs.shader_connections {
        let source = scene
            .find(source_name)
            .ok_or_else(|| anyhow!("shader connection '{query}' references missing node '{source_name}'"))?;
        scene.connect(source, shader, query)?;
    }
    Ok(())
}

fn find_shading_group(scene: &SceneGraph, name: &str, attrs: &VolumeAttributes) -> Result<Option<NodeId>> {
    let Some(shader_name) = attrs.shading_group_shader.as_deref() else {
        warn!("[translate] {name}: overrideShader is set but no shading group shader is bound");
        return Ok(None);
    };
    scene
        .find(shader_name)
        .map(Some)
        .ok_or_else(|| anyhow!("shading group shader '{shader_name}' is not in the scene"))
}

fn export_velocity(scene: &mut SceneGraph, volume: NodeId, attrs: &VolumeAttributes) -> Result<()> {
    let velocity_grids: Vec<&str> = split_grid_names(&attrs.velocity_grids).collect();
    if velocity_grids.is_empty() {
        return Ok(());
    }

    scene.declare(volume, "velocity_grids", Declaration::constant_array(ParamType::String))?;
    scene.set(volume, "velocity_grids", ParamValue::strings(velocity_grids))?;

    for (param, value) in [
        ("velocity_scale", attrs.velocity_scale),
        ("velocity_fps", attrs.velocity_fps),
        ("velocity_shutter_start", attrs.velocity_shutter_start),
        ("velocity_shutter_end", attrs.velocity_shutter_end),
    ] {
        scene.declare(volume, param, Declaration::constant(ParamType::Float))?;
        scene.set(volume, param, ParamValue::Float(value))?;
    }
    Ok(())
}
