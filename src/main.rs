use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::Serialize;

use volume_grid_translator::{
    dsl,
    scene::{NodeSnapshot, SceneGraph},
    schema,
    translator::{self, ExportConfig, VolumeAttributes},
};

#[derive(Debug, Default, Clone)]
struct Cli {
    network: Option<PathBuf>,
    volume: Option<PathBuf>,
    scheme: Option<PathBuf>,
    procedurals: Option<String>,
    output: Option<PathBuf>,
    name: Option<String>,
    grids_only: bool,
}

const USAGE: &str = "supported: --network <network.json>, --volume <attributes.json>, \
--scheme <node-scheme.json>, --procedurals <dir>, --name <volume name>, --output <file>, --grids-only";

fn parse_cli(args: &[String]) -> Result<Cli> {
    fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a String> {
        args.get(i + 1)
            .ok_or_else(|| anyhow!("missing value for {flag}"))
    }

    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--grids-only" => {
                cli.grids_only = true;
                i += 1;
                continue;
            }
            "--network" => cli.network = Some(PathBuf::from(value(args, i, "--network")?)),
            "--volume" => cli.volume = Some(PathBuf::from(value(args, i, "--volume")?)),
            "--scheme" => cli.scheme = Some(PathBuf::from(value(args, i, "--scheme")?)),
            "--procedurals" => cli.procedurals = Some(value(args, i, "--procedurals")?.clone()),
            "--output" | "-o" => cli.output = Some(PathBuf::from(value(args, i, "--output")?)),
            "--name" => cli.name = Some(value(args, i, "--name")?.clone()),
            other => return Err(anyhow!("unknown argument: {other} ({USAGE})")),
        }
        i += 2;
    }
    Ok(cli)
}

#[derive(Debug, Serialize)]
struct TranslationReport {
    volume: String,
    shader: Option<String>,
    grids: Vec<String>,
    nodes: Vec<NodeSnapshot>,
}

fn load_scene(cli: &Cli) -> Result<SceneGraph> {
    let scheme = match cli.scheme.as_deref() {
        Some(path) => schema::load_scheme_from_path(path)?,
        None => schema::load_default_scheme()?,
    };
    let scheme = Arc::new(scheme);
    match cli.network.as_deref() {
        Some(path) => {
            let network = dsl::load_network_from_path(path)?;
            dsl::build_scene_graph(&network, scheme)
                .with_context(|| format!("failed to load {}", path.display()))
        }
        None => Ok(SceneGraph::new(scheme)),
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("[cli] wrote {}", path.display());
            Ok(())
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut scene = load_scene(cli)?;
    let attrs = match cli.volume.as_deref() {
        Some(path) => VolumeAttributes::load_from_path(path)?,
        None => VolumeAttributes::default(),
    };
    let config = match cli.procedurals.as_deref() {
        Some(root) => ExportConfig::with_procedural_root(root),
        None => ExportConfig::from_env(),
    };
    let name = cli.name.as_deref().unwrap_or("volume");

    let export = translator::translate_volume(&mut scene, name, &attrs, &config)?;

    let text = if cli.grids_only {
        serde_json::to_string_pretty(&export.grids)?
    } else {
        let shader = export
            .shader
            .and_then(|id| scene.node(id))
            .map(|n| n.name().to_string());
        serde_json::to_string_pretty(&TranslationReport {
            volume: name.to_string(),
            shader,
            grids: export.grids.clone(),
            nodes: scene.snapshot(),
        })?
    };
    write_output(cli.output.as_deref(), &text)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;
    if let Err(e) = run(&cli) {
        eprintln!("[cli] translation failed: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
