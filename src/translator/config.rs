use anyhow::{Result, bail};

/// Environment variable holding the renderer plugin root.
pub const PROCEDURAL_ROOT_ENV: &str = "MTOA_PATH";

/// Volume procedural, relative to the plugin root.
pub const VOLUME_PROCEDURAL: &str = "procedurals/volume_openvdb.so";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportConfig {
    pub procedural_root: Option<String>,
}

impl ExportConfig {
    pub fn from_env() -> Self {
        Self {
            procedural_root: std::env::var(PROCEDURAL_ROOT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn with_procedural_root(root: impl Into<String>) -> Self {
        Self {
            procedural_root: Some(root.into()),
        }
    }

    /// Path of the volume procedural the `volume` node loads.
    pub fn dso_path(&self) -> Result<String> {
        let Some(root) = self.procedural_root.as_deref() else {
            bail!("{PROCEDURAL_ROOT_ENV} is not set; cannot locate {VOLUME_PROCEDURAL}");
        };
        if root.ends_with('/') {
            Ok(format!("{root}{VOLUME_PROCEDURAL}"))
        } else {
            Ok(format!("{root}/{VOLUME_PROCEDURAL}"))
        }
    }
}
