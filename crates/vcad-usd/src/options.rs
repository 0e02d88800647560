//! Export configuration.

use crate::error::{ExportError, Result};
use crate::naming::is_valid_identifier;
use serde::{Deserialize, Serialize};
use vcad_kernel_tessellate::TessellationParams;

/// Which axis points up in the written stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpAxis {
    /// CAD convention.
    #[default]
    Z,
    /// Common DCC convention.
    Y,
}

/// Where prim names come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameSource {
    /// The human-readable label (falls back to the id when blank).
    #[default]
    Label,
    /// The stable object id.
    Id,
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Chord-height tolerance for tessellation (model units).
    pub deflection: f64,
    /// Maximum angle per tessellation segment (radians).
    pub angular_deflection: f64,
    /// Vertex merge tolerance (model units).
    pub weld_tolerance: f64,
    /// Tessellate shapes on the rayon pool.
    pub parallel: bool,
    /// Maximum nesting levels below a root.
    pub max_depth: usize,
    /// Prim name source.
    pub name_source: NameSource,
    /// Wrap every top-level prim under a prim of this name.
    pub root_prim: Option<String>,
    /// Stage up axis.
    pub up_axis: UpAxis,
    /// Stage linear unit, in meters.
    pub meters_per_unit: f64,
    /// Leave out objects hidden in the host (and their subtrees).
    pub skip_hidden: bool,
    /// With a selection, also export the full subtrees of selected objects.
    pub select_descendants: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            deflection: 0.1,
            angular_deflection: 0.5,
            weld_tolerance: 1e-6,
            parallel: true,
            max_depth: 256,
            name_source: NameSource::Label,
            root_prim: None,
            up_axis: UpAxis::Z,
            meters_per_unit: 0.001,
            skip_hidden: false,
            select_descendants: false,
        }
    }
}

impl ExportOptions {
    /// Parse options from TOML; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let options: ExportOptions = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate options.
    pub fn validate(&self) -> Result<()> {
        self.tessellation_params().validate()?;
        if self.max_depth == 0 {
            return Err(ExportError::InvalidParameter(
                "max_depth must be at least 1".into(),
            ));
        }
        if !(self.meters_per_unit.is_finite() && self.meters_per_unit > 0.0) {
            return Err(ExportError::InvalidParameter(
                "meters_per_unit must be positive".into(),
            ));
        }
        if let Some(root) = &self.root_prim {
            if !is_valid_identifier(root) {
                return Err(ExportError::InvalidParameter(format!(
                    "root_prim {root:?} is not a valid prim name"
                )));
            }
        }
        Ok(())
    }

    /// Tessellation parameters derived from these options.
    pub fn tessellation_params(&self) -> TessellationParams {
        TessellationParams {
            linear_deflection: self.deflection,
            angular_deflection: self.angular_deflection,
            weld_tolerance: self.weld_tolerance,
        }
    }
}
