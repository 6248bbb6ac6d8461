//! Build configuration types

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, BuildResult};

/// Settings that steer segmentation and marking synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Whether striped-area cells carry traffic and allow lane changes
    pub striped_areas_traversable: bool,
    pub markings: MarkingConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            striped_areas_traversable: true,
            markings: MarkingConfig::default(),
        }
    }
}

/// Lane marking dimensions in metres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkingConfig {
    /// Distance between the pavement edge and the edge line
    pub edge_gap: f64,
    /// Width of the outer edge lines
    pub edge_line_width: f64,
    /// Dashed and solid interior lines
    pub narrow_line_width: f64,
    /// One-way crossing (block) markings
    pub wide_line_width: f64,
}

impl Default for MarkingConfig {
    fn default() -> Self {
        Self {
            edge_gap: 0.10,
            edge_line_width: 0.20,
            narrow_line_width: 0.15,
            wide_line_width: 0.30,
        }
    }
}

impl BuildConfig {
    /// Reject dimensions that cannot produce a sensible cross-section
    pub fn validate(&self) -> BuildResult<()> {
        let m = &self.markings;
        for (field, value) in [
            ("edge_gap", m.edge_gap),
            ("edge_line_width", m.edge_line_width),
            ("narrow_line_width", m.narrow_line_width),
            ("wide_line_width", m.wide_line_width),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BuildError::Config(format!(
                    "markings.{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }
}
