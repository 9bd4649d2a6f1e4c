use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for a viewing session. Every field has a default, so an empty
/// TOML document is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Minimum spacing between two live window/level propagations.
    pub voi_throttle_ms: u64,
    /// Step used by the increase/decrease slab thickness commands.
    pub slab_step: f64,
    /// Floor applied by relative slab thickness changes.
    pub min_slab_thickness: f64,
    /// Slab thickness given to freshly created planar viewports.
    pub initial_slab_thickness: f64,
    pub volume_property: VolumePropertyConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            voi_throttle_ms: 16,
            slab_step: 3.0,
            min_slab_thickness: 0.1,
            initial_slab_thickness: 0.1,
            volume_property: VolumePropertyConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn voi_throttle_interval(&self) -> Duration {
        Duration::from_millis(self.voi_throttle_ms)
    }
}

/// Shading and sampling coefficients for volume render objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumePropertyConfig {
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub specular_power: f64,
    pub scalar_opacity_unit_distance: f64,
    pub gradient_opacity_min_value: f64,
    pub gradient_opacity_max_value: f64,
    pub max_samples_per_ray: u32,
}

impl Default for VolumePropertyConfig {
    fn default() -> Self {
        Self {
            ambient: 0.2,
            diffuse: 0.7,
            specular: 0.3,
            specular_power: 8.0,
            scalar_opacity_unit_distance: 0.5,
            gradient_opacity_min_value: 15.0,
            gradient_opacity_max_value: 100.0,
            max_samples_per_ray: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ViewerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.voi_throttle_interval(), Duration::from_millis(16));
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = ViewerConfig::from_toml_str(
            r#"
            voi_throttle_ms = 33
            slab_step = 1.5

            [volume_property]
            max_samples_per_ray = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.voi_throttle_ms, 33);
        assert_eq!(config.slab_step, 1.5);
        assert_eq!(config.min_slab_thickness, 0.1);
        assert_eq!(config.volume_property.max_samples_per_ray, 1000);
        assert_eq!(config.volume_property.ambient, 0.2);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(ViewerConfig::from_toml_str("voi_throttle_ms = \"fast\"").is_err());
    }
}
