//! Run configuration.
//!
//! A [`ContourConfig`] can be written as YAML; every field is optional:
//!
//! ```yaml
//! step: 10
//! unit: feet
//! rdp_epsilon: 0.00005
//! max_nodes_per_tile: 1000000
//! area: "6:43:8:45"
//! sources: [srtm1, view3]
//! data_dir: /var/lib/hgt
//! ```

use crate::area::Area;
use crate::loader::{ElevationUnit, LoadOptions};
use crate::sources::{PriorityResolver, SourcePool, SourceSpec};
use crate::tiling::TilingOptions;
use crate::{DemError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of a contour extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContourConfig {
    /// Elevation difference between contour levels, in `unit`.
    pub step: f64,
    pub unit: ElevationUnit,
    /// Douglas-Peucker tolerance in degrees; unset keeps every vertex.
    pub rdp_epsilon: Option<f64>,
    /// 0 disables tile splitting.
    pub max_nodes_per_tile: usize,
    pub smooth_ratio: usize,
    pub extra_border_lon: usize,
    pub extra_border_lat: usize,
    pub void_range_max: Option<f32>,
    pub area: Option<Area>,
    /// Sources in priority order.
    pub sources: Vec<SourceSpec>,
    /// Root of the `<NAME><res>/` source directories.
    pub data_dir: PathBuf,
    /// Osmosis `.poly` file with the clip polygons.
    pub polygon_file: Option<PathBuf>,
}

impl Default for ContourConfig {
    fn default() -> Self {
        ContourConfig {
            step: 20.0,
            unit: ElevationUnit::Meters,
            rdp_epsilon: None,
            max_nodes_per_tile: 1_000_000,
            smooth_ratio: 1,
            extra_border_lon: 0,
            extra_border_lat: 0,
            void_range_max: None,
            area: None,
            sources: Vec::new(),
            data_dir: PathBuf::from("hgt"),
            polygon_file: None,
        }
    }
}

impl ContourConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ContourConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check value ranges serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(DemError::InvalidOption(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if self.smooth_ratio == 0 {
            return Err(DemError::InvalidOption(
                "smooth_ratio must be at least 1".to_string(),
            ));
        }
        if let Some(eps) = self.rdp_epsilon {
            if !eps.is_finite() || eps < 0.0 {
                return Err(DemError::InvalidOption(format!(
                    "rdp_epsilon must be non-negative, got {}",
                    eps
                )));
            }
        }
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            extra_border_lon: self.extra_border_lon,
            extra_border_lat: self.extra_border_lat,
            smooth_ratio: self.smooth_ratio,
            void_range_max: self.void_range_max,
            unit: self.unit,
        }
    }

    pub fn tiling_options(&self) -> TilingOptions {
        TilingOptions {
            max_nodes_per_tile: self.max_nodes_per_tile,
            area: self.area,
        }
    }

    /// Directory sources for every configured source name.
    pub fn source_pool(&self) -> SourcePool {
        SourcePool::with_directory_sources(&self.data_dir, self.sources.iter().map(|s| s.name()))
    }

    /// Resolver trying the configured sources in order.
    pub fn resolver(&self) -> Result<PriorityResolver> {
        self.source_pool().resolver(&self.sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::TileResolver;

    #[test]
    fn test_defaults() {
        let config = ContourConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ContourConfig::default());
        assert_eq!(config.step, 20.0);
        assert_eq!(config.load_options(), LoadOptions::default());
        assert!(config.resolver().unwrap().is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
step: 10
unit: feet
rdp_epsilon: 0.0001
max_nodes_per_tile: 0
area: "6.2:43.1:7.1:43.8"
sources: [sonn3, view1]
data_dir: /data/hgt
"#;
        let config = ContourConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.step, 10.0);
        assert_eq!(config.unit, ElevationUnit::Feet);
        assert_eq!(config.rdp_epsilon, Some(0.0001));
        assert_eq!(config.tiling_options().max_nodes_per_tile, 0);
        assert_eq!(
            config.tiling_options().area,
            Some("6.2:43.1:7.1:43.8".parse().unwrap())
        );
        let names: Vec<String> = config.sources.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["sonn3", "view1"]);
        assert_eq!(config.resolver().unwrap().len(), 2);
        assert_eq!(
            config.source_pool().available_source_names(),
            vec!["sonn", "view"]
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ContourConfig::from_yaml_str("step: 0"),
            Err(DemError::InvalidOption(_))
        ));
        assert!(matches!(
            ContourConfig::from_yaml_str("smooth_ratio: 0"),
            Err(DemError::InvalidOption(_))
        ));
        assert!(matches!(
            ContourConfig::from_yaml_str("area: \"3:2:1:4\""),
            Err(DemError::Config(_))
        ));
        assert!(matches!(
            ContourConfig::from_yaml_str("sources: [srtm2]"),
            Err(DemError::Config(_))
        ));
        assert!(matches!(
            ContourConfig::from_yaml_str("colour: red"),
            Err(DemError::Config(_))
        ));
    }
}
