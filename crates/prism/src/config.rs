//! Model configuration loaded from TOML.

use std::path::Path;

use prism_math::Tolerance;
use prism_tessellate::TessellationParams;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Settings shared by every operation of a [`Model`](crate::Model).
///
/// ```toml
/// [tessellation]
/// flatness = 0.005
/// max_segments = 128
///
/// [tolerance]
/// linear = 1e-6
/// ```
///
/// Missing sections and keys fall back to their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// View-list density.
    pub tessellation: TessellationParams,
    /// Geometric comparison tolerances.
    pub tolerance: Tolerance,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelError;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_toml_str("[tessellation]\nflatness = 0.5\n").unwrap();
        assert_eq!(config.tessellation.flatness, 0.5);
        assert_eq!(config.tessellation.max_segments, 64);
        assert_eq!(config.tolerance, Tolerance::DEFAULT);
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_file_round_trip() {
        let mut config = Config::default();
        config.tolerance.linear = 1e-4;
        config.tessellation.max_segments = 12;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.toml");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_values_are_reported() {
        let err = Config::from_toml_str("[tessellation]\nmax_segments = \"many\"\n").unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
        let missing = Config::load("/nonexistent/prism.toml").unwrap_err();
        assert!(matches!(missing, ModelError::Io(_)));
    }
}
