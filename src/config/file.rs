//! TOML 配置文件的原始结构；所有字段可选，未知字段报错

use crate::error::{PawleyError, Result};
use crate::profile::ResolutionModel;

use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileFitSection {
    pub max_nfev: Option<usize>,
    pub refine_lattice: Option<bool>,
    pub d_min: Option<f64>,
    pub d_max: Option<f64>,
    pub profile: Option<String>,
    pub estimate: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileBackgroundSection {
    pub kind: Option<String>,
    pub order: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileMultiSection {
    pub global_scale: Option<bool>,
    pub lambda_max: Option<f64>,
}

/// 配置文件
///
/// ```toml
/// [resolution]
/// sig = [0.0, 1.1e-6, 0.0]
/// mix = [0.3, 0.0, 0.0]
///
/// [fit]
/// max_nfev = 400
/// refine_lattice = true
/// d_min = 0.8
/// d_max = 3.5
/// profile = "pv"
///
/// [background]
/// kind = "chebyshev"
/// order = 3
///
/// [multi]
/// global_scale = true
/// lambda_max = 4.5
/// ```
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub resolution: Option<ResolutionModel>,
    pub fit: Option<FileFitSection>,
    pub background: Option<FileBackgroundSection>,
    pub multi: Option<FileMultiSection>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from file: {:?}", path);
        if !path.exists() {
            return Err(PawleyError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| PawleyError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(FileConfig::from_str("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_sections() {
        let cfg = FileConfig::from_str(
            r#"
            [resolution]
            sig = [0.0, 2.0e-6, 0.0]

            [fit]
            max_nfev = 50
            refine_lattice = true

            [background]
            kind = "polynomial"
            order = 2
            "#,
        )
        .unwrap();

        let res = cfg.resolution.unwrap();
        assert_eq!(res.sig, [0.0, 2.0e-6, 0.0]);
        assert_eq!(res.mix, [0.0; 3]);
        let fit = cfg.fit.unwrap();
        assert_eq!(fit.max_nfev, Some(50));
        assert_eq!(fit.refine_lattice, Some(true));
        assert_eq!(fit.d_min, None);
        assert_eq!(cfg.background.unwrap().order, Some(2));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(FileConfig::from_str("[fit]\nmaxnfev = 3\n").is_err());
        assert!(FileConfig::from_str("[solver]\n").is_err());
    }
}
