//! # 精修配置
//!
//! 配置来源按优先级：命令行参数 > TOML 配置文件 > 默认值。
//! `FileConfig` 是文件中的原始内容（全部可选），`FitConfig` 是合并后的结果。
//!
//! ## 依赖关系
//! - 被 `commands/`、`batch/` 使用
//! - 使用 `serde` + `toml` 读取配置文件

mod file;

pub use file::{FileBackgroundSection, FileConfig, FileFitSection, FileMultiSection};

use crate::background::Background;
use crate::error::{PawleyError, Result};
use crate::profile::{PeakProfile, ResolutionModel};

use std::path::Path;

/// 默认 d 间距范围（Å），数据范围更窄时取交集
pub const DEFAULT_D_MIN: f64 = 0.5;
pub const DEFAULT_D_MAX: f64 = 5.0;

/// 背底类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    Flat,
    Polynomial,
    Chebyshev,
}

impl BackgroundKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "flat" | "constant" => Ok(BackgroundKind::Flat),
            "polynomial" | "poly" => Ok(BackgroundKind::Polynomial),
            "chebyshev" | "cheb" => Ok(BackgroundKind::Chebyshev),
            other => Err(PawleyError::ConfigurationError(format!(
                "Unknown background kind '{}' (expected flat, polynomial or chebyshev)",
                other
            ))),
        }
    }
}

/// 背底设置；Chebyshev 的定义域要等拿到数据后才能确定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundSpec {
    pub kind: BackgroundKind,
    pub order: usize,
}

impl BackgroundSpec {
    pub fn build(&self, x: &[f64]) -> Result<Background> {
        match self.kind {
            BackgroundKind::Flat => Ok(Background::Flat),
            BackgroundKind::Polynomial => Ok(Background::Polynomial { order: self.order }),
            BackgroundKind::Chebyshev => Background::chebyshev(self.order, x),
        }
    }
}

/// 命令行给出的覆盖项
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub max_nfev: Option<usize>,
    pub refine_lattice: Option<bool>,
    pub d_min: Option<f64>,
    pub d_max: Option<f64>,
    pub profile: Option<String>,
    pub background: Option<String>,
    pub bg_order: Option<usize>,
    pub no_estimate: bool,
    pub global_scale: Option<bool>,
    pub lambda_max: Option<f64>,
}

/// 合并后的精修配置
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub resolution: ResolutionModel,
    pub profile: String,
    pub max_nfev: Option<usize>,
    pub refine_lattice: bool,
    pub d_min: Option<f64>,
    pub d_max: Option<f64>,
    pub background: Option<BackgroundSpec>,
    /// 拟合前是否估计初始强度
    pub estimate: bool,
    pub global_scale: bool,
    pub lambda_max: Option<f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            resolution: ResolutionModel::reference(),
            profile: "gaussian".to_string(),
            max_nfev: None,
            refine_lattice: false,
            d_min: None,
            d_max: None,
            background: None,
            estimate: true,
            global_scale: true,
            lambda_max: None,
        }
    }
}

impl FitConfig {
    /// 读取可选的配置文件并应用命令行覆盖
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let file = match path {
            Some(p) => FileConfig::from_file(p)?,
            None => FileConfig::default(),
        };
        Self::merge(file, overrides)
    }

    pub fn merge(file: FileConfig, overrides: &ConfigOverrides) -> Result<Self> {
        let defaults = FitConfig::default();
        let fit = file.fit.unwrap_or_default();
        let bg = file.background.unwrap_or_default();
        let multi = file.multi.unwrap_or_default();

        let bg_kind = overrides.background.clone().or(bg.kind);
        let background = match bg_kind.as_deref() {
            None | Some("none") => None,
            Some(name) => Some(BackgroundSpec {
                kind: BackgroundKind::from_name(name)?,
                order: overrides.bg_order.or(bg.order).unwrap_or(0),
            }),
        };

        let config = FitConfig {
            resolution: file.resolution.unwrap_or(defaults.resolution),
            profile: overrides
                .profile
                .clone()
                .or(fit.profile)
                .unwrap_or(defaults.profile),
            max_nfev: overrides.max_nfev.or(fit.max_nfev),
            refine_lattice: overrides
                .refine_lattice
                .or(fit.refine_lattice)
                .unwrap_or(defaults.refine_lattice),
            d_min: overrides.d_min.or(fit.d_min),
            d_max: overrides.d_max.or(fit.d_max),
            background,
            estimate: !overrides.no_estimate && fit.estimate.unwrap_or(defaults.estimate),
            global_scale: overrides
                .global_scale
                .or(multi.global_scale)
                .unwrap_or(defaults.global_scale),
            lambda_max: overrides.lambda_max.or(multi.lambda_max),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(n) = self.max_nfev {
            if n == 0 {
                return Err(PawleyError::ConfigurationError(
                    "max_nfev must be at least 1".to_string(),
                ));
            }
        }
        if let (Some(lo), Some(hi)) = (self.d_min, self.d_max) {
            if lo >= hi {
                return Err(PawleyError::ConfigurationError(format!(
                    "d_min ({}) must be smaller than d_max ({})",
                    lo, hi
                )));
            }
        }
        if let Some(l) = self.lambda_max {
            if l <= 0.0 {
                return Err(PawleyError::ConfigurationError(format!(
                    "lambda_max must be positive, got {}",
                    l
                )));
            }
        }
        self.peak_profile().map(|_| ())
    }

    pub fn peak_profile(&self) -> Result<PeakProfile> {
        PeakProfile::from_name(&self.profile, self.resolution)
    }

    /// d 范围：配置值优先，否则取数据范围与默认范围的交集
    pub fn d_limits(&self, data_range: (f64, f64)) -> (f64, f64) {
        let d_min = self
            .d_min
            .unwrap_or_else(|| data_range.0.max(DEFAULT_D_MIN));
        let d_max = self
            .d_max
            .unwrap_or_else(|| data_range.1.min(DEFAULT_D_MAX));
        (d_min, d_max)
    }

    pub fn build_background(&self, x: &[f64]) -> Result<Option<Background>> {
        self.background.map(|spec| spec.build(x)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = FitConfig::merge(FileConfig::default(), &ConfigOverrides::default()).unwrap();
        assert_eq!(cfg, FitConfig::default());
        assert!(cfg.build_background(&[1.0, 2.0]).unwrap().is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig::from_str(
            "[fit]\nmax_nfev = 20\nprofile = \"pv\"\n[background]\nkind = \"flat\"\n",
        )
        .unwrap();
        let overrides = ConfigOverrides {
            max_nfev: Some(5),
            background: Some("polynomial".to_string()),
            bg_order: Some(2),
            ..Default::default()
        };
        let cfg = FitConfig::merge(file, &overrides).unwrap();
        assert_eq!(cfg.max_nfev, Some(5));
        assert_eq!(cfg.profile, "pv");
        assert_eq!(
            cfg.background,
            Some(BackgroundSpec {
                kind: BackgroundKind::Polynomial,
                order: 2
            })
        );
    }

    #[test]
    fn test_validation() {
        let bad = |o: ConfigOverrides| FitConfig::merge(FileConfig::default(), &o).is_err();
        assert!(bad(ConfigOverrides {
            max_nfev: Some(0),
            ..Default::default()
        }));
        assert!(bad(ConfigOverrides {
            d_min: Some(3.0),
            d_max: Some(2.0),
            ..Default::default()
        }));
        assert!(bad(ConfigOverrides {
            profile: Some("lorentz".to_string()),
            ..Default::default()
        }));
        assert!(bad(ConfigOverrides {
            background: Some("spline".to_string()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_d_limits() {
        let cfg = FitConfig::default();
        assert_eq!(cfg.d_limits((0.3, 3.0)), (DEFAULT_D_MIN, 3.0));
        let cfg = FitConfig {
            d_min: Some(1.0),
            ..FitConfig::default()
        };
        assert_eq!(cfg.d_limits((0.3, 3.0)), (1.0, 3.0));
    }

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "[fit]\nrefine_lattice = true\n[multi]\nlambda_max = 4.0").unwrap();
        let cfg = FitConfig::load(Some(f.path()), &ConfigOverrides::default()).unwrap();
        assert!(cfg.refine_lattice);
        assert_eq!(cfg.lambda_max, Some(4.0));

        let missing = FitConfig::load(Some(Path::new("/nonexistent.toml")), &ConfigOverrides::default());
        assert!(matches!(missing, Err(PawleyError::FileNotFound { .. })));
    }
}
