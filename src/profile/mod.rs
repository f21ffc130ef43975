//! # 峰形模型
//!
//! 将 d 间距映射为峰形参数，并计算面积归一化的峰。
//!
//! ## 变体
//! - `Gaussian`: `{"Sigma": sigma(d)}`
//! - `PseudoVoigt`: `{"FWHM": 2·sqrt(2·ln2)·sigma(d), "Mixing": mix(d)}`
//!
//! 峰形本身的参数就是分辨率模型的多项式系数，精修时始终固定；
//! 峰的积分强度属于精修模型，不在这里。
//!
//! ## 子模块
//! - `resolution`: 分辨率模型 sigma(d)、mix(d)
//! - `shapes`: 高斯、洛伦兹、pseudo-Voigt 函数
//!
//! ## 依赖关系
//! - 被 `pawley/` 使用

pub mod resolution;
pub mod shapes;

pub use resolution::ResolutionModel;

use crate::error::{PawleyError, Result};

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// 具名峰形参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakParams(BTreeMap<String, f64>);

impl PeakParams {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl Index<&str> for PeakParams {
    type Output = f64;

    fn index(&self, name: &str) -> &f64 {
        &self.0[name]
    }
}

/// 高斯峰形
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GaussianProfile {
    resolution: ResolutionModel,
}

impl GaussianProfile {
    pub fn new(resolution: ResolutionModel) -> Self {
        GaussianProfile { resolution }
    }

    pub fn func_name(&self) -> &'static str {
        "Gaussian"
    }

    pub fn get_mantid_peak_params(&self, d: f64) -> PeakParams {
        let mut params = PeakParams::default();
        params.insert("Sigma", self.resolution.sigma(d));
        params
    }

    pub fn resolution(&self) -> &ResolutionModel {
        &self.resolution
    }
}

/// Pseudo-Voigt 峰形
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PVProfile {
    resolution: ResolutionModel,
}

impl PVProfile {
    pub fn new(resolution: ResolutionModel) -> Self {
        PVProfile { resolution }
    }

    pub fn func_name(&self) -> &'static str {
        "PseudoVoigt"
    }

    pub fn get_mantid_peak_params(&self, d: f64) -> PeakParams {
        let mut params = PeakParams::default();
        params.insert("FWHM", shapes::fwhm_from_sigma(self.resolution.sigma(d)));
        params.insert("Mixing", self.resolution.mix(d));
        params
    }

    pub fn resolution(&self) -> &ResolutionModel {
        &self.resolution
    }
}

/// 峰形（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakProfile {
    Gaussian(GaussianProfile),
    PseudoVoigt(PVProfile),
}

impl Default for PeakProfile {
    fn default() -> Self {
        PeakProfile::Gaussian(GaussianProfile::default())
    }
}

impl fmt::Display for PeakProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.func_name())
    }
}

impl PeakProfile {
    /// 按名称创建（`gaussian` / `pv` / `pseudovoigt`，不区分大小写）
    pub fn from_name(name: &str, resolution: ResolutionModel) -> Result<Self> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "gaussian" | "gauss" => Ok(PeakProfile::Gaussian(GaussianProfile::new(resolution))),
            "pv" | "pseudovoigt" => Ok(PeakProfile::PseudoVoigt(PVProfile::new(resolution))),
            _ => Err(PawleyError::ConfigurationError(format!(
                "Unknown peak profile '{}'. Expected 'gaussian' or 'pv'",
                name
            ))),
        }
    }

    pub fn func_name(&self) -> &'static str {
        match self {
            PeakProfile::Gaussian(p) => p.func_name(),
            PeakProfile::PseudoVoigt(p) => p.func_name(),
        }
    }

    pub fn get_mantid_peak_params(&self, d: f64) -> PeakParams {
        match self {
            PeakProfile::Gaussian(p) => p.get_mantid_peak_params(d),
            PeakProfile::PseudoVoigt(p) => p.get_mantid_peak_params(d),
        }
    }

    pub fn resolution(&self) -> &ResolutionModel {
        match self {
            PeakProfile::Gaussian(p) => p.resolution(),
            PeakProfile::PseudoVoigt(p) => p.resolution(),
        }
    }

    pub fn param_names(&self) -> Vec<String> {
        let names: &[&str] = match self {
            PeakProfile::Gaussian(_) => &["sig0", "sig1", "sig2"],
            PeakProfile::PseudoVoigt(_) => &["sig0", "sig1", "sig2", "eta0", "eta1", "eta2"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    pub fn nparams(&self) -> usize {
        match self {
            PeakProfile::Gaussian(_) => 3,
            PeakProfile::PseudoVoigt(_) => 6,
        }
    }

    /// 峰形参数全部由分辨率模型锁定
    pub fn nparams_free(&self) -> usize {
        0
    }

    pub fn nparams_locked(&self) -> usize {
        self.nparams() - self.nparams_free()
    }

    pub fn params(&self) -> Vec<f64> {
        let res = self.resolution();
        match self {
            PeakProfile::Gaussian(_) => res.sig.to_vec(),
            PeakProfile::PseudoVoigt(_) => res.sig.iter().chain(&res.mix).copied().collect(),
        }
    }

    pub fn set_params(&mut self, params: &[f64]) -> Result<()> {
        let resolution = self.resolution_from(params)?;
        match self {
            PeakProfile::Gaussian(p) => p.resolution = resolution,
            PeakProfile::PseudoVoigt(p) => p.resolution = resolution,
        }
        Ok(())
    }

    /// 由参数向量构造分辨率模型（不修改自身）
    pub fn resolution_from(&self, params: &[f64]) -> Result<ResolutionModel> {
        if params.len() != self.nparams() {
            return Err(PawleyError::ConfigurationError(format!(
                "{} profile expects {} parameters, got {}",
                self.func_name(),
                self.nparams(),
                params.len()
            )));
        }
        let sig = [params[0], params[1], params[2]];
        let mix = match self {
            PeakProfile::Gaussian(p) => p.resolution.mix,
            PeakProfile::PseudoVoigt(_) => [params[3], params[4], params[5]],
        };
        Ok(ResolutionModel::new(sig, mix))
    }

    /// 在 x 上累加一个中心为 `centre`、积分强度为 `area` 的峰，
    /// 峰宽由 `resolution` 在峰位处给出
    pub fn add_peak(
        &self,
        resolution: &ResolutionModel,
        centre: f64,
        area: f64,
        x: &[f64],
        out: &mut [f64],
    ) {
        let sigma = resolution.sigma(centre);
        match self {
            PeakProfile::Gaussian(_) => {
                for (xi, yi) in x.iter().zip(out.iter_mut()) {
                    *yi += shapes::gaussian(*xi, centre, area, sigma);
                }
            }
            PeakProfile::PseudoVoigt(_) => {
                let fwhm = shapes::fwhm_from_sigma(sigma);
                let eta = resolution.mix(centre);
                for (xi, yi) in x.iter().zip(out.iter_mut()) {
                    *yi += shapes::pseudo_voigt(*xi, centre, area, fwhm, eta);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::LN_2;

    #[test]
    fn test_gaussian_sigma() {
        let profile = GaussianProfile::default();
        let params = profile.get_mantid_peak_params(1.5);
        assert!((params["Sigma"] - 0.00158).abs() < 1e-5);
        assert_eq!(params.len(), 1);
        assert_eq!(profile.func_name(), "Gaussian");
    }

    #[test]
    fn test_pseudo_voigt_params() {
        let profile = PVProfile::default();
        let params = profile.get_mantid_peak_params(1.5);
        let expected = 2.0 * (2.0 * LN_2).sqrt() * 0.00158;
        assert!((params["FWHM"] - expected).abs() < 1e-5);
        assert!(params["Mixing"].abs() < 1e-8);
    }

    #[test]
    fn test_free_and_locked_counts() {
        let gauss = PeakProfile::Gaussian(GaussianProfile::default());
        let pv = PeakProfile::PseudoVoigt(PVProfile::default());
        assert_eq!(gauss.nparams_free(), 0);
        assert_eq!(gauss.nparams_locked(), 3);
        assert_eq!(pv.nparams_locked(), 6);
        assert_eq!(pv.params().len(), pv.param_names().len());
    }

    #[test]
    fn test_set_params_round_trip() {
        let mut pv = PeakProfile::from_name("pv", ResolutionModel::reference()).unwrap();
        let new = [1e-8, 2e-6, 0.0, 0.1, 0.0, 0.0];
        pv.set_params(&new).unwrap();
        assert_eq!(pv.params(), new.to_vec());
        assert!((pv.resolution().mix(1.0) - 0.1).abs() < 1e-12);
        assert!(pv.set_params(&[0.0]).is_err());
    }

    #[test]
    fn test_injected_resolution() {
        let res = ResolutionModel::new([0.0, 1e-6, 0.0], [0.0; 3]);
        let profile = PeakProfile::Gaussian(GaussianProfile::new(res));
        let sigma = profile.get_mantid_peak_params(2.0)["Sigma"];
        assert!((sigma - 2e-3).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_profile_name() {
        assert!(PeakProfile::from_name("lorentz", ResolutionModel::default()).is_err());
        assert!(PeakProfile::from_name("Pseudo-Voigt", ResolutionModel::default()).is_ok());
    }
}
