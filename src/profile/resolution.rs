//! # 仪器分辨率模型
//!
//! 峰宽与峰形混合系数随 d 间距的变化：
//!
//! ```text
//! sigma(d) = sqrt(sig0 + sig1·d² + sig2·d⁴)
//! mix(d)   = clamp(eta0 + eta1·d + eta2·d², 0, 1)
//! ```
//!
//! 系数是仪器标定常数，可由 TOML 配置的 `[resolution]` 段注入。
//!
//! ## 依赖关系
//! - 被 `profile/mod.rs`、`config/` 使用
//! - 使用 `serde` 反序列化

use serde::{Deserialize, Serialize};

/// 参考仪器在 d = 1.5 Å 处的高斯 sigma
const REFERENCE_SIGMA_AT_1P5: f64 = 0.00158;

/// 分辨率模型
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionModel {
    /// sigma² 的多项式系数 [sig0, sig1, sig2]（d 的 0、2、4 次）
    pub sig: [f64; 3],
    /// 混合系数的多项式系数 [eta0, eta1, eta2]
    #[serde(default)]
    pub mix: [f64; 3],
}

impl ResolutionModel {
    pub fn new(sig: [f64; 3], mix: [f64; 3]) -> Self {
        ResolutionModel { sig, mix }
    }

    /// 参考仪器：sigma 与 d 成正比，sigma(1.5) = 0.00158，纯高斯
    pub fn reference() -> Self {
        let slope = REFERENCE_SIGMA_AT_1P5 / 1.5;
        ResolutionModel {
            sig: [0.0, slope * slope, 0.0],
            mix: [0.0; 3],
        }
    }

    /// 高斯标准差
    pub fn sigma(&self, d: f64) -> f64 {
        let d2 = d * d;
        (self.sig[0] + self.sig[1] * d2 + self.sig[2] * d2 * d2)
            .max(0.0)
            .sqrt()
    }

    /// 洛伦兹分量占比，限制在 [0, 1]
    pub fn mix(&self, d: f64) -> f64 {
        (self.mix[0] + self.mix[1] * d + self.mix[2] * d * d).clamp(0.0, 1.0)
    }
}

impl Default for ResolutionModel {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_instrument() {
        let res = ResolutionModel::reference();
        assert!((res.sigma(1.5) - 0.00158).abs() < 1e-12);
        assert!((res.sigma(3.0) - 0.00316).abs() < 1e-12);
        assert_eq!(res.mix(1.5), 0.0);
    }

    #[test]
    fn test_sigma_monotonic() {
        let res = ResolutionModel::new([1e-8, 2e-7, 1e-9], [0.0; 3]);
        let values: Vec<f64> = (1..50).map(|i| res.sigma(i as f64 * 0.1)).collect();
        assert!(values.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_mix_is_clamped() {
        let res = ResolutionModel::new([0.0; 3], [-0.5, 0.4, 0.0]);
        assert_eq!(res.mix(0.5), 0.0);
        assert!((res.mix(2.0) - 0.3).abs() < 1e-12);
        assert_eq!(res.mix(10.0), 1.0);
    }

    #[test]
    fn test_deserialize_from_toml() {
        let res: ResolutionModel = toml::from_str("sig = [0.0, 1e-6, 0.0]").unwrap();
        assert_eq!(res.mix, [0.0; 3]);
        assert!(toml::from_str::<ResolutionModel>("sig = [0.0, 0.0, 0.0]\nwidth = 1").is_err());
    }
}
