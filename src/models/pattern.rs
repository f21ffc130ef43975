//! # 测量谱数据模型
//!
//! 精修模型只读取这些数据，从不修改。
//!
//! - `Spectrum`: 一条谱 (x = d 间距, y = 强度, e = 误差，可选)
//! - `Pattern1D`: 单谱衍射图
//! - `Pattern2D`: 多谱衍射图，每条谱对应一个散射角 2θ，共享 d 间距范围
//!
//! ## 依赖关系
//! - 被 `pawley/`、`parsers/pattern.rs`、`report/` 使用

use crate::error::{PawleyError, Result};

use serde::{Deserialize, Serialize};

/// 单条谱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<Vec<f64>>,
}

impl Spectrum {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(PawleyError::DataError(format!(
                "x and y have different lengths ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(PawleyError::DataError("Spectrum has no points".to_string()));
        }
        Ok(Spectrum { x, y, e: None })
    }

    pub fn with_errors(mut self, e: Vec<f64>) -> Result<Self> {
        if e.len() != self.x.len() {
            return Err(PawleyError::DataError(format!(
                "Error column has {} points, expected {}",
                e.len(),
                self.x.len()
            )));
        }
        self.e = Some(e);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// (x_min, x_max)
    pub fn x_range(&self) -> (f64, f64) {
        let lo = self.x.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lo, hi)
    }

    /// 只保留 x ∈ [x_min, x_max] 的点
    pub fn crop(&self, x_min: f64, x_max: f64) -> Result<Spectrum> {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.x[i] >= x_min && self.x[i] <= x_max)
            .collect();
        if keep.is_empty() {
            return Err(PawleyError::DataError(format!(
                "No data points in range [{}, {}]",
                x_min, x_max
            )));
        }
        Ok(Spectrum {
            x: keep.iter().map(|&i| self.x[i]).collect(),
            y: keep.iter().map(|&i| self.y[i]).collect(),
            e: self
                .e
                .as_ref()
                .map(|e| keep.iter().map(|&i| e[i]).collect()),
        })
    }
}

/// 单谱衍射图
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern1D {
    pub name: String,
    pub spectrum: Spectrum,
}

impl Pattern1D {
    pub fn new(name: &str, spectrum: Spectrum) -> Self {
        Pattern1D {
            name: name.to_string(),
            spectrum,
        }
    }

    pub fn from_xy(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        Ok(Self::new("pattern", Spectrum::new(x, y)?))
    }

    pub fn x(&self) -> &[f64] {
        &self.spectrum.x
    }

    pub fn y(&self) -> &[f64] {
        &self.spectrum.y
    }

    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }
}

/// 多谱衍射图
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern2D {
    pub name: String,
    spectra: Vec<Spectrum>,
    /// 散射角 2θ（度）
    two_theta: Vec<f64>,
}

impl Pattern2D {
    pub fn new(name: &str, spectra: Vec<Spectrum>, two_theta: Vec<f64>) -> Result<Self> {
        if spectra.is_empty() {
            return Err(PawleyError::DataError("2D pattern has no spectra".to_string()));
        }
        if spectra.len() != two_theta.len() {
            return Err(PawleyError::DataError(format!(
                "{} spectra but {} scattering angles",
                spectra.len(),
                two_theta.len()
            )));
        }
        if let Some(tth) = two_theta.iter().find(|t| !(**t > 0.0 && **t < 180.0)) {
            return Err(PawleyError::DataError(format!(
                "Scattering angle 2θ = {} is outside (0, 180)",
                tth
            )));
        }
        Ok(Pattern2D {
            name: name.to_string(),
            spectra,
            two_theta,
        })
    }

    pub fn nspec(&self) -> usize {
        self.spectra.len()
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn spectrum(&self, index: usize) -> Option<&Spectrum> {
        self.spectra.get(index)
    }

    pub fn two_theta(&self) -> &[f64] {
        &self.two_theta
    }

    /// 总点数
    pub fn npoints(&self) -> usize {
        self.spectra.iter().map(Spectrum::len).sum()
    }

    /// 所有谱的 d 范围并集
    pub fn x_range(&self) -> (f64, f64) {
        self.spectra
            .iter()
            .map(Spectrum::x_range)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                (lo.min(a), hi.max(b))
            })
    }

    /// 各谱在同一 d 网格上时，按点求和得到聚焦后的 1D 谱
    pub fn focus(&self) -> Result<Pattern1D> {
        let first = &self.spectra[0];
        if self.spectra.iter().any(|s| s.x != first.x) {
            return Err(PawleyError::DataError(
                "Spectra do not share a common d-spacing grid".to_string(),
            ));
        }
        let mut y = vec![0.0; first.len()];
        for s in &self.spectra {
            for (acc, v) in y.iter_mut().zip(&s.y) {
                *acc += v;
            }
        }
        Ok(Pattern1D::new(
            &format!("{}_focused", self.name),
            Spectrum::new(first.x.clone(), y)?,
        ))
    }
}
