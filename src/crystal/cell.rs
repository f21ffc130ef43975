//! # 晶胞与 d 间距
//!
//! 晶格参数 (a, b, c, α, β, γ) 的表示，以及度量张量、倒易度量张量和
//! d 间距的计算。
//!
//! ## 公式
//! 1/d² = h · G* · hᵀ，其中 G* 为倒易度量张量 (G 的逆矩阵)
//!
//! ## 依赖关系
//! - 被 `crystal/constraints.rs`、`phase.rs` 使用
//! - 使用 `nalgebra` 计算度量张量的逆

use crate::crystal::Hkl;
use crate::error::{PawleyError, Result};

use nalgebra::{Matrix3, Vector3};

/// 晶胞参数
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCell {
    a: f64,
    b: f64,
    c: f64,
    /// 角度单位：度
    alpha: f64,
    beta: f64,
    gamma: f64,
    /// 倒易度量张量（构造时缓存）
    recip_metric: Matrix3<f64>,
}

impl UnitCell {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶胞
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        for (name, v) in [("a", a), ("b", b), ("c", c)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(PawleyError::ConfigurationError(format!(
                    "Lattice length {} must be positive, got {}",
                    name, v
                )));
            }
        }
        for (name, v) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !v.is_finite() || v <= 0.0 || v >= 180.0 {
                return Err(PawleyError::ConfigurationError(format!(
                    "Lattice angle {} must lie in (0, 180) degrees, got {}",
                    name, v
                )));
            }
        }

        let mut cell = UnitCell {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            recip_metric: Matrix3::identity(),
        };

        if cell.volume_factor() <= 1e-12 {
            return Err(PawleyError::ConfigurationError(format!(
                "Degenerate cell angles ({}, {}, {})",
                alpha, beta, gamma
            )));
        }

        cell.recip_metric = cell.metric_tensor().try_inverse().ok_or_else(|| {
            PawleyError::ConfigurationError("Metric tensor is singular".to_string())
        })?;

        Ok(cell)
    }

    /// 从晶格向量矩阵创建（行向量表示 a, b, c）
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Result<Self> {
        let a_vec = Vector3::from(matrix[0]);
        let b_vec = Vector3::from(matrix[1]);
        let c_vec = Vector3::from(matrix[2]);

        let a = a_vec.norm();
        let b = b_vec.norm();
        let c = c_vec.norm();
        if a == 0.0 || b == 0.0 || c == 0.0 {
            return Err(PawleyError::ConfigurationError(
                "Lattice vectors must be non-zero".to_string(),
            ));
        }

        let alpha = (b_vec.dot(&c_vec) / (b * c)).acos().to_degrees();
        let beta = (a_vec.dot(&c_vec) / (a * c)).acos().to_degrees();
        let gamma = (a_vec.dot(&b_vec) / (a * b)).acos().to_degrees();

        Self::from_parameters(a, b, c, alpha, beta, gamma)
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        (self.a, self.b, self.c, self.alpha, self.beta, self.gamma)
    }

    pub fn lengths(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    pub fn angles(&self) -> [f64; 3] {
        [self.alpha, self.beta, self.gamma]
    }

    /// 晶格向量矩阵，a 沿 x，b 在 xy 平面内
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        let cos_alpha = self.alpha.to_radians().cos();
        let cos_beta = self.beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = self.gamma.to_radians().sin_cos();

        let a_vec = [self.a, 0.0, 0.0];
        let b_vec = [self.b * cos_gamma, self.b * sin_gamma, 0.0];

        let c1 = self.c * cos_beta;
        let c2 = self.c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (self.c * self.c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        [a_vec, b_vec, [c1, c2, c3]]
    }

    /// 1 - cos²α - cos²β - cos²γ + 2 cosα cosβ cosγ
    fn volume_factor(&self) -> f64 {
        let ca = self.alpha.to_radians().cos();
        let cb = self.beta.to_radians().cos();
        let cg = self.gamma.to_radians().cos();
        1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg
    }

    /// 计算晶胞体积 (Å³)
    pub fn volume(&self) -> f64 {
        self.a * self.b * self.c * self.volume_factor().max(0.0).sqrt()
    }

    /// 度量张量 G_ij = a_i · a_j
    pub fn metric_tensor(&self) -> Matrix3<f64> {
        let ca = self.alpha.to_radians().cos();
        let cb = self.beta.to_radians().cos();
        let cg = self.gamma.to_radians().cos();
        Matrix3::new(
            self.a * self.a,
            self.a * self.b * cg,
            self.a * self.c * cb,
            self.a * self.b * cg,
            self.b * self.b,
            self.b * self.c * ca,
            self.a * self.c * cb,
            self.b * self.c * ca,
            self.c * self.c,
        )
    }

    /// 倒易度量张量 G* = G⁻¹
    pub fn reciprocal_metric(&self) -> &Matrix3<f64> {
        &self.recip_metric
    }

    /// 计算 (hkl) 的 d 间距 (Å)；(000) 返回无穷大
    pub fn d_spacing(&self, hkl: Hkl) -> f64 {
        let h = Vector3::new(hkl[0] as f64, hkl[1] as f64, hkl[2] as f64);
        let inv_d2 = h.dot(&(self.recip_metric * h));
        if inv_d2 <= 0.0 {
            f64::INFINITY
        } else {
            1.0 / inv_d2.sqrt()
        }
    }

    /// d ≥ d_min 时各 Miller 指数绝对值的上界：|h| ≤ |a| / d_min
    pub fn max_indices(&self, d_min: f64) -> [i32; 3] {
        [self.a, self.b, self.c].map(|len| (len / d_min).floor() as i32)
    }
}
