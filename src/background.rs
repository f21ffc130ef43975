//! # 背底函数
//!
//! 封闭的背底形式集合，统一接口 `evaluate(x, params)`：
//!
//! - `Flat`: y = c0
//! - `Polynomial { order }`: y = Σ c_i·x^i，i = 0..=order
//! - `Chebyshev { order, x_min, x_max }`: y = Σ c_i·T_i(t)，t 为 x 映射到 [-1, 1]
//!
//! ## 依赖关系
//! - 被 `pawley/`、`config/` 使用

use crate::error::{PawleyError, Result};

use std::fmt;

/// 背底函数
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Flat,
    Polynomial { order: usize },
    Chebyshev { order: usize, x_min: f64, x_max: f64 },
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::Flat => write!(f, "flat"),
            Background::Polynomial { order } => write!(f, "polynomial(order={})", order),
            Background::Chebyshev { order, .. } => write!(f, "chebyshev(order={})", order),
        }
    }
}

impl Background {
    /// Chebyshev 背底，定义域取数据的 x 范围
    pub fn chebyshev(order: usize, x: &[f64]) -> Result<Self> {
        let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if x_max <= x_min {
            return Err(PawleyError::DataError(
                "Chebyshev background needs at least two distinct x values".to_string(),
            ));
        }
        Ok(Background::Chebyshev {
            order,
            x_min,
            x_max,
        })
    }

    pub fn nparams(&self) -> usize {
        match self {
            Background::Flat => 1,
            Background::Polynomial { order } | Background::Chebyshev { order, .. } => order + 1,
        }
    }

    pub fn param_names(&self) -> Vec<String> {
        match self {
            Background::Flat => vec!["bg_c0".to_string()],
            Background::Polynomial { .. } => {
                (0..self.nparams()).map(|i| format!("bg_a{}", i)).collect()
            }
            Background::Chebyshev { .. } => {
                (0..self.nparams()).map(|i| format!("bg_t{}", i)).collect()
            }
        }
    }

    /// 单点取值；`params` 长度不足时缺失项按 0 处理
    pub fn value(&self, x: f64, params: &[f64]) -> f64 {
        match self {
            Background::Flat => params.first().copied().unwrap_or(0.0),
            Background::Polynomial { .. } => {
                // Horner
                params.iter().rev().fold(0.0, |acc, c| acc * x + c)
            }
            Background::Chebyshev { x_min, x_max, .. } => {
                let t = (2.0 * x - (x_max + x_min)) / (x_max - x_min);
                let (mut t_prev, mut t_curr) = (1.0, t);
                let mut sum = 0.0;
                for (i, c) in params.iter().enumerate() {
                    let ti = match i {
                        0 => 1.0,
                        1 => t,
                        _ => {
                            let next = 2.0 * t * t_curr - t_prev;
                            t_prev = t_curr;
                            t_curr = next;
                            next
                        }
                    };
                    sum += c * ti;
                }
                sum
            }
        }
    }

    pub fn evaluate(&self, x: &[f64], params: &[f64]) -> Vec<f64> {
        x.iter().map(|xi| self.value(*xi, params)).collect()
    }

    /// 累加到已有数组
    pub fn add_to(&self, x: &[f64], params: &[f64], out: &mut [f64]) {
        for (xi, yi) in x.iter().zip(out.iter_mut()) {
            *yi += self.value(*xi, params);
        }
    }
}
