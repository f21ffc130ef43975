//! # 非线性最小二乘求解器
//!
//! 精修模型只提供残差函数，求解算法可替换：
//!
//! ```text
//! LeastSquaresSolver::solve(residuals, x0, lower, max_nfev) -> SolverOutcome
//! ```
//!
//! 默认实现为带下界的 Levenberg–Marquardt（`lm`）。
//! `nfev` 只统计残差评估（初始点与试探步），有限差分雅可比单独计入 `njev`。
//!
//! ## 依赖关系
//! - 被 `pawley/` 使用
//! - 子模块: lm

pub mod lm;

pub use lm::LevenbergMarquardt;

use crate::diagnostics::Diagnostics;

use std::fmt;

/// 求解结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// 满足收敛判据
    Converged,
    /// 达到评估次数上限
    MaxEvaluations,
    /// 阻尼正规方程无法求解
    Stalled,
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStatus::Converged => write!(f, "converged"),
            FitStatus::MaxEvaluations => write!(f, "max_nfev reached"),
            FitStatus::Stalled => write!(f, "stalled"),
        }
    }
}

/// 求解器输出
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    /// 最优自由参数
    pub x: Vec<f64>,
    /// ½ Σ r²
    pub cost: f64,
    pub nfev: usize,
    pub njev: usize,
    pub iterations: usize,
    pub status: FitStatus,
}

/// 可替换的最小二乘求解器
pub trait LeastSquaresSolver {
    fn name(&self) -> &str;

    /// 最小化 ½ Σ r(x)²，满足 x ≥ lower
    fn solve(
        &self,
        residuals: &mut dyn FnMut(&[f64]) -> Vec<f64>,
        x0: &[f64],
        lower: &[f64],
        max_nfev: usize,
    ) -> SolverOutcome;
}

/// 未指定 `max_nfev` 时的默认上限
pub fn default_max_nfev(nfree: usize) -> usize {
    100 * (nfree + 1)
}

/// 一次拟合的结果（不可变）
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// 拟合后的自由参数
    pub free_params: Vec<f64>,
    /// 拟合后的完整参数向量
    pub params: Vec<f64>,
    pub nfev: usize,
    /// 调用方请求的上限（原样记录）
    pub max_nfev: Option<usize>,
    pub status: FitStatus,
    pub cost: f64,
    pub iterations: usize,
    /// 拟合过程中产生的诊断（如未收敛）
    pub diagnostics: Diagnostics,
}

impl FitResult {
    pub fn from_outcome(outcome: SolverOutcome, params: Vec<f64>, max_nfev: Option<usize>) -> Self {
        FitResult {
            free_params: outcome.x,
            params,
            nfev: outcome.nfev,
            max_nfev,
            status: outcome.status,
            cost: outcome.cost,
            iterations: outcome.iterations,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn success(&self) -> bool {
        self.status == FitStatus::Converged
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} evaluations ({} iterations), cost = {:.6e}",
            self.status, self.nfev, self.iterations, self.cost
        )
    }
}
