//! # 精修模型的公共部分
//!
//! 1D 与 2D 模型共用的拟合驱动、参数块布局和若干数值工具。
//!
//! 拟合流程：取当前参数向量 → 只把自由参数交给求解器 →
//! 求解器给出的最优自由参数并回完整向量 → 写回模型（含共享物相）→
//! 结果追加到拟合历史。

use crate::crystal::{Hkl, LatticeConstraint};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::Result;
use crate::models::ParameterVector;
use crate::phase::PhaseRef;
use crate::solver::{default_max_nfev, FitResult, FitStatus, LeastSquaresSolver};

use std::ops::Range;

/// 晶格参数的下界（长度与角度都必须为正）
pub(crate) const LATTICE_LOWER: f64 = 1e-6;

/// 构建模型时缓存的物相信息。拟合期间 HKL 列表不变。
#[derive(Debug, Clone)]
pub(crate) struct PhaseBlock {
    pub name: String,
    pub hkls: Vec<Hkl>,
    pub constraint: LatticeConstraint,
    pub lattice_names: Vec<String>,
}

impl PhaseBlock {
    pub fn snapshot(phase: &PhaseRef) -> Self {
        let phase = phase.read();
        PhaseBlock {
            name: phase.name().to_string(),
            hkls: phase.hkls().to_vec(),
            constraint: LatticeConstraint::for_spacegroup(phase.spacegroup()),
            lattice_names: phase.get_param_names(),
        }
    }

    /// 由晶格参数计算各衍射的 d 间距
    pub fn dspacings(&self, lattice: &[f64]) -> Result<Vec<f64>> {
        let cell = self.constraint.build(lattice)?;
        Ok(self.hkls.iter().map(|h| cell.d_spacing(*h)).collect())
    }

    pub fn intensity_name(&self, hkl: &Hkl) -> String {
        format!("{}:I({} {} {})", self.name, hkl[0], hkl[1], hkl[2])
    }
}

/// 单个衍射的精修结果，用于报告
#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub phase: usize,
    pub phase_name: String,
    pub hkl: Hkl,
    pub d: f64,
    pub intensity: f64,
}

/// 拟合驱动需要模型提供的能力
pub(crate) trait Refinable {
    fn label(&self) -> String;

    /// 当前参数（晶格部分与共享物相同步）
    fn parameter_vector(&self) -> ParameterVector;

    fn residuals(&self, params: &[f64]) -> Result<Vec<f64>>;

    /// 写回拟合结果
    fn commit(&mut self, params: &[f64]) -> Result<()>;

    fn record(&mut self, result: FitResult);
}

/// 对自由参数做有界最小二乘拟合
pub(crate) fn run_fit<M: Refinable>(
    model: &mut M,
    solver: &dyn LeastSquaresSolver,
    max_nfev: Option<usize>,
) -> Result<FitResult> {
    let pv = model.parameter_vector();
    let x0 = pv.free_values();
    let lower = pv.free_lower();
    let cap = max_nfev.unwrap_or_else(|| default_max_nfev(x0.len()));
    let label = model.label();

    let npoints = model.residuals(pv.values())?.len();
    tracing::info!(
        "Fitting {}: {} free of {} parameters, {} points, solver = {}, max_nfev = {}",
        label,
        x0.len(),
        pv.len(),
        npoints,
        solver.name(),
        cap
    );

    let outcome = {
        let model = &*model;
        let mut resid = |free: &[f64]| -> Vec<f64> {
            match pv.merge_free(free).and_then(|full| model.residuals(&full)) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("Residual evaluation rejected trial point: {}", e);
                    vec![f64::INFINITY; npoints]
                }
            }
        };
        solver.solve(&mut resid, &x0, &lower, cap)
    };

    let full = pv.merge_free(&outcome.x)?;
    model.commit(&full)?;

    let mut diagnostics = Diagnostics::new();
    match outcome.status {
        FitStatus::Converged => tracing::info!(
            "{} converged after {} evaluations, cost = {:.6e}",
            label,
            outcome.nfev,
            outcome.cost
        ),
        FitStatus::MaxEvaluations => diagnostics.warn(
            DiagnosticKind::ConvergenceWarning,
            format!(
                "{}: stopped after {} evaluations (max_nfev = {}) without converging; \
                 keeping the last estimate",
                label, outcome.nfev, cap
            ),
        ),
        FitStatus::Stalled => diagnostics.warn(
            DiagnosticKind::ConvergenceWarning,
            format!(
                "{}: solver stalled after {} evaluations; keeping the last estimate",
                label, outcome.nfev
            ),
        ),
    }

    let result = FitResult::from_outcome(outcome, full, max_nfev).with_diagnostics(diagnostics);
    model.record(result.clone());
    Ok(result)
}

/// 梯形积分
pub fn integrate(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}

/// 离 `d` 最近的数据点的强度；`d` 落在数据范围外时为 None
pub(crate) fn nearest_value(x: &[f64], y: &[f64], d: f64) -> Option<f64> {
    let (lo, hi) = x.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(*v), hi.max(*v))
    });
    if d < lo || d > hi {
        return None;
    }
    x.iter()
        .zip(y)
        .min_by(|a, b| (a.0 - d).abs().total_cmp(&(b.0 - d).abs()))
        .map(|(_, v)| *v)
}

/// 加权 R 因子 Rwp = sqrt(Σ w·r² / Σ w·y²)，无误差列时 w = 1
pub fn rwp(resids: &[f64], observed: &[f64], errors: Option<&[f64]>) -> f64 {
    let weight = |i: usize| match errors {
        Some(e) if e[i] > 0.0 => 1.0 / (e[i] * e[i]),
        _ => 1.0,
    };
    let (num, den) = resids
        .iter()
        .zip(observed)
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, (r, y))| {
            let w = weight(i);
            (num + w * r * r, den + w * y * y)
        });
    if den > 0.0 {
        (num / den).sqrt()
    } else {
        0.0
    }
}

/// 参数向量中一段连续区间
pub(crate) fn block(start: &mut usize, len: usize) -> Range<usize> {
    let range = *start..*start + len;
    *start += len;
    range
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate() {
        let x: Vec<f64> = (0..=100).map(|i| i as f64 * 0.01).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        assert!((integrate(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_value() {
        let x = [1.0, 2.0, 3.0];
        let y = [10.0, 20.0, 30.0];
        assert_eq!(nearest_value(&x, &y, 2.4), Some(20.0));
        assert_eq!(nearest_value(&x, &y, 3.6), None);
    }

    #[test]
    fn test_rwp() {
        assert_eq!(rwp(&[0.0, 0.0], &[1.0, 2.0], None), 0.0);
        let r = rwp(&[1.0, 0.0], &[1.0, 0.0], None);
        assert!((r - 1.0).abs() < 1e-12);
        assert_eq!(rwp(&[1.0], &[0.0], None), 0.0);
    }

    #[test]
    fn test_block_ranges() {
        let mut start = 0;
        let a = block(&mut start, 3);
        let b = block(&mut start, 0);
        let c = block(&mut start, 2);
        assert_eq!(a, 0..3);
        assert!(b.is_empty());
        assert_eq!(c, 3..5);
    }
}
