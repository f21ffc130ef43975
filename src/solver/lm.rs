//! 带下界的 Levenberg–Marquardt
//!
//! 每次迭代用前向差分求雅可比 J，解阻尼正规方程
//! (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr，试探点投影回可行域 x ≥ lower。
//! 试探成功则 λ 缩小，失败则放大。

use super::{FitStatus, LeastSquaresSolver, SolverOutcome};

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub initial_lambda: f64,
    /// 有限差分相对步长
    pub diff_step: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        LevenbergMarquardt {
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
            diff_step: 1e-7,
        }
    }
}

fn cost_of(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn project(x: &mut [f64], lower: &[f64]) {
    for (xi, lo) in x.iter_mut().zip(lower) {
        if *xi < *lo {
            *xi = *lo;
        }
    }
}

impl LevenbergMarquardt {
    fn jacobian(
        &self,
        residuals: &mut dyn FnMut(&[f64]) -> Vec<f64>,
        x: &[f64],
        r: &[f64],
    ) -> DMatrix<f64> {
        let (m, n) = (r.len(), x.len());
        let mut jac = DMatrix::zeros(m, n);
        let mut xp = x.to_vec();

        for j in 0..n {
            let h = self.diff_step * x[j].abs().max(1.0);
            xp[j] = x[j] + h;
            let rp = residuals(&xp);
            for (i, (a, b)) in rp.iter().zip(r).enumerate().take(m) {
                jac[(i, j)] = (a - b) / h;
            }
            xp[j] = x[j];
        }
        jac
    }

    /// 解阻尼正规方程；Cholesky 失败时退回 SVD
    fn step(&self, a: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
        let mut damped = a.clone();
        for i in 0..a.nrows() {
            damped[(i, i)] += lambda * a[(i, i)].max(1e-12);
        }
        let rhs = -g;

        if let Some(chol) = damped.clone().cholesky() {
            let delta = chol.solve(&rhs);
            if delta.iter().all(|v| v.is_finite()) {
                return Some(delta);
            }
        }

        let svd = damped.svd(true, true);
        svd.solve(&rhs, 1e-12)
            .ok()
            .filter(|delta| delta.iter().all(|v| v.is_finite()))
    }
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn name(&self) -> &str {
        "levenberg-marquardt"
    }

    fn solve(
        &self,
        residuals: &mut dyn FnMut(&[f64]) -> Vec<f64>,
        x0: &[f64],
        lower: &[f64],
        max_nfev: usize,
    ) -> SolverOutcome {
        let mut x = x0.to_vec();
        project(&mut x, lower);

        let mut r = residuals(&x);
        let mut cost = cost_of(&r);
        let mut nfev = 1;
        let mut njev = 0;
        let mut iterations = 0;
        let mut lambda = self.initial_lambda;

        let finish = |x: Vec<f64>, cost, nfev, njev, iterations, status| SolverOutcome {
            x,
            cost,
            nfev,
            njev,
            iterations,
            status,
        };

        if x.is_empty() || cost == 0.0 {
            return finish(x, cost, nfev, njev, iterations, FitStatus::Converged);
        }

        while nfev < max_nfev {
            let jac = self.jacobian(residuals, &x, &r);
            njev += x.len();

            let rv = DVector::from_column_slice(&r);
            let g = jac.tr_mul(&rv);
            if g.amax() <= self.gtol {
                return finish(x, cost, nfev, njev, iterations, FitStatus::Converged);
            }
            let a = jac.tr_mul(&jac);

            loop {
                if nfev >= max_nfev {
                    return finish(x, cost, nfev, njev, iterations, FitStatus::MaxEvaluations);
                }

                let Some(delta) = self.step(&a, &g, lambda) else {
                    return finish(x, cost, nfev, njev, iterations, FitStatus::Stalled);
                };

                let mut trial: Vec<f64> = x.iter().zip(delta.iter()).map(|(a, b)| a + b).collect();
                project(&mut trial, lower);

                let r_trial = residuals(&trial);
                nfev += 1;
                let cost_trial = cost_of(&r_trial);

                if cost_trial.is_finite() && cost_trial < cost {
                    let step_norm: f64 = x
                        .iter()
                        .zip(&trial)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt();
                    let x_norm: f64 = x.iter().map(|v| v * v).sum::<f64>().sqrt();
                    let reduction = cost - cost_trial;

                    x = trial;
                    r = r_trial;
                    let previous = cost;
                    cost = cost_trial;
                    iterations += 1;
                    lambda = (lambda / 10.0).max(1e-12);

                    tracing::trace!(iterations, nfev, cost, lambda, "LM step accepted");

                    if reduction <= self.ftol * previous
                        || step_norm <= self.xtol * (x_norm + self.xtol)
                    {
                        return finish(x, cost, nfev, njev, iterations, FitStatus::Converged);
                    }
                    break;
                }

                lambda *= 10.0;
                if lambda > 1e16 {
                    // 任何方向都无法下降：局部极小（或落在边界上）
                    return finish(x, cost, nfev, njev, iterations, FitStatus::Converged);
                }
            }
        }

        finish(x, cost, nfev, njev, iterations, FitStatus::MaxEvaluations)
    }
}
