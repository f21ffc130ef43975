//! # 多谱 Pawley 精修
//!
//! 每条谱对应一个散射角 2θ，所有谱共享 d 间距轴。某点的波长 λ = 2·d·sinθ，
//! 设置 `lambda_max` 后 λ 超出上限的点不参与计算（计算值与残差都为 0）。
//!
//! 第 s 条谱的计算值：
//! ```text
//! calc_s(d) = scale · (1/nspec) · Σ_j I[row(s)][j] · peak(d; d_j, res_s) + bg_s(d)
//! ```
//! 全局模式下 row(s) = 0（所有谱共用一组强度），否则 row(s) = s。
//!
//! ## 参数向量布局
//! ```text
//! [scale]                         全局标度，自由，≥ 0
//! [I[0][..M] .. I[nspec-1][..M]]  每条谱一行强度，≥ 0；I[0][0] 始终固定
//! [lattice_p ...]                 每个物相的独立晶格参数，默认固定
//! [bg[0][..] .. bg[nspec-1][..]]  每条谱的背底系数
//! [res[0][..] .. res[nspec-1][..]] 每条谱的峰形参数，始终固定
//! ```
//!
//! ## 依赖关系
//! - 使用 `pawley/model.rs` 的拟合驱动
//! - `set_params_from_pawley1d` 读取 `PawleyPattern1D` 的结果

use crate::background::Background;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{PawleyError, Result};
use crate::models::{ParameterVector, Pattern2D};
use crate::pawley::model::{
    block, nearest_value, rwp, run_fit, PhaseBlock, Reflection, Refinable, LATTICE_LOWER,
};
use crate::pawley::PawleyPattern1D;
use crate::phase::PhaseRef;
use crate::profile::PeakProfile;
use crate::solver::{FitResult, LeastSquaresSolver, LevenbergMarquardt};

use std::f64::consts::PI;
use std::ops::Range;

#[derive(Debug, Clone, Default)]
struct Layout {
    scale: usize,
    /// 每条谱一行
    intens: Vec<Range<usize>>,
    lattice: Vec<Range<usize>>,
    bg: Vec<Range<usize>>,
    profile: Vec<Range<usize>>,
}

/// 多谱精修模型
#[derive(Debug, Clone)]
pub struct PawleyPattern2D {
    pattern: Pattern2D,
    phases: Vec<PhaseRef>,
    blocks: Vec<PhaseBlock>,
    profile: PeakProfile,
    bg_func: Option<Background>,
    global_scale: bool,
    lambda_max: Option<f64>,
    /// 各谱的 sinθ
    sin_theta: Vec<f64>,
    params: ParameterVector,
    layout: Layout,
    lattice_free: bool,
    history: Vec<FitResult>,
    scale_estimates: usize,
}

impl PawleyPattern2D {
    pub fn new(
        pattern: Pattern2D,
        phases: Vec<PhaseRef>,
        profile: PeakProfile,
        global_scale: bool,
        bg_func: Option<Background>,
        lambda_max: Option<f64>,
    ) -> Self {
        let sin_theta = pattern
            .two_theta()
            .iter()
            .map(|tth| (tth.to_radians() / 2.0).sin())
            .collect();
        let mut model = PawleyPattern2D {
            pattern,
            phases,
            blocks: Vec::new(),
            profile,
            bg_func,
            global_scale,
            lambda_max,
            sin_theta,
            params: ParameterVector::new(),
            layout: Layout::default(),
            lattice_free: false,
            history: Vec::new(),
            scale_estimates: 0,
        };
        model.rebuild();
        model
    }

    fn rebuild(&mut self) {
        self.blocks = self.phases.iter().map(PhaseBlock::snapshot).collect();
        let nspec = self.pattern.nspec();

        let mut params = ParameterVector::new();
        let mut start = 0;
        let mut layout = Layout {
            scale: params.push("scale", 1.0, true, 0.0),
            ..Layout::default()
        };
        start += 1;

        for s in 0..nspec {
            layout.intens.push(block(&mut start, self.nhkls_total()));
            for b in &self.blocks {
                for hkl in &b.hkls {
                    params.push(format!("s{}:{}", s, b.intensity_name(hkl)), 1.0, true, 0.0);
                }
            }
        }

        for (b, phase) in self.blocks.iter().zip(&self.phases) {
            let lattice = phase.read().get_params();
            layout.lattice.push(block(&mut start, lattice.len()));
            for (name, value) in b.lattice_names.iter().zip(lattice) {
                params.push(format!("{}:{}", b.name, name), value, self.lattice_free, LATTICE_LOWER);
            }
        }

        let bg_names = self.bg_func.map(|bg| bg.param_names()).unwrap_or_default();
        for s in 0..nspec {
            layout.bg.push(block(&mut start, bg_names.len()));
            for name in &bg_names {
                params.push(format!("s{}:{}", s, name), 0.0, true, f64::NEG_INFINITY);
            }
        }

        for s in 0..nspec {
            layout.profile.push(block(&mut start, self.profile.nparams()));
            for (name, value) in self.profile.param_names().into_iter().zip(self.profile.params()) {
                params.push(format!("s{}:{}", s, name), value, false, f64::NEG_INFINITY);
            }
        }

        self.params = params;
        self.layout = layout;
        self.set_global_scale(self.global_scale);

        tracing::debug!(
            "Built 2D model: {} spectra × {} reflections, {} parameters ({} free)",
            nspec,
            self.nhkls_total(),
            self.params.len(),
            self.params.nfree()
        );
    }

    /// 物相 HKL 列表变化后重建模型
    pub fn update_phases(&mut self) {
        self.rebuild();
    }

    pub fn set_bg_func(&mut self, bg_func: Option<Background>) {
        self.bg_func = bg_func;
        self.rebuild();
    }

    /// 切换全局 / 逐谱强度模式
    ///
    /// 全局模式下第 0 行以外的强度与第 0 行绑定且不自由，背底不自由（保持当前值）。
    /// 逐谱模式下所有强度自由，背底自由并清零。两种模式下 I[0][0] 都固定，
    /// 用来消除它与 scale 的简并。
    pub fn set_global_scale(&mut self, is_global: bool) {
        self.global_scale = is_global;

        for (s, row) in self.layout.intens.iter().enumerate() {
            for i in row.clone() {
                self.params.set_free(i, !is_global || s == 0);
            }
        }
        if is_global {
            self.tie_rows();
        }
        if let Some(anchor) = self.anchor_slot() {
            self.params.set_free(anchor, false);
        }

        for range in &self.layout.bg {
            for i in range.clone() {
                self.params.set_free(i, !is_global);
                if !is_global {
                    self.params.set_value(i, 0.0);
                }
            }
        }
    }

    /// 第 0 行中固定的强度槽：第一个有衍射的物相的第一个 HKL
    ///
    /// 前面的物相 HKL 列表为空时，锚点落在后续物相上；所有物相都为空时没有锚点。
    fn anchor_slot(&self) -> Option<usize> {
        let row0 = self.layout.intens.first()?;
        let mut offset = 0;
        for b in &self.blocks {
            if !b.hkls.is_empty() {
                return Some(row0.start + offset);
            }
            offset += b.hkls.len();
        }
        None
    }

    /// 把第 0 行强度复制到其余各行
    fn tie_rows(&mut self) {
        let Some(first) = self.layout.intens.first().cloned() else {
            return;
        };
        let row0 = self.params.values()[first].to_vec();
        for row in self.layout.intens.iter().skip(1) {
            for (i, v) in row.clone().zip(&row0) {
                self.params.set_value(i, *v);
            }
        }
    }

    pub fn set_lattice_free(&mut self, free: bool) {
        self.lattice_free = free;
        for range in &self.layout.lattice {
            for i in range.clone() {
                self.params.set_free(i, free);
            }
        }
    }

    /// 波长上限；None 表示不屏蔽
    pub fn set_lambda_max(&mut self, lambda_max: Option<f64>) {
        self.lambda_max = lambda_max;
    }

    // ─────────────────────────────────────────────────────────────
    // 访问器
    // ─────────────────────────────────────────────────────────────

    pub fn pattern(&self) -> &Pattern2D {
        &self.pattern
    }

    pub fn phases(&self) -> &[PhaseRef] {
        &self.phases
    }

    pub fn profile(&self) -> &PeakProfile {
        &self.profile
    }

    pub fn background(&self) -> Option<&Background> {
        self.bg_func.as_ref()
    }

    pub fn is_global_scale(&self) -> bool {
        self.global_scale
    }

    pub fn lambda_max(&self) -> Option<f64> {
        self.lambda_max
    }

    pub fn history(&self) -> &[FitResult] {
        &self.history
    }

    pub fn nspec(&self) -> usize {
        self.pattern.nspec()
    }

    pub fn nhkls_total(&self) -> usize {
        self.blocks.iter().map(|b| b.hkls.len()).sum()
    }

    pub fn nhkls_per_phase(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.hkls.len()).collect()
    }

    pub fn scale(&self) -> f64 {
        self.params.values()[self.layout.scale]
    }

    fn rows<T: Clone>(&self, ranges: &[Range<usize>], source: &[T]) -> Vec<Vec<T>> {
        ranges.iter().map(|r| source[r.clone()].to_vec()).collect()
    }

    /// 强度 [谱][hkl]
    pub fn intens(&self) -> Vec<Vec<f64>> {
        self.rows(&self.layout.intens, self.params.values())
    }

    pub fn intens_isfree(&self) -> Vec<Vec<bool>> {
        self.rows(&self.layout.intens, self.params.is_free())
    }

    /// 背底系数 [谱][系数]；没有背底函数时为空
    pub fn bg_params(&self) -> Vec<Vec<f64>> {
        if self.bg_func.is_none() {
            return Vec::new();
        }
        self.rows(&self.layout.bg, self.params.values())
    }

    pub fn bg_isfree(&self) -> Vec<Vec<bool>> {
        if self.bg_func.is_none() {
            return Vec::new();
        }
        self.rows(&self.layout.bg, self.params.is_free())
    }

    /// 峰形参数 [谱][参数]
    pub fn profile_params(&self) -> Vec<Vec<f64>> {
        self.rows(&self.layout.profile, self.params.values())
    }

    // ─────────────────────────────────────────────────────────────
    // 参数
    // ─────────────────────────────────────────────────────────────

    pub fn get_params(&self) -> Vec<f64> {
        self.synced().values().to_vec()
    }

    pub fn get_free_params(&self) -> Vec<f64> {
        self.synced().free_values()
    }

    pub fn get_isfree(&self) -> Vec<bool> {
        self.params.is_free().to_vec()
    }

    pub fn get_param_names(&self) -> Vec<String> {
        self.params.names().to_vec()
    }

    fn synced(&self) -> ParameterVector {
        let mut params = self.params.clone();
        for (phase, range) in self.phases.iter().zip(&self.layout.lattice) {
            for (i, v) in range.clone().zip(phase.read().get_params()) {
                params.set_value(i, v);
            }
        }
        params
    }

    fn check_len(&self, n: usize) -> Result<()> {
        if n != self.params.len() {
            return Err(PawleyError::ConfigurationError(format!(
                "2D model has {} parameters, got {}",
                self.params.len(),
                n
            )));
        }
        Ok(())
    }

    /// 写入全部参数；全局模式下绑定的强度行随第 0 行更新
    pub fn set_params(&mut self, values: &[f64]) -> Result<()> {
        self.check_len(values.len())?;

        for (b, range) in self.blocks.iter().zip(&self.layout.lattice) {
            b.constraint.build(&values[range.clone()])?;
        }
        for range in &self.layout.profile {
            self.profile.resolution_from(&values[range.clone()])?;
        }

        for (phase, range) in self.phases.iter().zip(&self.layout.lattice) {
            phase.write().set_params(&values[range.clone()])?;
        }
        self.params.set_values(values)?;
        if self.global_scale {
            self.tie_rows();
        }
        Ok(())
    }

    pub fn set_free_params(&mut self, free_values: &[f64]) -> Result<()> {
        let full = self.synced().merge_free(free_values)?;
        self.set_params(&full)
    }

    /// 逐谱估计强度，归一化使 I[0][0] = 1，比例因子并入 scale
    ///
    /// 全局模式下各谱估计取平均。数据全为零时 scale = 0，强度保持不变。
    pub fn estimate_initial_params(&mut self) -> Result<Vec<f64>> {
        let mut values = self.get_params();
        let nspec = self.nspec() as f64;

        let mut dspacings = Vec::with_capacity(self.nhkls_total());
        for (b, lattice) in self.blocks.iter().zip(&self.layout.lattice) {
            dspacings.extend(b.dspacings(&values[lattice.clone()])?);
        }

        let mut raw = Vec::with_capacity(self.nspec());
        for (spectrum, profile) in self.pattern.spectra().iter().zip(&self.layout.profile) {
            let resolution = self.profile.resolution_from(&values[profile.clone()])?;
            let row: Vec<f64> = dspacings
                .iter()
                .map(|d| {
                    let height = nearest_value(&spectrum.x, &spectrum.y, *d)
                        .unwrap_or(0.0)
                        .max(0.0);
                    height * (2.0 * PI).sqrt() * resolution.sigma(*d) * nspec
                })
                .collect();
            raw.push(row);
        }

        if self.global_scale {
            let mean: Vec<f64> = (0..dspacings.len())
                .map(|j| raw.iter().map(|row| row[j]).sum::<f64>() / nspec)
                .collect();
            raw.iter_mut().for_each(|row| row.clone_from(&mean));
        }

        let reference = match raw.first().and_then(|row| row.first()) {
            Some(v) if *v > 0.0 => *v,
            _ => raw.iter().flatten().copied().fold(0.0, f64::max),
        };

        if reference > 0.0 {
            values[self.layout.scale] = reference;
            for (row, range) in raw.iter().zip(&self.layout.intens) {
                for (i, v) in range.clone().zip(row) {
                    values[i] = v / reference;
                }
            }
        } else {
            values[self.layout.scale] = 0.0;
        }

        self.set_params(&values)?;
        Ok(values)
    }

    /// 扣除背底后，用 scale = 1 时的峰贡献对数据做线性最小二乘，得到 scale
    fn reestimate_scale(&mut self) -> Result<()> {
        self.scale_estimates += 1;

        let mut values = self.get_params();
        values[self.layout.scale] = 1.0;
        let unit = self.eval_2d(&values)?;
        values[self.layout.scale] = 0.0;
        let bg_only = self.eval_2d(&values)?;

        let (num, den) = self
            .pattern
            .spectra()
            .iter()
            .zip(unit.iter().zip(&bg_only))
            .flat_map(|(s, (u, b))| s.y.iter().zip(u).zip(b))
            .fold((0.0, 0.0), |(num, den), ((y, u), b)| {
                let peaks = u - b;
                (num + (y - b) * peaks, den + peaks * peaks)
            });

        if den > 0.0 {
            let scale = (num / den).max(0.0);
            tracing::debug!("Re-estimated 2D scale: {:.6e}", scale);
            self.params.set_value(self.layout.scale, scale);
        }
        Ok(())
    }

    /// 从单谱精修结果迁移强度与峰形参数
    ///
    /// 物相数、各物相 HKL 数或峰形参数个数不一致时返回一条错误诊断，模型不变。
    pub fn set_params_from_pawley1d(&mut self, pawley1d: &PawleyPattern1D) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        let ours = self.nhkls_per_phase();
        let theirs = pawley1d.nhkls_per_phase();
        let profile_1d = pawley1d.profile_params();

        let mismatch = if ours.len() != theirs.len() {
            Some(format!(
                "1D model has {} phases, 2D model has {}",
                theirs.len(),
                ours.len()
            ))
        } else if ours != theirs {
            Some(format!(
                "Reflection counts per phase differ (1D {:?}, 2D {:?})",
                theirs, ours
            ))
        } else if profile_1d.len() != self.profile.nparams() {
            Some(format!(
                "1D model has {} profile parameters, 2D model expects {}",
                profile_1d.len(),
                self.profile.nparams()
            ))
        } else {
            None
        };

        if let Some(message) = mismatch {
            diagnostics.error(
                DiagnosticKind::ConfigurationMismatch,
                format!("Cannot transfer parameters from 1D fit: {}", message),
            );
            return diagnostics;
        }

        let intens: Vec<f64> = pawley1d.intensities().into_iter().flatten().collect();
        for (row, profile) in self.layout.intens.iter().zip(&self.layout.profile) {
            for (i, v) in row.clone().zip(&intens) {
                self.params.set_value(i, *v);
            }
            for (i, v) in profile.clone().zip(&profile_1d) {
                self.params.set_value(i, *v);
            }
        }

        if let Err(e) = self.reestimate_scale() {
            diagnostics.error(
                DiagnosticKind::ConfigurationMismatch,
                format!("Scale re-estimation failed after transfer: {}", e),
            );
        }
        diagnostics
    }

    // ─────────────────────────────────────────────────────────────
    // 计算
    // ─────────────────────────────────────────────────────────────

    fn is_masked(&self, spec: usize, d: f64) -> bool {
        match self.lambda_max {
            Some(lmax) => 2.0 * d * self.sin_theta[spec] > lmax,
            None => false,
        }
    }

    /// 逐谱计算模型；λ > lambda_max 的点为 0
    pub fn eval_2d(&self, params: &[f64]) -> Result<Vec<Vec<f64>>> {
        self.check_len(params.len())?;

        let weight = params[self.layout.scale] / self.nspec() as f64;
        let mut dspacings = Vec::with_capacity(self.nhkls_total());
        for (b, lattice) in self.blocks.iter().zip(&self.layout.lattice) {
            dspacings.extend(b.dspacings(&params[lattice.clone()])?);
        }

        let mut out = Vec::with_capacity(self.nspec());
        for (s, spectrum) in self.pattern.spectra().iter().enumerate() {
            let resolution = self
                .profile
                .resolution_from(&params[self.layout.profile[s].clone()])?;
            let row = if self.global_scale {
                &self.layout.intens[0]
            } else {
                &self.layout.intens[s]
            };

            let mut y = vec![0.0; spectrum.len()];
            for (i, d) in row.clone().zip(&dspacings) {
                self.profile
                    .add_peak(&resolution, *d, weight * params[i], &spectrum.x, &mut y);
            }
            if let Some(bg) = &self.bg_func {
                bg.add_to(&spectrum.x, &params[self.layout.bg[s].clone()], &mut y);
            }
            for (d, v) in spectrum.x.iter().zip(y.iter_mut()) {
                if self.is_masked(s, *d) {
                    *v = 0.0;
                }
            }
            out.push(y);
        }
        Ok(out)
    }

    /// 按谱拼接后的计算值
    pub fn eval_profile(&self, params: &[f64]) -> Result<Vec<f64>> {
        Ok(self.eval_2d(params)?.into_iter().flatten().collect())
    }

    /// 残差 = 观测值 − 计算值（按谱拼接），屏蔽点为 0
    pub fn eval_resids(&self, params: &[f64]) -> Result<Vec<f64>> {
        let calc = self.eval_2d(params)?;
        let mut resids = Vec::with_capacity(self.pattern.npoints());
        for (s, (spectrum, c)) in self.pattern.spectra().iter().zip(&calc).enumerate() {
            for ((d, o), c) in spectrum.x.iter().zip(&spectrum.y).zip(c) {
                resids.push(if self.is_masked(s, *d) { 0.0 } else { o - c });
            }
        }
        Ok(resids)
    }

    pub fn rwp(&self, params: &[f64]) -> Result<f64> {
        let resids = self.eval_resids(params)?;
        let observed: Vec<f64> = self
            .pattern
            .spectra()
            .iter()
            .flat_map(|s| s.y.iter().copied())
            .collect();
        let errors: Option<Vec<f64>> = self
            .pattern
            .spectra()
            .iter()
            .map(|s| s.e.clone())
            .collect::<Option<Vec<_>>>()
            .map(|e| e.into_iter().flatten().collect());
        Ok(rwp(&resids, &observed, errors.as_deref()))
    }

    /// 第 0 行强度乘以 scale 后的衍射列表
    pub fn reflections(&self) -> Result<Vec<Reflection>> {
        let values = self.get_params();
        let scale = values[self.layout.scale];
        let mut slots = self.layout.intens.first().cloned().unwrap_or_default();
        let mut out = Vec::new();
        for (p, (b, lattice)) in self.blocks.iter().zip(&self.layout.lattice).enumerate() {
            let dspacings = b.dspacings(&values[lattice.clone()])?;
            for ((hkl, i), d) in b.hkls.iter().zip(slots.by_ref()).zip(dspacings) {
                out.push(Reflection {
                    phase: p,
                    phase_name: b.name.clone(),
                    hkl: *hkl,
                    d,
                    intensity: scale * values[i],
                });
            }
        }
        Ok(out)
    }

    // ─────────────────────────────────────────────────────────────
    // 拟合
    // ─────────────────────────────────────────────────────────────

    pub fn fit(&mut self, max_nfev: Option<usize>) -> Result<FitResult> {
        self.fit_with(&LevenbergMarquardt::default(), max_nfev)
    }

    pub fn fit_with(
        &mut self,
        solver: &dyn LeastSquaresSolver,
        max_nfev: Option<usize>,
    ) -> Result<FitResult> {
        run_fit(self, solver, max_nfev)
    }
}

impl Refinable for PawleyPattern2D {
    fn label(&self) -> String {
        format!("2D pattern '{}'", self.pattern.name)
    }

    fn parameter_vector(&self) -> ParameterVector {
        self.synced()
    }

    fn residuals(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.eval_resids(params)
    }

    fn commit(&mut self, params: &[f64]) -> Result<()> {
        self.set_params(params)
    }

    fn record(&mut self, result: FitResult) {
        self.history.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::models::{Pattern1D, Spectrum};
    use crate::pawley::model::integrate;
    use crate::phase::Phase;
    use crate::profile::GaussianProfile;

    const SI_A: f64 = 5.43094;
    const TWO_THETA: [f64; 3] = [60.0, 90.0, 120.0];

    fn silicon(d_min: f64, d_max: f64) -> PhaseRef {
        let mut phase = Phase::from_alatt([SI_A; 3], "Fd-3m").unwrap();
        phase.set_hkls_from_dspac_limits(d_min, d_max).unwrap();
        PhaseRef::new(phase)
    }

    fn grid(lo: f64, hi: f64, step: f64) -> Vec<f64> {
        let n = ((hi - lo) / step).round() as usize;
        (0..=n).map(|i| lo + i as f64 * step).collect()
    }

    fn pattern_from(x: &[f64], ys: Vec<Vec<f64>>) -> Pattern2D {
        let spectra = ys
            .into_iter()
            .map(|y| Spectrum::new(x.to_vec(), y).unwrap())
            .collect();
        Pattern2D::new("test", spectra, TWO_THETA.to_vec()).unwrap()
    }

    fn zero_pattern(x: &[f64]) -> Pattern2D {
        pattern_from(x, vec![vec![0.0; x.len()]; TWO_THETA.len()])
    }

    fn gaussian() -> PeakProfile {
        PeakProfile::Gaussian(GaussianProfile::default())
    }

    fn model(x: &[f64], phase: PhaseRef, global: bool, bg: Option<Background>) -> PawleyPattern2D {
        PawleyPattern2D::new(zero_pattern(x), vec![phase], gaussian(), global, bg, None)
    }

    #[test]
    fn test_parameter_layout() {
        let m = model(&grid(1.0, 3.6, 1e-2), silicon(1.2, 3.5), true, Some(Background::Flat));
        let names = m.get_param_names();
        // scale + 3×6 强度 + 1 晶格 + 3×1 背底 + 3×3 峰形
        assert_eq!(names.len(), 1 + 18 + 1 + 3 + 9);
        assert_eq!(names[0], "scale");
        assert_eq!(names[1], "s0:Fd-3m:I(1 1 1)");
        assert_eq!(m.intens().len(), 3);
        assert_eq!(m.profile_params().len(), 3);
        assert_eq!(m.profile_params()[2], m.profile().params());
    }

    #[test]
    fn test_area_equals_reflection_count_in_global_mode() {
        let x = grid(1.0, 3.6, 1e-4);
        let m = model(&x, silicon(1.2, 3.5), true, None);
        let calc = m.eval_2d(&m.get_params()).unwrap();
        let area: f64 = calc.iter().map(|y| integrate(&x, y)).sum();
        assert!((area - m.nhkls_total() as f64).abs() < 1e-4);
        assert_eq!(m.eval_profile(&m.get_params()).unwrap().len(), 3 * x.len());
    }

    #[test]
    fn test_resids_are_negative_profile_for_zero_data() {
        let x = grid(1.0, 3.6, 1e-3);
        let m = model(&x, silicon(1.2, 3.5), false, None);
        let params = m.get_params();
        let calc = m.eval_profile(&params).unwrap();
        let resid = m.eval_resids(&params).unwrap();
        assert!(calc.iter().zip(&resid).all(|(c, r)| (c + r).abs() < 1e-15));
    }

    #[test]
    fn test_anchor_skips_phases_without_reflections() {
        let x = grid(1.0, 3.6, 1e-2);
        let mut empty = Phase::from_lattice("empty", [SI_A; 3], [90.0; 3], "Fd-3m").unwrap();
        let _ = empty.set_hkls(&[]);
        let phases = vec![PhaseRef::new(empty), silicon(1.2, 3.5)];

        for global in [true, false] {
            let m = PawleyPattern2D::new(
                zero_pattern(&x),
                phases.clone(),
                gaussian(),
                global,
                None,
                None,
            );
            assert_eq!(m.nhkls_per_phase(), vec![0, 6]);
            let anchor = m.anchor_slot().unwrap();
            assert_eq!(m.get_param_names()[anchor], "s0:Fd-3m:I(1 1 1)");
            assert!(!m.get_isfree()[anchor]);
            assert!(!m.intens_isfree()[0][0]);
        }

        let mut none = Phase::from_alatt([SI_A; 3], "Fd-3m").unwrap();
        let _ = none.set_hkls(&[]);
        let m = PawleyPattern2D::new(
            zero_pattern(&x),
            vec![PhaseRef::new(none)],
            gaussian(),
            true,
            None,
            None,
        );
        assert_eq!(m.anchor_slot(), None);
        assert_eq!(m.nhkls_total(), 0);
    }

    #[test]
    fn test_global_toggle() {
        let x = grid(1.0, 3.6, 1e-2);
        let mut m = model(&x, silicon(1.2, 3.5), true, Some(Background::Polynomial { order: 1 }));

        let free = m.intens_isfree();
        assert!(!free[0][0]);
        assert!(free[0][1..].iter().all(|f| *f));
        assert!(free[1..].iter().flatten().all(|f| !*f));
        assert!(m.bg_isfree().iter().flatten().all(|f| !*f));

        let mut params = m.get_params();
        let bg_start = m.layout.bg[0].start;
        params[bg_start] = 3.0;
        m.set_params(&params).unwrap();

        m.set_global_scale(false);
        let free = m.intens_isfree();
        assert!(!free[0][0]);
        assert_eq!(free.iter().flatten().filter(|f| !**f).count(), 1);
        assert!(m.bg_params().iter().flatten().all(|v| *v == 0.0));
        assert!(m.bg_isfree().iter().flatten().all(|f| *f));

        let mut bare = model(&x, silicon(1.2, 3.5), true, None);
        assert!(bare.bg_params().is_empty());
        bare.set_global_scale(false);
        assert!(bare.bg_params().is_empty());
        assert!(!bare.intens_isfree()[0][0]);
    }

    #[test]
    fn test_lambda_max_lowers_total_intensity() {
        let x = grid(1.2, 3.5, 1e-3);
        let mut m = model(&x, silicon(1.2, 3.5), true, None);
        let params = m.get_params();

        let mut previous = f64::INFINITY;
        for lmax in [10.0, 5.0, 4.0, 3.0] {
            m.set_lambda_max(Some(lmax));
            let total: f64 = m.eval_2d(&params).unwrap().iter().flatten().sum();
            assert!(total < previous, "lambda_max = {}: {} !< {}", lmax, total, previous);
            previous = total;
        }
    }

    #[test]
    fn test_transfer_mismatch_leaves_state_untouched() {
        let x = grid(1.0, 3.6, 1e-2);
        let mut m = model(&x, silicon(1.2, 3.5), true, None);
        let before = m.get_params();

        let pattern1d = Pattern1D::from_xy(x.clone(), vec![0.0; x.len()]).unwrap();
        let fewer_hkls = PawleyPattern1D::new(pattern1d.clone(), vec![silicon(2.0, 3.5)], gaussian(), None);
        let diags = m.set_params_from_pawley1d(&fewer_hkls);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.count(Severity::Error), 1);

        let two_phases = PawleyPattern1D::new(
            pattern1d,
            vec![silicon(1.2, 3.5), silicon(1.2, 3.5)],
            gaussian(),
            None,
        );
        assert_eq!(m.set_params_from_pawley1d(&two_phases).len(), 1);

        assert_eq!(m.get_params(), before);
        assert_eq!(m.scale_estimates, 0);
    }

    #[test]
    fn test_transfer_copies_and_reestimates_scale() {
        let x = grid(1.2, 3.5, 2e-4);
        let intensities = [1.0, 2.0, 0.5, 1.5, 3.0, 0.8];

        let generator = model(&x, silicon(1.2, 3.5), true, None);
        let mut truth = generator.get_params();
        truth[0] = 2.0;
        truth[1..7].copy_from_slice(&intensities);
        let ys = generator.eval_2d(&truth).unwrap();

        let phase = silicon(1.2, 3.5);
        let mut m = PawleyPattern2D::new(pattern_from(&x, ys), vec![phase.clone()], gaussian(), true, None, None);

        let pattern1d = Pattern1D::from_xy(x.clone(), vec![0.0; x.len()]).unwrap();
        let mut m1 = PawleyPattern1D::new(pattern1d, vec![phase], gaussian(), None);
        let mut p1 = m1.get_params();
        p1[..6].copy_from_slice(&intensities);
        m1.set_params(&p1).unwrap();

        let diags = m.set_params_from_pawley1d(&m1);
        assert!(diags.is_empty());
        assert_eq!(m.scale_estimates, 1);
        for row in m.intens() {
            assert_eq!(row, intensities.to_vec());
        }
        assert_eq!(m.profile_params()[1], m1.profile_params());
        assert!((m.scale() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_normalises_reference_intensity() {
        let x = grid(1.0, 3.6, 1e-3);
        let mut m = model(&x, silicon(1.2, 3.5), false, None);
        let estimate = m.estimate_initial_params().unwrap();
        // 全零数据：scale = 0
        assert_eq!(estimate[0], 0.0);

        let generator = model(&x, silicon(1.2, 3.5), true, None);
        let mut truth = generator.get_params();
        truth[0] = 3.0;
        let ys = generator.eval_2d(&truth).unwrap();
        let mut m = PawleyPattern2D::new(pattern_from(&x, ys), vec![silicon(1.2, 3.5)], gaussian(), true, None, None);
        m.estimate_initial_params().unwrap();
        assert!((m.intens()[0][0] - 1.0).abs() < 1e-12);
        assert!(m.scale() > 0.0);
    }

    #[test]
    fn test_fit_recovers_scale_and_intensities() {
        let x = grid(1.2, 3.3, 2e-4);
        let intensities = [1.0, 0.6, 0.4, 0.2, 0.3, 0.5];

        let generator = model(&x, silicon(1.2, 3.5), true, None);
        let mut truth = generator.get_params();
        truth[0] = 4.0;
        truth[1..7].copy_from_slice(&intensities);
        let ys = generator.eval_2d(&truth).unwrap();

        let mut m = PawleyPattern2D::new(pattern_from(&x, ys), vec![silicon(1.2, 3.5)], gaussian(), true, None, None);
        let result = m.fit(Some(300)).unwrap();
        assert!(result.cost < 1e-8);
        assert!((m.scale() - 4.0).abs() < 1e-4);
        for (fit, expected) in m.intens()[0].iter().zip(intensities) {
            assert!((fit - expected).abs() < 1e-4, "{} vs {}", fit, expected);
        }
        // 绑定行随第 0 行更新
        assert_eq!(m.intens()[2], m.intens()[0]);
        assert_eq!(m.history().len(), 1);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let mut m = model(&grid(1.0, 3.6, 1e-2), silicon(2.0, 3.5), true, None);
        assert!(m.set_params(&[1.0]).is_err());
        assert!(m.eval_2d(&[1.0]).is_err());
    }
}
