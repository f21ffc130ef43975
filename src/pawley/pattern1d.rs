//! # 单谱 Pawley 精修
//!
//! 复合模型 = Σ 物相 Σ HKL 一个以 d(hkl) 为中心、积分强度独立的峰 + 可选背底。
//!
//! ## 参数向量布局
//! ```text
//! [I_1 .. I_M]            积分强度（所有物相的 HKL 依次拼接），自由，≥ 0
//! [lattice_p ...]         每个物相的独立晶格参数，默认固定，> 0
//! [bg_0 .. bg_k]          背底系数，自由，初值 0
//! [res_0 .. res_n]        峰形的分辨率系数，始终固定
//! ```
//!
//! 写入晶格参数会同步到共享物相；写入峰形参数会更新峰形的分辨率模型。

use crate::background::Background;
use crate::diagnostics::Diagnostics;
use crate::error::{PawleyError, Result};
use crate::models::{ParameterVector, Pattern1D};
use crate::pawley::model::{
    block, nearest_value, rwp, run_fit, PhaseBlock, Reflection, Refinable, LATTICE_LOWER,
};
use crate::phase::PhaseRef;
use crate::profile::PeakProfile;
use crate::solver::{FitResult, LeastSquaresSolver, LevenbergMarquardt};

use std::f64::consts::PI;
use std::ops::Range;

#[derive(Debug, Clone, Default)]
struct Layout {
    intens: Vec<Range<usize>>,
    lattice: Vec<Range<usize>>,
    bg: Range<usize>,
    profile: Range<usize>,
}

/// 单谱精修模型
#[derive(Debug, Clone)]
pub struct PawleyPattern1D {
    pattern: Pattern1D,
    phases: Vec<PhaseRef>,
    blocks: Vec<PhaseBlock>,
    profile: PeakProfile,
    bg_func: Option<Background>,
    params: ParameterVector,
    layout: Layout,
    lattice_free: bool,
    history: Vec<FitResult>,
}

impl PawleyPattern1D {
    pub fn new(
        pattern: Pattern1D,
        phases: Vec<PhaseRef>,
        profile: PeakProfile,
        bg_func: Option<Background>,
    ) -> Self {
        let mut model = PawleyPattern1D {
            pattern,
            phases,
            blocks: Vec::new(),
            profile,
            bg_func,
            params: ParameterVector::new(),
            layout: Layout::default(),
            lattice_free: false,
            history: Vec::new(),
        };
        model.rebuild();
        model
    }

    /// 按当前物相 HKL 与背底重建参数向量；强度重置为 1，背底重置为 0
    fn rebuild(&mut self) {
        self.blocks = self.phases.iter().map(PhaseBlock::snapshot).collect();

        let mut params = ParameterVector::new();
        let mut start = 0;
        let mut layout = Layout::default();

        for b in &self.blocks {
            layout.intens.push(block(&mut start, b.hkls.len()));
            for hkl in &b.hkls {
                params.push(b.intensity_name(hkl), 1.0, true, 0.0);
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
        layout.bg = block(&mut start, bg_names.len());
        for name in bg_names {
            params.push(name, 0.0, true, f64::NEG_INFINITY);
        }

        layout.profile = block(&mut start, self.profile.nparams());
        for (name, value) in self.profile.param_names().into_iter().zip(self.profile.params()) {
            params.push(name, value, false, f64::NEG_INFINITY);
        }

        tracing::debug!(
            "Built 1D model: {} reflections, {} parameters ({} free)",
            self.nhkls_total(),
            params.len(),
            params.nfree()
        );

        self.params = params;
        self.layout = layout;
    }

    /// 物相 HKL 列表变化后重建模型
    pub fn update_phases(&mut self) {
        self.rebuild();
    }

    pub fn set_bg_func(&mut self, bg_func: Option<Background>) {
        self.bg_func = bg_func;
        self.rebuild();
    }

    /// 晶格参数是否参与拟合
    pub fn set_lattice_free(&mut self, free: bool) {
        self.lattice_free = free;
        for range in &self.layout.lattice {
            for i in range.clone() {
                self.params.set_free(i, free);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 访问器
    // ─────────────────────────────────────────────────────────────

    pub fn pattern(&self) -> &Pattern1D {
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

    pub fn history(&self) -> &[FitResult] {
        &self.history
    }

    pub fn nhkls_total(&self) -> usize {
        self.blocks.iter().map(|b| b.hkls.len()).sum()
    }

    /// 模型中每个物相的 HKL 数
    pub fn nhkls_per_phase(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.hkls.len()).collect()
    }

    // ─────────────────────────────────────────────────────────────
    // 参数
    // ─────────────────────────────────────────────────────────────

    /// 当前参数；晶格部分读取共享物相的最新值
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

    /// 积分强度（按物相拼接）
    pub fn intensities(&self) -> Vec<Vec<f64>> {
        self.layout
            .intens
            .iter()
            .map(|r| self.params.values()[r.clone()].to_vec())
            .collect()
    }

    /// 峰形参数
    pub fn profile_params(&self) -> Vec<f64> {
        self.params.values()[self.layout.profile.clone()].to_vec()
    }

    pub fn set_params(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(PawleyError::ConfigurationError(format!(
                "1D model has {} parameters, got {}",
                self.params.len(),
                values.len()
            )));
        }

        // 先全部校验，再写入，避免部分修改
        for (b, range) in self.blocks.iter().zip(&self.layout.lattice) {
            b.constraint.build(&values[range.clone()])?;
        }
        self.profile
            .resolution_from(&values[self.layout.profile.clone()])?;

        for (phase, range) in self.phases.iter().zip(&self.layout.lattice) {
            phase.write().set_params(&values[range.clone()])?;
        }
        self.profile.set_params(&values[self.layout.profile.clone()])?;
        self.params.set_values(values)
    }

    /// 只覆盖自由参数
    pub fn set_free_params(&mut self, free_values: &[f64]) -> Result<()> {
        let full = self.synced().merge_free(free_values)?;
        self.set_params(&full)
    }

    /// 按峰位处的数据幅值估计积分强度：I ≈ max(y, 0)·sqrt(2π)·σ(d)
    pub fn estimate_initial_params(&mut self) -> Result<Vec<f64>> {
        let mut values = self.get_params();
        let resolution = self
            .profile
            .resolution_from(&values[self.layout.profile.clone()])?;

        for ((b, intens), lattice) in self
            .blocks
            .iter()
            .zip(&self.layout.intens)
            .zip(&self.layout.lattice)
        {
            let dspacings = b.dspacings(&values[lattice.clone()])?;
            for (i, d) in intens.clone().zip(dspacings) {
                let height = nearest_value(self.pattern.x(), self.pattern.y(), d)
                    .unwrap_or(0.0)
                    .max(0.0);
                values[i] = height * (2.0 * PI).sqrt() * resolution.sigma(d);
            }
        }

        self.set_params(&values)?;
        Ok(values)
    }

    // ─────────────────────────────────────────────────────────────
    // 计算
    // ─────────────────────────────────────────────────────────────

    /// 在数据的 d 轴上计算模型（不修改状态）
    pub fn eval_profile(&self, params: &[f64]) -> Result<Vec<f64>> {
        if params.len() != self.params.len() {
            return Err(PawleyError::ConfigurationError(format!(
                "1D model has {} parameters, got {}",
                self.params.len(),
                params.len()
            )));
        }

        let x = self.pattern.x();
        let mut y = vec![0.0; x.len()];
        let resolution = self
            .profile
            .resolution_from(&params[self.layout.profile.clone()])?;

        for ((b, intens), lattice) in self
            .blocks
            .iter()
            .zip(&self.layout.intens)
            .zip(&self.layout.lattice)
        {
            let dspacings = b.dspacings(&params[lattice.clone()])?;
            for (i, d) in intens.clone().zip(dspacings) {
                self.profile.add_peak(&resolution, d, params[i], x, &mut y);
            }
        }

        if let Some(bg) = &self.bg_func {
            bg.add_to(x, &params[self.layout.bg.clone()], &mut y);
        }
        Ok(y)
    }

    /// 残差 = 观测值 − 计算值；数据全为零时其积分等于 −(模型积分)
    pub fn eval_resids(&self, params: &[f64]) -> Result<Vec<f64>> {
        let calc = self.eval_profile(params)?;
        Ok(self
            .pattern
            .y()
            .iter()
            .zip(&calc)
            .map(|(o, c)| o - c)
            .collect())
    }

    pub fn rwp(&self, params: &[f64]) -> Result<f64> {
        let resids = self.eval_resids(params)?;
        Ok(rwp(
            &resids,
            self.pattern.y(),
            self.pattern.spectrum.e.as_deref(),
        ))
    }

    /// 当前参数下各衍射的 d 与积分强度
    pub fn reflections(&self) -> Result<Vec<Reflection>> {
        let values = self.get_params();
        let mut out = Vec::new();
        for (p, ((b, intens), lattice)) in self
            .blocks
            .iter()
            .zip(&self.layout.intens)
            .zip(&self.layout.lattice)
            .enumerate()
        {
            let dspacings = b.dspacings(&values[lattice.clone()])?;
            for ((hkl, i), d) in b.hkls.iter().zip(intens.clone()).zip(dspacings) {
                out.push(Reflection {
                    phase: p,
                    phase_name: b.name.clone(),
                    hkl: *hkl,
                    d,
                    intensity: values[i],
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

    /// 最近一次拟合的诊断
    pub fn last_diagnostics(&self) -> Diagnostics {
        self.history
            .last()
            .map(|r| r.diagnostics.clone())
            .unwrap_or_default()
    }
}

impl Refinable for PawleyPattern1D {
    fn label(&self) -> String {
        format!("1D pattern '{}'", self.pattern.name)
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
    use crate::diagnostics::{DiagnosticKind, Severity};
    use crate::pawley::model::integrate;
    use crate::phase::Phase;
    use crate::profile::{GaussianProfile, PVProfile};
    use crate::solver::FitStatus;

    const SI_A: f64 = 5.43094;

    fn silicon(d_min: f64, d_max: f64) -> PhaseRef {
        let mut phase = Phase::from_alatt([SI_A; 3], "Fd-3m").unwrap();
        phase.set_hkls_from_dspac_limits(d_min, d_max).unwrap();
        PhaseRef::new(phase)
    }

    fn grid(lo: f64, hi: f64, step: f64) -> Vec<f64> {
        let n = ((hi - lo) / step).round() as usize;
        (0..=n).map(|i| lo + i as f64 * step).collect()
    }

    fn zero_pattern(x: Vec<f64>) -> Pattern1D {
        let y = vec![0.0; x.len()];
        Pattern1D::from_xy(x, y).unwrap()
    }

    fn gaussian() -> PeakProfile {
        PeakProfile::Gaussian(GaussianProfile::default())
    }

    #[test]
    fn test_parameter_layout() {
        let phase = silicon(1.2, 3.5);
        let model = PawleyPattern1D::new(
            zero_pattern(grid(1.1, 3.6, 0.01)),
            vec![phase],
            gaussian(),
            Some(Background::Polynomial { order: 1 }),
        );

        let names = model.get_param_names();
        let isfree = model.get_isfree();
        assert_eq!(names.len(), 6 + 1 + 2 + 3);
        assert_eq!(model.get_params().len(), isfree.len());
        assert!(isfree[..6].iter().all(|f| *f));
        // 晶格默认固定，背底自由，峰形始终固定
        assert!(!isfree[6]);
        assert!(isfree[7] && isfree[8]);
        assert!(isfree[9..].iter().all(|f| !*f));
        assert_eq!(names[0], "Fd-3m:I(1 1 1)");
    }

    #[test]
    fn test_profile_area_equals_reflection_count() {
        let phase = silicon(1.2, 3.5);
        let model = PawleyPattern1D::new(
            zero_pattern(grid(1.0, 3.6, 1e-4)),
            vec![phase],
            gaussian(),
            None,
        );
        let params = model.get_params();
        let calc = model.eval_profile(&params).unwrap();
        let area = integrate(model.pattern().x(), &calc);
        assert!((area - model.nhkls_total() as f64).abs() < 1e-5);
    }

    #[test]
    fn test_resids_are_negative_profile_for_zero_data() {
        let phases = vec![silicon(1.2, 3.5), silicon(2.0, 3.5)];
        let model = PawleyPattern1D::new(
            zero_pattern(grid(1.0, 3.6, 1e-4)),
            phases,
            PeakProfile::PseudoVoigt(PVProfile::default()),
            None,
        );
        let params = model.get_params();
        let x = model.pattern().x();
        let resid_area = integrate(x, &model.eval_resids(&params).unwrap());
        let profile_area = integrate(x, &model.eval_profile(&params).unwrap());

        assert_eq!(model.nhkls_total(), 7);
        assert!((resid_area + profile_area).abs() < 1e-12);
        assert!((resid_area + 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_fit_with_single_evaluation() {
        let phase = silicon(2.0, 3.5);
        let mut model = PawleyPattern1D::new(
            zero_pattern(grid(2.9, 3.3, 1e-4)),
            vec![phase],
            gaussian(),
            None,
        );
        let result = model.fit(Some(1)).unwrap();
        assert_eq!(result.nfev, 1);
        assert_eq!(result.max_nfev, Some(1));
        assert_eq!(result.status, FitStatus::MaxEvaluations);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::ConvergenceWarning && d.severity == Severity::Warning));
        assert_eq!(model.history().len(), 1);
    }

    #[test]
    fn test_estimate_on_zero_data() {
        let phase = silicon(1.2, 3.5);
        let mut model = PawleyPattern1D::new(
            zero_pattern(grid(1.0, 3.6, 1e-3)),
            vec![phase],
            gaussian(),
            None,
        );
        let estimate = model.estimate_initial_params().unwrap();
        assert!(estimate[..6].iter().all(|v| v.abs() < 1e-12));
        assert!((model.get_params()[6] - SI_A).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_tracks_peak_height() {
        let phase = silicon(2.0, 3.5);
        let x = grid(3.0, 3.3, 1e-4);
        let generator = PawleyPattern1D::new(zero_pattern(x.clone()), vec![phase.clone()], gaussian(), None);
        let truth = {
            let mut p = generator.get_params();
            p[0] = 2.5;
            p
        };
        let y = generator.eval_profile(&truth).unwrap();
        let mut model = PawleyPattern1D::new(Pattern1D::from_xy(x, y).unwrap(), vec![phase], gaussian(), None);

        let estimate = model.estimate_initial_params().unwrap();
        assert!((estimate[0] - 2.5).abs() / 2.5 < 0.01);
    }

    #[test]
    fn test_set_free_params_leaves_fixed_slots() {
        let phase = silicon(2.0, 3.5);
        let mut model = PawleyPattern1D::new(
            zero_pattern(grid(2.9, 3.3, 1e-3)),
            vec![phase],
            gaussian(),
            Some(Background::Flat),
        );
        let before = model.get_params();
        // 自由参数：I(111), bg_c0
        model.set_free_params(&[4.0, 0.5]).unwrap();
        let after = model.get_params();

        assert_eq!(after[0], 4.0);
        assert_eq!(after[2], 0.5);
        assert_eq!(after[1], before[1]);
        assert_eq!(after[3..], before[3..]);
        assert!(model.set_free_params(&[1.0]).is_err());
    }

    #[test]
    fn test_lattice_writes_through_to_shared_phase() {
        let phase = silicon(2.0, 3.5);
        let mut model = PawleyPattern1D::new(
            zero_pattern(grid(2.9, 3.3, 1e-3)),
            vec![phase.clone()],
            gaussian(),
            None,
        );
        let mut params = model.get_params();
        params[1] = 5.44;
        model.set_params(&params).unwrap();
        assert!((phase.read().get_params()[0] - 5.44).abs() < 1e-12);

        phase.write().set_params(&[5.45]).unwrap();
        assert!((model.get_params()[1] - 5.45).abs() < 1e-12);

        params[1] = -1.0;
        assert!(model.set_params(&params).is_err());
        assert!((phase.read().get_params()[0] - 5.45).abs() < 1e-12);
    }

    #[test]
    fn test_fit_recovers_intensities_and_lattice() {
        let truth_phase = silicon(1.2, 3.5);
        let x = grid(1.2, 3.3, 2e-4);
        let generator = PawleyPattern1D::new(zero_pattern(x.clone()), vec![truth_phase], gaussian(), None);
        let mut truth = generator.get_params();
        let intensities = [5.0, 3.0, 2.0, 0.5, 1.0, 1.5];
        truth[..6].copy_from_slice(&intensities);
        let y = generator.eval_profile(&truth).unwrap();

        let phase = silicon(1.2, 3.5);
        phase.write().set_params(&[SI_A + 2e-4]).unwrap();
        let mut model = PawleyPattern1D::new(Pattern1D::from_xy(x, y).unwrap(), vec![phase.clone()], gaussian(), None);
        model.set_lattice_free(true);
        model.estimate_initial_params().unwrap();

        let result = model.fit(Some(500)).unwrap();
        let fitted = model.get_params();
        for (fit, expected) in fitted[..6].iter().zip(intensities) {
            assert!((fit - expected).abs() < 1e-3, "{} vs {}", fit, expected);
        }
        assert!((phase.read().get_params()[0] - SI_A).abs() < 1e-6);
        assert!(result.cost < 1e-6);
        assert!(model.rwp(&fitted).unwrap() < 1e-3);
    }

    #[test]
    fn test_set_bg_func_rebuilds() {
        let phase = silicon(2.0, 3.5);
        let mut model = PawleyPattern1D::new(
            zero_pattern(grid(2.9, 3.3, 1e-3)),
            vec![phase],
            gaussian(),
            None,
        );
        let n = model.get_params().len();
        model.set_bg_func(Some(Background::Polynomial { order: 2 }));
        assert_eq!(model.get_params().len(), n + 3);
        assert_eq!(model.reflections().unwrap().len(), 1);
    }
}
