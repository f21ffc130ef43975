//! # 精修结果报告
//!
//! 把模型的当前状态整理成可导出、可绘图的数据：
//! - `FitCurve`: 观测 / 计算 / 差值曲线
//! - 衍射强度表、晶格参数表（`tabled`）
//!
//! ## 子模块
//! - `export`: CSV / XY 导出
//! - `plot`: `plotters` 绘图
//!
//! ## 依赖关系
//! - 被 `commands/`、`batch/` 使用
//! - 使用 `pawley/` 的模型

pub mod export;
pub mod plot;

use crate::error::Result;
use crate::pawley::{PawleyPattern1D, PawleyPattern2D, Reflection};
use crate::phase::PhaseRef;

use tabled::{Table, Tabled};

/// 一条谱的拟合曲线
#[derive(Debug, Clone, PartialEq)]
pub struct FitCurve {
    pub name: String,
    pub x: Vec<f64>,
    pub observed: Vec<f64>,
    pub calculated: Vec<f64>,
    pub difference: Vec<f64>,
}

impl FitCurve {
    pub fn from_pawley1d(model: &PawleyPattern1D) -> Result<Self> {
        let params = model.get_params();
        let pattern = model.pattern();
        Ok(FitCurve {
            name: pattern.name.clone(),
            x: pattern.x().to_vec(),
            observed: pattern.y().to_vec(),
            calculated: model.eval_profile(&params)?,
            difference: model.eval_resids(&params)?,
        })
    }

    /// 2D 模型逐谱生成曲线
    pub fn from_pawley2d(model: &PawleyPattern2D) -> Result<Vec<Self>> {
        let params = model.get_params();
        let calc = model.eval_2d(&params)?;
        let pattern = model.pattern();
        Ok(pattern
            .spectra()
            .iter()
            .zip(pattern.two_theta())
            .zip(calc)
            .map(|((s, tth), c)| {
                let difference = s.y.iter().zip(&c).map(|(o, c)| o - c).collect();
                FitCurve {
                    name: format!("{}_2th{:.1}", pattern.name, tth),
                    x: s.x.clone(),
                    observed: s.y.clone(),
                    calculated: c,
                    difference,
                }
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Tabled)]
struct ReflectionRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "(hkl)")]
    hkl: String,
    #[tabled(rename = "d (Å)")]
    d: String,
    #[tabled(rename = "Intensity")]
    intensity: String,
}

/// 衍射强度表
pub fn reflection_table(reflections: &[Reflection]) -> String {
    let rows: Vec<ReflectionRow> = reflections
        .iter()
        .map(|r| ReflectionRow {
            phase: r.phase_name.clone(),
            hkl: format!("({} {} {})", r.hkl[0], r.hkl[1], r.hkl[2]),
            d: format!("{:.5}", r.d),
            intensity: format!("{:.4}", r.intensity),
        })
        .collect();
    Table::new(&rows).to_string()
}

#[derive(Tabled)]
struct LatticeRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "System")]
    system: String,
    #[tabled(rename = "Parameters")]
    params: String,
}

/// 晶格参数表（只列独立参数）
pub fn lattice_table(phases: &[PhaseRef]) -> String {
    let rows: Vec<LatticeRow> = phases
        .iter()
        .map(|p| {
            let phase = p.read();
            let params = phase
                .get_param_names()
                .iter()
                .zip(phase.get_params())
                .map(|(n, v)| format!("{} = {:.6}", n, v))
                .collect::<Vec<_>>()
                .join(", ");
            LatticeRow {
                phase: phase.name().to_string(),
                system: phase.crystal_system().to_string(),
                params,
            }
        })
        .collect();
    Table::new(&rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pattern1D;
    use crate::phase::Phase;
    use crate::profile::PeakProfile;

    fn model() -> PawleyPattern1D {
        let mut phase = Phase::from_alatt([5.43094; 3], "Fd-3m").unwrap();
        phase.set_hkls_from_dspac_limits(2.0, 3.5).unwrap();
        let x: Vec<f64> = (0..=400).map(|i| 2.9 + i as f64 * 1e-3).collect();
        let pattern = Pattern1D::from_xy(x.clone(), vec![0.0; x.len()]).unwrap();
        PawleyPattern1D::new(pattern, vec![PhaseRef::new(phase)], PeakProfile::default(), None)
    }

    #[test]
    fn test_curve_from_1d() {
        let m = model();
        let curve = FitCurve::from_pawley1d(&m).unwrap();
        assert_eq!(curve.len(), 401);
        assert!(curve
            .calculated
            .iter()
            .zip(&curve.difference)
            .all(|(c, d)| (c + d).abs() < 1e-15));
    }

    #[test]
    fn test_tables_mention_reflections() {
        let m = model();
        let table = reflection_table(&m.reflections().unwrap());
        assert!(table.contains("(1 1 1)"));
        let lattice = lattice_table(m.phases());
        assert!(lattice.contains("cubic"));
        assert!(lattice.contains("Fd-3m"));
    }
}
