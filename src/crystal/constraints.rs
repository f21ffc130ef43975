//! # 晶系约束
//!
//! 每个晶系只有部分晶格参数独立，精修时只暴露这些参数：
//!
//! | 晶系 | 独立参数 |
//! |------|----------|
//! | 立方 | a |
//! | 四方 | a, c |
//! | 六方/三方（六方轴） | a, c |
//! | 菱方轴 | a, alpha |
//! | 正交 | a, b, c |
//! | 单斜 | a, b, c, 唯一轴夹角 |
//! | 三斜 | a, b, c, alpha, beta, gamma |
//!
//! ## 依赖关系
//! - 被 `phase.rs` 使用
//! - 使用 `crystal/cell.rs`、`crystal/spacegroup.rs`

use crate::crystal::{Axis, CrystalSystem, SpaceGroup, UnitCell};
use crate::error::{PawleyError, Result};

/// 晶格参数约束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatticeConstraint {
    Cubic,
    Tetragonal,
    /// 六方与三方（六方轴，γ = 120°）
    Hexagonal,
    /// 菱方轴 (a = b = c, α = β = γ)
    Rhombohedral,
    Orthorhombic,
    Monoclinic(Axis),
    Triclinic,
}

impl LatticeConstraint {
    pub fn for_spacegroup(spacegroup: &SpaceGroup) -> Self {
        match spacegroup.crystal_system() {
            CrystalSystem::Cubic => LatticeConstraint::Cubic,
            CrystalSystem::Tetragonal => LatticeConstraint::Tetragonal,
            CrystalSystem::Trigonal if spacegroup.is_rhombohedral_axes() => {
                LatticeConstraint::Rhombohedral
            }
            CrystalSystem::Trigonal | CrystalSystem::Hexagonal => LatticeConstraint::Hexagonal,
            CrystalSystem::Orthorhombic => LatticeConstraint::Orthorhombic,
            CrystalSystem::Monoclinic => {
                LatticeConstraint::Monoclinic(spacegroup.unique_axis().unwrap_or(Axis::Y))
            }
            CrystalSystem::Triclinic => LatticeConstraint::Triclinic,
        }
    }

    pub fn param_names(&self) -> Vec<&'static str> {
        match self {
            LatticeConstraint::Cubic => vec!["a"],
            LatticeConstraint::Tetragonal | LatticeConstraint::Hexagonal => vec!["a", "c"],
            LatticeConstraint::Rhombohedral => vec!["a", "alpha"],
            LatticeConstraint::Orthorhombic => vec!["a", "b", "c"],
            LatticeConstraint::Monoclinic(Axis::X) => vec!["a", "b", "c", "alpha"],
            LatticeConstraint::Monoclinic(Axis::Z) => vec!["a", "b", "c", "gamma"],
            LatticeConstraint::Monoclinic(_) => vec!["a", "b", "c", "beta"],
            LatticeConstraint::Triclinic => vec!["a", "b", "c", "alpha", "beta", "gamma"],
        }
    }

    pub fn nparams(&self) -> usize {
        self.param_names().len()
    }

    /// 从晶胞中取出独立参数
    pub fn extract(&self, cell: &UnitCell) -> Vec<f64> {
        let (a, b, c, alpha, beta, gamma) = cell.parameters();
        match self {
            LatticeConstraint::Cubic => vec![a],
            LatticeConstraint::Tetragonal | LatticeConstraint::Hexagonal => vec![a, c],
            LatticeConstraint::Rhombohedral => vec![a, alpha],
            LatticeConstraint::Orthorhombic => vec![a, b, c],
            LatticeConstraint::Monoclinic(Axis::X) => vec![a, b, c, alpha],
            LatticeConstraint::Monoclinic(Axis::Z) => vec![a, b, c, gamma],
            LatticeConstraint::Monoclinic(_) => vec![a, b, c, beta],
            LatticeConstraint::Triclinic => vec![a, b, c, alpha, beta, gamma],
        }
    }

    /// 由独立参数重建晶胞
    pub fn build(&self, values: &[f64]) -> Result<UnitCell> {
        if values.len() != self.nparams() {
            return Err(PawleyError::ConfigurationError(format!(
                "Expected {} lattice parameters ({}), got {}",
                self.nparams(),
                self.param_names().join(", "),
                values.len()
            )));
        }

        let v = values;
        match self {
            LatticeConstraint::Cubic => UnitCell::from_parameters(v[0], v[0], v[0], 90.0, 90.0, 90.0),
            LatticeConstraint::Tetragonal => {
                UnitCell::from_parameters(v[0], v[0], v[1], 90.0, 90.0, 90.0)
            }
            LatticeConstraint::Hexagonal => {
                UnitCell::from_parameters(v[0], v[0], v[1], 90.0, 90.0, 120.0)
            }
            LatticeConstraint::Rhombohedral => {
                UnitCell::from_parameters(v[0], v[0], v[0], v[1], v[1], v[1])
            }
            LatticeConstraint::Orthorhombic => {
                UnitCell::from_parameters(v[0], v[1], v[2], 90.0, 90.0, 90.0)
            }
            LatticeConstraint::Monoclinic(Axis::X) => {
                UnitCell::from_parameters(v[0], v[1], v[2], v[3], 90.0, 90.0)
            }
            LatticeConstraint::Monoclinic(Axis::Z) => {
                UnitCell::from_parameters(v[0], v[1], v[2], 90.0, 90.0, v[3])
            }
            LatticeConstraint::Monoclinic(_) => {
                UnitCell::from_parameters(v[0], v[1], v[2], 90.0, v[3], 90.0)
            }
            LatticeConstraint::Triclinic => {
                UnitCell::from_parameters(v[0], v[1], v[2], v[3], v[4], v[5])
            }
        }
    }

    /// 默认角度（由三个晶格长度构造晶胞时使用）
    pub fn default_angles(&self) -> [f64; 3] {
        match self {
            LatticeConstraint::Hexagonal => [90.0, 90.0, 120.0],
            _ => [90.0, 90.0, 90.0],
        }
    }
}
