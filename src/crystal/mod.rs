//! # 晶体学模块
//!
//! 晶胞几何、空间群符号解析与系统消光判据、晶系对应的独立晶格参数。
//!
//! ## 子模块
//! - `cell`: 晶胞参数、度量张量、d 间距
//! - `symmetry`: 旋转矩阵、心化、晶系
//! - `spacegroup`: Hermann–Mauguin 符号解析、消光判据、Laue 等效
//! - `constraints`: 各晶系的最小晶格参数集
//!
//! ## 依赖关系
//! - 被 `phase.rs`、`parsers/cif.rs` 使用

pub mod cell;
pub mod constraints;
pub mod spacegroup;
pub mod symmetry;

/// Miller 指数 (h, k, l)
pub type Hkl = [i32; 3];

pub use cell::UnitCell;
pub use constraints::LatticeConstraint;
pub use spacegroup::SpaceGroup;
pub use symmetry::{Axis, Centering, CrystalSystem};
