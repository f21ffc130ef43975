//! # 物相
//!
//! 一个物相 = 晶胞 + 空间群 + 衍射 (HKL) 列表。
//!
//! - 晶格参数按晶系只暴露独立分量（见 `crystal::constraints`）
//! - HKL 列表中永远不含被空间群禁止的衍射
//! - 多个精修模型可以共享同一个物相（`PhaseRef`），任一模型拟合后
//!   的晶格参数对其他模型立即可见
//!
//! ## 依赖关系
//! - 被 `pawley/` 使用
//! - 使用 `crystal/`、`parsers/cif.rs`、`diagnostics.rs`

use crate::crystal::{
    Centering, CrystalSystem, Hkl, LatticeConstraint, SpaceGroup, UnitCell,
};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{PawleyError, Result};
use crate::parsers::cif;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 物相
#[derive(Debug, Clone)]
pub struct Phase {
    name: String,
    cell: UnitCell,
    spacegroup: SpaceGroup,
    constraint: LatticeConstraint,
    hkls: Vec<Hkl>,
}

impl Phase {
    /// 从晶格长度、角度和空间群符号创建
    pub fn from_lattice(
        name: &str,
        lengths: [f64; 3],
        angles: [f64; 3],
        spacegroup_symbol: &str,
    ) -> Result<Self> {
        let spacegroup = SpaceGroup::from_symbol(spacegroup_symbol)?;
        let rhombohedral = spacegroup.centering() == Centering::R
            && (lengths[0] - lengths[1]).abs() < 1e-6
            && (lengths[0] - lengths[2]).abs() < 1e-6
            && (angles[0] - angles[1]).abs() < 1e-6
            && (angles[0] - angles[2]).abs() < 1e-6
            && (angles[0] - 90.0).abs() > 1e-6;
        let spacegroup = spacegroup.with_rhombohedral_axes(rhombohedral);

        let cell = UnitCell::from_parameters(
            lengths[0], lengths[1], lengths[2], angles[0], angles[1], angles[2],
        )?;
        let constraint = LatticeConstraint::for_spacegroup(&spacegroup);

        tracing::debug!(
            "Created phase '{}' ({}, {})",
            name,
            spacegroup.hm_symbol(),
            spacegroup.crystal_system()
        );

        Ok(Phase {
            name: name.to_string(),
            cell,
            spacegroup,
            constraint,
            hkls: Vec::new(),
        })
    }

    /// 从三个晶格长度创建，角度按晶系取默认值（六方/三方 γ = 120°，其余 90°）
    pub fn from_alatt(lengths: [f64; 3], spacegroup_symbol: &str) -> Result<Self> {
        let spacegroup = SpaceGroup::from_symbol(spacegroup_symbol)?;
        let angles = LatticeConstraint::for_spacegroup(&spacegroup).default_angles();
        let name = spacegroup.hm_symbol().replace(' ', "");
        Self::from_lattice(&name, lengths, angles, spacegroup_symbol)
    }

    /// 从 CIF 文件创建；任何失败都作为 ParseError 返回
    pub fn from_cif(path: &Path) -> Result<Self> {
        let as_parse_error = |e: PawleyError| match e {
            e @ PawleyError::ParseError { .. } => e,
            other => PawleyError::ParseError {
                format: "cif".to_string(),
                path: path.display().to_string(),
                reason: other.to_string(),
            },
        };

        let cif = cif::parse_cif_file(path).map_err(as_parse_error)?;
        Self::from_lattice(&cif.name, cif.lengths, cif.angles, &cif.spacegroup)
            .map_err(as_parse_error)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn cell(&self) -> &UnitCell {
        &self.cell
    }

    pub fn spacegroup(&self) -> &SpaceGroup {
        &self.spacegroup
    }

    pub fn crystal_system(&self) -> CrystalSystem {
        self.spacegroup.crystal_system()
    }

    // ─────────────────────────────────────────────────────────────
    // 晶格参数
    // ─────────────────────────────────────────────────────────────

    /// 晶系的独立晶格参数
    pub fn get_params(&self) -> Vec<f64> {
        self.constraint.extract(&self.cell)
    }

    pub fn get_param_names(&self) -> Vec<String> {
        self.constraint
            .param_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn nparams(&self) -> usize {
        self.constraint.nparams()
    }

    /// 由独立参数重建晶胞，HKL 列表不变
    pub fn set_params(&mut self, values: &[f64]) -> Result<()> {
        self.cell = self.constraint.build(values)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 衍射列表
    // ─────────────────────────────────────────────────────────────

    /// 生成 d ∈ [d_min, d_max] 内所有允许的衍射，每个 Laue 等效族保留一个，
    /// 按 d 降序排列
    pub fn set_hkls_from_dspac_limits(&mut self, d_min: f64, d_max: f64) -> Result<()> {
        if d_min.is_nan() || d_min <= 0.0 || d_min > d_max {
            return Err(PawleyError::DataError(format!(
                "Invalid d-spacing range [{}, {}]",
                d_min, d_max
            )));
        }

        let [mh, mk, ml] = self.cell.max_indices(d_min);
        let mut seen: BTreeSet<Hkl> = BTreeSet::new();
        let mut found: Vec<(f64, Hkl)> = Vec::new();

        for h in -mh..=mh {
            for k in -mk..=mk {
                for l in -ml..=ml {
                    let hkl = [h, k, l];
                    let d = self.cell.d_spacing(hkl);
                    if d < d_min || d > d_max || !self.spacegroup.is_allowed(hkl) {
                        continue;
                    }
                    let canonical = self.spacegroup.canonical(hkl);
                    if seen.insert(canonical) {
                        found.push((d, canonical));
                    }
                }
            }
        }

        found.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        self.hkls = found.into_iter().map(|(_, hkl)| hkl).collect();

        if self.hkls.is_empty() {
            tracing::warn!(
                "No allowed reflections for phase '{}' in d range [{}, {}]",
                self.name,
                d_min,
                d_max
            );
        } else {
            tracing::debug!(
                "Phase '{}': {} reflections in d range [{}, {}]",
                self.name,
                self.hkls.len(),
                d_min,
                d_max
            );
        }
        Ok(())
    }

    /// 设置显式 HKL 列表，丢弃被禁止的衍射和重复项（保留首次出现的顺序）
    ///
    /// 有被禁止的衍射时返回恰好一条 `ForbiddenReflections` 警告，
    /// 有重复项时另返回一条 `DuplicateReflections` 警告。
    pub fn set_hkls(&mut self, hkls: &[Hkl]) -> Diagnostics {
        let mut seen: BTreeSet<Hkl> = BTreeSet::new();
        let mut duplicates: Vec<Hkl> = Vec::new();
        let mut unique: Vec<Hkl> = Vec::with_capacity(hkls.len());
        for hkl in hkls {
            if seen.insert(*hkl) {
                unique.push(*hkl);
            } else {
                duplicates.push(*hkl);
            }
        }

        let (allowed, forbidden): (Vec<Hkl>, Vec<Hkl>) = unique
            .into_iter()
            .partition(|hkl| self.spacegroup.is_allowed(*hkl));

        let mut diagnostics = Diagnostics::new();
        if !forbidden.is_empty() {
            diagnostics.warn(
                DiagnosticKind::ForbiddenReflections,
                format!(
                    "Phase '{}': dropped {} reflection(s) forbidden by {}: {}",
                    self.name,
                    forbidden.len(),
                    self.spacegroup.hm_symbol(),
                    format_hkls(&forbidden)
                ),
            );
        }

        if !duplicates.is_empty() {
            diagnostics.warn(
                DiagnosticKind::DuplicateReflections,
                format!(
                    "Phase '{}': ignored {} duplicate reflection(s): {}",
                    self.name,
                    duplicates.len(),
                    format_hkls(&duplicates)
                ),
            );
        }

        self.hkls = allowed;
        diagnostics
    }

    pub fn hkls(&self) -> &[Hkl] {
        &self.hkls
    }

    pub fn nhkls(&self) -> usize {
        self.hkls.len()
    }

    /// 当前晶胞下各衍射的 d 间距
    pub fn dspacings(&self) -> Vec<f64> {
        self.hkls.iter().map(|h| self.cell.d_spacing(*h)).collect()
    }
}

fn format_hkls(hkls: &[Hkl]) -> String {
    hkls.iter()
        .map(|h| format!("({} {} {})", h[0], h[1], h[2]))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 共享物相句柄
///
/// 克隆只复制句柄。拟合期间同一物相只允许一个模型写入。
#[derive(Debug, Clone)]
pub struct PhaseRef(Arc<RwLock<Phase>>);

impl PhaseRef {
    pub fn new(phase: Phase) -> Self {
        PhaseRef(Arc::new(RwLock::new(phase)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Phase> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Phase> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 两个句柄是否指向同一物相
    pub fn ptr_eq(&self, other: &PhaseRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Phase> for PhaseRef {
    fn from(phase: Phase) -> Self {
        PhaseRef::new(phase)
    }
}
