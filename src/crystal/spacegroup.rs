//! # 空间群
//!
//! 解析 Hermann–Mauguin 符号，给出晶系、心化、点群与系统消光判据。
//!
//! ## 支持的符号形式
//! - 带空格：`F d -3 m`、`P 63/m m c`、`P 1 21/c 1`
//! - 紧凑：`Fd-3m`、`P63/mmc`、`P21/c`、`P3121`
//! - 下划线螺旋轴：`P2_1/c`
//!
//! 紧凑符号存在歧义（如 `P321` 与 `P3_21`），按"螺旋轴优先"回溯分词，
//! 取第一个在对应晶系中合法的分词结果。
//!
//! ## 消光判据
//! 对符号中每个对称元素 (R, t) 及其在点群下的所有共轭 (gRg⁻¹, g·t)，
//! 若 h·R = h 且 h·t 不为整数则 h 消光；心化平移 c 要求 h·c 为整数。
//! 元素的位置（原点偏移）不影响该判据。
//!
//! ## 依赖关系
//! - 被 `phase.rs`、`crystal/constraints.rs` 使用
//! - 使用 `crystal/symmetry.rs`

use crate::crystal::symmetry::{
    closure, hkl_dot, hkl_mul, inverse_in, is_integer, mat_apply, mat_mul, mat_neg, Axis,
    Centering, CrystalSystem, IMat, IDENTITY,
};
use crate::crystal::Hkl;
use crate::error::{PawleyError, Result};

/// 符号中单个位置的对称元素，如 `21/c`、`-3`、`m`
#[derive(Debug, Clone, PartialEq, Eq)]
struct SymbolPosition {
    order: u8,
    inversion: bool,
    screw: u8,
    plane: Option<char>,
}

impl SymbolPosition {
    fn plane_only(letter: char) -> Self {
        SymbolPosition {
            order: 1,
            inversion: false,
            screw: 0,
            plane: Some(letter),
        }
    }

    /// 纯 `1`
    fn is_identity(&self) -> bool {
        self.order == 1 && !self.inversion && self.plane.is_none()
    }

    /// 旋转阶次；单独的镜面/滑移面按 2 次（-2）计
    fn rot_order(&self) -> u8 {
        if self.order == 1 && self.plane.is_some() {
            2
        } else {
            self.order
        }
    }

    fn format(&self) -> String {
        let mut s = String::new();
        let has_rotation = !(self.order == 1 && self.plane.is_some() && !self.inversion);
        if has_rotation {
            if self.inversion {
                s.push('-');
            }
            s.push_str(&self.order.to_string());
            if self.screw > 0 {
                s.push_str(&self.screw.to_string());
            }
            if let Some(p) = self.plane {
                s.push('/');
                s.push(p);
            }
        } else if let Some(p) = self.plane {
            s.push(p);
        }
        s
    }
}

fn is_plane_letter(c: char) -> bool {
    matches!(c, 'm' | 'a' | 'b' | 'c' | 'n' | 'd' | 'e')
}

/// 从 `rest` 开头可解析出的所有位置（按螺旋轴优先排序），返回 (消耗字符数, 位置)
fn position_candidates(rest: &[char]) -> Vec<(usize, SymbolPosition)> {
    let Some(&first) = rest.first() else {
        return vec![];
    };

    if is_plane_letter(first) {
        return vec![(1, SymbolPosition::plane_only(first))];
    }

    let inversion = first == '-';
    let i = usize::from(inversion);
    let order = match rest.get(i).and_then(|c| c.to_digit(10)) {
        Some(d @ (1 | 2 | 3 | 4 | 6)) => d as u8,
        _ => return vec![],
    };
    let i = i + 1;

    // (消耗长度, 螺旋分量)
    let mut bases: Vec<(usize, u8)> = Vec::new();
    if !inversion {
        match rest.get(i) {
            Some('_') => {
                if let Some(s) = rest.get(i + 1).and_then(|c| c.to_digit(10)) {
                    if s >= 1 && (s as u8) < order {
                        bases.push((i + 2, s as u8));
                    }
                }
                if bases.is_empty() {
                    return vec![];
                }
            }
            Some(c) => {
                if let Some(s) = c.to_digit(10) {
                    if s >= 1 && (s as u8) < order {
                        bases.push((i + 1, s as u8));
                    }
                }
                bases.push((i, 0));
            }
            None => bases.push((i, 0)),
        }
    } else {
        bases.push((i, 0));
    }

    bases
        .into_iter()
        .filter_map(|(len, screw)| {
            let mut pos = SymbolPosition {
                order,
                inversion,
                screw,
                plane: None,
            };
            if rest.get(len) == Some(&'/') {
                let letter = *rest.get(len + 1)?;
                if !is_plane_letter(letter) {
                    return None;
                }
                pos.plane = Some(letter);
                Some((len + 2, pos))
            } else {
                Some((len, pos))
            }
        })
        .collect()
}

/// 回溯枚举紧凑符号的所有分词
fn tokenize(
    rest: &[char],
    acc: &mut Vec<SymbolPosition>,
    out: &mut Vec<Vec<SymbolPosition>>,
) {
    if rest.is_empty() {
        out.push(acc.clone());
        return;
    }
    for (len, pos) in position_candidates(rest) {
        acc.push(pos);
        tokenize(&rest[len..], acc, out);
        acc.pop();
    }
}

/// 根据位置数与各位置阶次判定晶系及各位置的对称方向
fn classify(
    centering: Centering,
    positions: &[SymbolPosition],
) -> Option<(CrystalSystem, Vec<Option<Axis>>)> {
    let ones = positions.iter().filter(|p| p.is_identity()).count();
    let is_cubic_three = |p: &SymbolPosition| p.order == 3 && p.plane.is_none() && p.screw == 0;

    match positions {
        [p] => {
            let system = match p.rot_order() {
                1 => return Some((CrystalSystem::Triclinic, vec![None])),
                2 => return Some((CrystalSystem::Monoclinic, vec![Some(Axis::Y)])),
                3 if centering == Centering::R && p.screw > 0 => return None,
                3 => CrystalSystem::Trigonal,
                4 => CrystalSystem::Tetragonal,
                6 => CrystalSystem::Hexagonal,
                _ => return None,
            };
            Some((system, vec![Some(Axis::Z)]))
        }
        [p0, p1] => {
            if is_cubic_three(p1) && p0.rot_order() != 1 {
                Some((CrystalSystem::Cubic, vec![Some(Axis::Z), Some(Axis::Body)]))
            } else if p0.order == 3
                && p0.screw == 0
                && centering == Centering::R
                && p1.rot_order() == 2
            {
                Some((
                    CrystalSystem::Trigonal,
                    vec![Some(Axis::Z), Some(Axis::HexA)],
                ))
            } else {
                None
            }
        }
        [p0, p1, p2] => {
            let twofold = |p: &SymbolPosition| p.rot_order() == 2;
            if is_cubic_three(p1) {
                if ones > 0 || !twofold(p2) {
                    return None;
                }
                return Some((
                    CrystalSystem::Cubic,
                    vec![Some(Axis::Z), Some(Axis::Body), Some(Axis::Diagonal)],
                ));
            }
            let hex_axes = vec![Some(Axis::Z), Some(Axis::HexA), Some(Axis::Diagonal)];
            match p0.rot_order() {
                4 if ones == 0 && twofold(p1) && twofold(p2) => Some((
                    CrystalSystem::Tetragonal,
                    vec![Some(Axis::Z), Some(Axis::X), Some(Axis::Diagonal)],
                )),
                6 if ones == 0 && twofold(p1) && twofold(p2) => {
                    Some((CrystalSystem::Hexagonal, hex_axes))
                }
                3 if ones == 1
                    && centering != Centering::R
                    && (twofold(p1) || twofold(p2)) =>
                {
                    Some((CrystalSystem::Trigonal, hex_axes))
                }
                1 | 2 if ones == 2 => {
                    let idx = positions.iter().position(|p| !p.is_identity())?;
                    if !twofold(&positions[idx]) {
                        return None;
                    }
                    let mut axes = vec![None, None, None];
                    axes[idx] = Some([Axis::X, Axis::Y, Axis::Z][idx]);
                    Some((CrystalSystem::Monoclinic, axes))
                }
                2 if ones == 0 && twofold(p1) && twofold(p2) => Some((
                    CrystalSystem::Orthorhombic,
                    vec![Some(Axis::X), Some(Axis::Y), Some(Axis::Z)],
                )),
                _ => None,
            }
        }
        _ => None,
    }
}

/// 空间群
#[derive(Debug, Clone)]
pub struct SpaceGroup {
    centering: Centering,
    positions: Vec<SymbolPosition>,
    axes: Vec<Option<Axis>>,
    system: CrystalSystem,
    /// 点群旋转部分
    point_group: Vec<IMat>,
    /// Laue 群（点群 ∪ -点群）
    laue_group: Vec<IMat>,
    /// 带非零平移分量的对称操作（含共轭）
    translational_ops: Vec<(IMat, [f64; 3])>,
    /// 菱方轴设置（R 心化，a=b=c，α=β=γ≠90°）
    rhombohedral_axes: bool,
}

impl SpaceGroup {
    /// 从 Hermann–Mauguin 符号创建
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            PawleyError::ConfigurationError(format!(
                "Invalid space group symbol '{}': {}",
                symbol, reason
            ))
        };

        let trimmed = symbol.trim();
        let mut chars = trimmed.chars();
        let centering = chars
            .next()
            .and_then(Centering::from_char)
            .ok_or_else(|| invalid("missing lattice centring letter"))?;
        let body: String = chars.collect();

        let candidates: Vec<Vec<SymbolPosition>> = if body.trim().contains(char::is_whitespace) {
            let mut positions = Vec::new();
            for token in body.split_whitespace() {
                let token: Vec<char> = token.chars().collect();
                let pos = position_candidates(&token)
                    .into_iter()
                    .find(|(len, _)| *len == token.len())
                    .map(|(_, pos)| pos)
                    .ok_or_else(|| invalid("unrecognised symmetry element"))?;
                positions.push(pos);
            }
            vec![positions]
        } else {
            let body: Vec<char> = body.trim().chars().collect();
            let mut out = Vec::new();
            tokenize(&body, &mut Vec::new(), &mut out);
            out
        };

        let (positions, (system, axes)) = candidates
            .into_iter()
            .find_map(|positions| classify(centering, &positions).map(|c| (positions, c)))
            .ok_or_else(|| invalid("does not describe a known crystal system"))?;

        Self::build(centering, positions, system, axes).ok_or_else(|| {
            invalid("symmetry element is not compatible with its symbol position")
        })
    }

    fn build(
        centering: Centering,
        positions: Vec<SymbolPosition>,
        system: CrystalSystem,
        axes: Vec<Option<Axis>>,
    ) -> Option<Self> {
        let mut elements: Vec<(IMat, [f64; 3])> = Vec::new();

        for (pos, axis) in positions.iter().zip(&axes) {
            let Some(axis) = axis else {
                if pos.inversion {
                    elements.push((mat_neg(&IDENTITY), [0.0; 3]));
                }
                continue;
            };

            let has_rotation = pos.order > 1 || pos.inversion;
            if has_rotation {
                let r = axis.rotation(pos.order)?;
                let r = if pos.inversion { mat_neg(&r) } else { r };
                let frac = pos.screw as f64 / pos.order as f64;
                let t = axis.direction().map(|v| v * frac);
                elements.push((r, t));
            }

            if let Some(letter) = pos.plane {
                let mirror = mat_neg(&axis.rotation(2)?);
                for glide in axis.glides(letter)? {
                    elements.push((mirror, glide));
                }
            }
        }

        let generators: Vec<IMat> = elements.iter().map(|(r, _)| *r).collect();
        let point_group = closure(&generators);

        let mut laue_generators = generators.clone();
        laue_generators.push(mat_neg(&IDENTITY));
        let laue_group = closure(&laue_generators);

        let mut translational_ops = Vec::new();
        for (r, t) in elements.iter().filter(|(_, t)| t.iter().any(|v| *v != 0.0)) {
            for g in &point_group {
                let g_inv = inverse_in(&point_group, g)?;
                let conj = mat_mul(&mat_mul(g, r), &g_inv);
                let op = (conj, mat_apply(g, t));
                if !translational_ops.contains(&op) {
                    translational_ops.push(op);
                }
            }
        }

        Some(SpaceGroup {
            centering,
            positions,
            axes,
            system,
            point_group,
            laue_group,
            translational_ops,
            rhombohedral_axes: false,
        })
    }

    /// 切换到菱方轴设置（仅对 R 心化有效）
    pub fn with_rhombohedral_axes(mut self, enabled: bool) -> Self {
        self.rhombohedral_axes = enabled && self.centering == Centering::R;
        self
    }

    pub fn is_rhombohedral_axes(&self) -> bool {
        self.rhombohedral_axes
    }

    pub fn centering(&self) -> Centering {
        self.centering
    }

    pub fn crystal_system(&self) -> CrystalSystem {
        self.system
    }

    /// 单斜晶系的唯一轴
    pub fn unique_axis(&self) -> Option<Axis> {
        if self.system != CrystalSystem::Monoclinic {
            return None;
        }
        self.axes.iter().flatten().next().copied()
    }

    pub fn point_group_order(&self) -> usize {
        self.point_group.len()
    }

    /// 带空格的 HM 符号，如 `F d -3 m`
    pub fn hm_symbol(&self) -> String {
        let mut s = self.centering.symbol().to_string();
        for pos in &self.positions {
            s.push(' ');
            s.push_str(&pos.format());
        }
        s
    }

    /// 菱方指数 → 六方指数 (h1-h2, h2-h3, h1+h2+h3)
    fn to_hexagonal(hkl: Hkl) -> Hkl {
        [hkl[0] - hkl[1], hkl[1] - hkl[2], hkl[0] + hkl[1] + hkl[2]]
    }

    /// 六方指数 → 菱方指数（仅对 -h+k+l=3n 的指数精确）
    fn to_rhombohedral(hkl: Hkl) -> Hkl {
        let [h, k, l] = hkl;
        [(2 * h + k + l) / 3, (-h + k + l) / 3, (-h - 2 * k + l) / 3]
    }

    fn working_indices(&self, hkl: Hkl) -> Hkl {
        if self.rhombohedral_axes {
            Self::to_hexagonal(hkl)
        } else {
            hkl
        }
    }

    /// 衍射是否被空间群允许（非系统消光）
    pub fn is_allowed(&self, hkl: Hkl) -> bool {
        if hkl == [0, 0, 0] {
            return false;
        }
        let h = self.working_indices(hkl);

        if !self.rhombohedral_axes
            && self
                .centering
                .translations()
                .iter()
                .any(|c| !is_integer(hkl_dot(h, c)))
        {
            return false;
        }

        !self
            .translational_ops
            .iter()
            .any(|(r, t)| hkl_mul(h, r) == h && !is_integer(hkl_dot(h, t)))
    }

    /// Laue 等效衍射（去重、排序）
    pub fn equivalents(&self, hkl: Hkl) -> Vec<Hkl> {
        let h = self.working_indices(hkl);
        let mut orbit: Vec<Hkl> = self
            .laue_group
            .iter()
            .map(|g| hkl_mul(h, g))
            .map(|e| {
                if self.rhombohedral_axes {
                    Self::to_rhombohedral(e)
                } else {
                    e
                }
            })
            .collect();
        orbit.sort_unstable();
        orbit.dedup();
        orbit
    }

    /// 等效衍射中字典序最大者，作为代表
    pub fn canonical(&self, hkl: Hkl) -> Hkl {
        self.equivalents(hkl).into_iter().max().unwrap_or(hkl)
    }

    /// 多重度
    pub fn multiplicity(&self, hkl: Hkl) -> usize {
        self.equivalents(hkl).len()
    }
}

impl PartialEq for SpaceGroup {
    fn eq(&self, other: &Self) -> bool {
        self.hm_symbol() == other.hm_symbol() && self.rhombohedral_axes == other.rhombohedral_axes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sg(symbol: &str) -> SpaceGroup {
        SpaceGroup::from_symbol(symbol).unwrap()
    }

    #[test]
    fn test_compact_and_spaced_symbols_agree() {
        for (compact, spaced) in [
            ("Fd-3m", "F d -3 m"),
            ("P63/mmc", "P 63/m m c"),
            ("P21/c", "P 1 21/c 1"),
            ("I41/amd", "I 41/a m d"),
            ("R-3m", "R -3 m"),
            ("Pnma", "P n m a"),
        ] {
            let a = sg(compact);
            let b = sg(spaced);
            assert_eq!(a.crystal_system(), b.crystal_system(), "{}", compact);
            assert_eq!(a.point_group_order(), b.point_group_order(), "{}", compact);
        }
        assert_eq!(sg("Fd-3m").hm_symbol(), "F d -3 m");
        assert_eq!(sg("P2_1/c").hm_symbol(), "P 21/c");
    }

    #[test]
    fn test_ambiguous_compact_symbols() {
        assert_eq!(sg("P321").hm_symbol(), "P 3 2 1");
        assert_eq!(sg("P3121").hm_symbol(), "P 31 2 1");
        assert_eq!(sg("P312").hm_symbol(), "P 3 1 2");
        assert_eq!(sg("P4212").hm_symbol(), "P 4 21 2");
        assert_eq!(sg("P422").hm_symbol(), "P 4 2 2");
        assert_eq!(sg("P432").hm_symbol(), "P 4 3 2");
        assert_eq!(sg("P4132").hm_symbol(), "P 41 3 2");
        assert_eq!(sg("R32").hm_symbol(), "R 3 2");
        assert_eq!(sg("P212121").hm_symbol(), "P 21 21 21");
        assert_eq!(sg("P213").hm_symbol(), "P 21 3");
        assert_eq!(sg("P6322").hm_symbol(), "P 63 2 2");
    }

    #[test]
    fn test_crystal_systems() {
        assert_eq!(sg("P-1").crystal_system(), CrystalSystem::Triclinic);
        assert_eq!(sg("C2/c").crystal_system(), CrystalSystem::Monoclinic);
        assert_eq!(sg("Pnma").crystal_system(), CrystalSystem::Orthorhombic);
        assert_eq!(sg("I4/mmm").crystal_system(), CrystalSystem::Tetragonal);
        assert_eq!(sg("R-3c").crystal_system(), CrystalSystem::Trigonal);
        assert_eq!(sg("P6/mmm").crystal_system(), CrystalSystem::Hexagonal);
        assert_eq!(sg("Im-3m").crystal_system(), CrystalSystem::Cubic);
        assert_eq!(sg("P 1 1 21/b").unique_axis(), Some(Axis::Z));
    }

    #[test]
    fn test_point_group_orders() {
        assert_eq!(sg("Fd-3m").point_group_order(), 48);
        assert_eq!(sg("F-43m").point_group_order(), 24);
        assert_eq!(sg("P63/mmc").point_group_order(), 24);
        assert_eq!(sg("P4/mmm").point_group_order(), 16);
        assert_eq!(sg("Pnma").point_group_order(), 8);
        assert_eq!(sg("P21/c").point_group_order(), 4);
        assert_eq!(sg("P1").point_group_order(), 1);
    }

    #[test]
    fn test_diamond_absences() {
        let g = sg("Fd-3m");
        assert!(g.is_allowed([1, 1, 1]));
        assert!(g.is_allowed([2, 2, 0]));
        assert!(g.is_allowed([3, 1, 1]));
        assert!(g.is_allowed([4, 0, 0]));
        // F 心化
        assert!(!g.is_allowed([1, 1, 0]));
        assert!(!g.is_allowed([1, 0, 0]));
        // d 滑移面：0kl 要求 k+l=4n
        assert!(!g.is_allowed([2, 0, 0]));
        assert!(!g.is_allowed([0, 2, 0]));
        assert!(!g.is_allowed([4, 2, 0]));
        assert!(!g.is_allowed([0, 0, 0]));
    }

    #[test]
    fn test_body_centred_absences() {
        let g = sg("Im-3m");
        assert!(g.is_allowed([1, 1, 0]));
        assert!(!g.is_allowed([1, 0, 0]));
        assert!(!g.is_allowed([1, 1, 1]));
        assert!(g.is_allowed([2, 1, 1]));
    }

    #[test]
    fn test_cubic_a_glide_absences() {
        // Pa-3: 0kl k=2n, h0l l=2n, hk0 h=2n
        let g = sg("Pa-3");
        for hkl in [[0, 1, 2], [2, 0, 1], [1, 2, 0], [3, 1, 0], [1, 3, 0], [0, 1, 0]] {
            assert!(!g.is_allowed(hkl), "Pa-3 {:?}", hkl);
        }
        for hkl in [[0, 2, 1], [1, 0, 2], [2, 1, 0], [1, 1, 1], [2, 0, 0], [2, 1, 1]] {
            assert!(g.is_allowed(hkl), "Pa-3 {:?}", hkl);
        }

        // Ia-3: 0kl k,l=2n
        let g = sg("Ia-3");
        for hkl in [[0, 1, 1], [3, 1, 0], [0, 1, 3], [1, 0, 3]] {
            assert!(!g.is_allowed(hkl), "Ia-3 {:?}", hkl);
        }
        for hkl in [[0, 2, 2], [2, 1, 1], [2, 2, 2], [4, 2, 0]] {
            assert!(g.is_allowed(hkl), "Ia-3 {:?}", hkl);
        }

        // Ia-3d: 0kl k,l=2n; hhl 2h+l=4n; h00 h=4n
        let g = sg("Ia-3d");
        for hkl in [[3, 1, 0], [1, 1, 0], [2, 0, 0], [0, 1, 1], [2, 2, 2]] {
            assert!(!g.is_allowed(hkl), "Ia-3d {:?}", hkl);
        }
        for hkl in [[2, 1, 1], [2, 2, 0], [3, 2, 1], [4, 0, 0], [4, 2, 0], [3, 3, 2]] {
            assert!(g.is_allowed(hkl), "Ia-3d {:?}", hkl);
        }
    }

    #[test]
    fn test_monoclinic_glide_and_screw() {
        let g = sg("P21/c");
        assert!(!g.is_allowed([0, 1, 0]));
        assert!(g.is_allowed([0, 2, 0]));
        assert!(!g.is_allowed([1, 0, 1]));
        assert!(g.is_allowed([1, 0, 2]));
        assert!(g.is_allowed([1, 1, 1]));
    }

    #[test]
    fn test_hexagonal_absences() {
        let g = sg("P63/mmc");
        assert!(!g.is_allowed([0, 0, 1]));
        assert!(g.is_allowed([0, 0, 2]));
        // hh(-2h)l: l = 2n
        assert!(!g.is_allowed([1, 1, 1]));
        assert!(g.is_allowed([1, 1, 2]));
        assert!(g.is_allowed([1, 0, 1]));
    }

    #[test]
    fn test_rhombohedral_obverse() {
        let g = sg("R-3m");
        assert!(!g.is_allowed([1, 0, 0]));
        assert!(g.is_allowed([1, 0, 1]));
        assert!(g.is_allowed([0, 0, 3]));
        assert!(!g.is_allowed([0, 0, 1]));

        let rh = sg("R-3m").with_rhombohedral_axes(true);
        assert!(rh.is_allowed([1, 0, 0]));
        assert!(rh.is_allowed([1, 1, 1]));
        assert_eq!(rh.canonical([0, 0, 1]), [1, 0, 0]);
    }

    #[test]
    fn test_canonical_and_multiplicity() {
        let g = sg("Fd-3m");
        assert_eq!(g.canonical([-1, 1, -1]), [1, 1, 1]);
        assert_eq!(g.canonical([0, -2, 2]), [2, 2, 0]);
        assert_eq!(g.multiplicity([1, 1, 1]), 8);
        assert_eq!(g.multiplicity([2, 2, 0]), 12);
        assert_eq!(g.multiplicity([4, 0, 0]), 6);

        let hex = sg("P6/mmm");
        assert_eq!(hex.canonical([0, 1, 0]), [1, 0, 0]);
        assert_eq!(hex.canonical([-1, 1, 0]), [1, 0, 0]);
    }

    #[test]
    fn test_invalid_symbols() {
        assert!(SpaceGroup::from_symbol("").is_err());
        assert!(SpaceGroup::from_symbol("X123").is_err());
        assert!(SpaceGroup::from_symbol("P5").is_err());
        assert!(SpaceGroup::from_symbol("P m q m").is_err());
        assert!(SpaceGroup::from_symbol("P 3 3").is_err());
    }
}
