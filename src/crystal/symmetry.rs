//! # 对称操作基础
//!
//! 整数旋转矩阵、晶格心化、晶系以及空间群符号中各位置对应的对称方向。
//!
//! 约定：分数坐标按列向量变换 x' = R·x + t，Miller 指数按行向量变换
//! h' = h·R。对满足 h·R = h 的衍射，若 h·t 不是整数则为系统消光。
//!
//! ## 依赖关系
//! - 被 `crystal/spacegroup.rs` 使用
//! - 无外部模块依赖

use crate::crystal::Hkl;

use std::fmt;

/// 整数 3x3 矩阵（点群操作）
pub type IMat = [[i32; 3]; 3];

pub const IDENTITY: IMat = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

/// 矩阵乘法 a·b
pub fn mat_mul(a: &IMat, b: &IMat) -> IMat {
    let mut out = [[0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

pub fn mat_neg(a: &IMat) -> IMat {
    a.map(|row| row.map(|v| -v))
}

/// R·t（作用于平移向量）
pub fn mat_apply(a: &IMat, t: &[f64; 3]) -> [f64; 3] {
    [0, 1, 2].map(|i| (0..3).map(|k| a[i][k] as f64 * t[k]).sum())
}

/// h·R（作用于 Miller 指数）
pub fn hkl_mul(h: Hkl, a: &IMat) -> Hkl {
    [0, 1, 2].map(|j| (0..3).map(|k| h[k] * a[k][j]).sum())
}

pub fn hkl_dot(h: Hkl, t: &[f64; 3]) -> f64 {
    h[0] as f64 * t[0] + h[1] as f64 * t[1] + h[2] as f64 * t[2]
}

pub fn is_integer(x: f64) -> bool {
    (x - x.round()).abs() < 1e-6
}

/// 由生成元求有限矩阵群的闭包
pub fn closure(generators: &[IMat]) -> Vec<IMat> {
    let mut group = vec![IDENTITY];
    let mut frontier = vec![IDENTITY];

    while let Some(g) = frontier.pop() {
        for gen in generators {
            let product = mat_mul(&g, gen);
            if !group.contains(&product) {
                group.push(product);
                frontier.push(product);
            }
        }
    }

    group
}

/// 在群中查找 g 的逆元
pub fn inverse_in(group: &[IMat], g: &IMat) -> Option<IMat> {
    group
        .iter()
        .find(|candidate| mat_mul(g, candidate) == IDENTITY)
        .copied()
}

/// 晶系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrystalSystem {
    Triclinic,
    Monoclinic,
    Orthorhombic,
    Tetragonal,
    Trigonal,
    Hexagonal,
    Cubic,
}

impl fmt::Display for CrystalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrystalSystem::Triclinic => "triclinic",
            CrystalSystem::Monoclinic => "monoclinic",
            CrystalSystem::Orthorhombic => "orthorhombic",
            CrystalSystem::Tetragonal => "tetragonal",
            CrystalSystem::Trigonal => "trigonal",
            CrystalSystem::Hexagonal => "hexagonal",
            CrystalSystem::Cubic => "cubic",
        };
        write!(f, "{}", name)
    }
}

/// 晶格心化类型（R 为六方轴下的正向设置）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centering {
    P,
    A,
    B,
    C,
    I,
    F,
    R,
}

impl Centering {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'P' => Some(Centering::P),
            'A' => Some(Centering::A),
            'B' => Some(Centering::B),
            'C' => Some(Centering::C),
            'I' => Some(Centering::I),
            'F' => Some(Centering::F),
            'R' => Some(Centering::R),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Centering::P => 'P',
            Centering::A => 'A',
            Centering::B => 'B',
            Centering::C => 'C',
            Centering::I => 'I',
            Centering::F => 'F',
            Centering::R => 'R',
        }
    }

    /// 非零心化平移
    pub fn translations(&self) -> Vec<[f64; 3]> {
        let h = 0.5;
        match self {
            Centering::P => vec![],
            Centering::A => vec![[0.0, h, h]],
            Centering::B => vec![[h, 0.0, h]],
            Centering::C => vec![[h, h, 0.0]],
            Centering::I => vec![[h, h, h]],
            Centering::F => vec![[0.0, h, h], [h, 0.0, h], [h, h, 0.0]],
            Centering::R => vec![
                [2.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
                [1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0],
            ],
        }
    }
}

/// 符号位置对应的对称方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// [100]
    X,
    /// [010]
    Y,
    /// [001]
    Z,
    /// [1-10]（四方、立方、六方的第三位置）
    Diagonal,
    /// 六方轴下的 [100]
    HexA,
    /// [111]
    Body,
}

impl Axis {
    /// 绕该方向的 n 次旋转矩阵
    pub fn rotation(&self, order: u8) -> Option<IMat> {
        if order == 1 {
            return Some(IDENTITY);
        }
        let m = match (self, order) {
            (Axis::X, 2) => [[1, 0, 0], [0, -1, 0], [0, 0, -1]],
            (Axis::X, 4) => [[1, 0, 0], [0, 0, -1], [0, 1, 0]],
            (Axis::Y, 2) => [[-1, 0, 0], [0, 1, 0], [0, 0, -1]],
            (Axis::Y, 4) => [[0, 0, 1], [0, 1, 0], [-1, 0, 0]],
            (Axis::Z, 2) => [[-1, 0, 0], [0, -1, 0], [0, 0, 1]],
            (Axis::Z, 3) => [[0, -1, 0], [1, -1, 0], [0, 0, 1]],
            (Axis::Z, 4) => [[0, -1, 0], [1, 0, 0], [0, 0, 1]],
            (Axis::Z, 6) => [[1, -1, 0], [1, 0, 0], [0, 0, 1]],
            (Axis::Diagonal, 2) => [[0, -1, 0], [-1, 0, 0], [0, 0, -1]],
            (Axis::HexA, 2) => [[1, -1, 0], [0, -1, 0], [0, 0, -1]],
            (Axis::Body, 3) => [[0, 0, 1], [1, 0, 0], [0, 1, 0]],
            _ => return None,
        };
        Some(m)
    }

    /// 螺旋轴平移的单位方向
    pub fn direction(&self) -> [f64; 3] {
        match self {
            Axis::X | Axis::HexA => [1.0, 0.0, 0.0],
            Axis::Y => [0.0, 1.0, 0.0],
            Axis::Z => [0.0, 0.0, 1.0],
            Axis::Diagonal => [1.0, -1.0, 0.0],
            Axis::Body => [1.0, 1.0, 1.0],
        }
    }

    /// 垂直于该方向的镜面/滑移面的平移分量
    pub fn glides(&self, letter: char) -> Option<Vec<[f64; 3]>> {
        let (h, q, o) = (0.5, 0.25, 0.0);
        let glides = match letter {
            'm' => vec![[o, o, o]],
            'a' => vec![[h, o, o]],
            'b' => vec![[o, h, o]],
            'c' => vec![[o, o, h]],
            'n' => match self {
                Axis::X => vec![[o, h, h]],
                Axis::Y => vec![[h, o, h]],
                Axis::Z => vec![[h, h, o]],
                Axis::Diagonal => vec![[h, h, h]],
                _ => return None,
            },
            'd' => match self {
                Axis::X => vec![[o, q, q]],
                Axis::Y => vec![[q, o, q]],
                Axis::Z => vec![[q, q, o]],
                Axis::Diagonal => vec![[q, q, q]],
                _ => return None,
            },
            'e' => match self {
                Axis::X => vec![[o, h, o], [o, o, h]],
                Axis::Y => vec![[h, o, o], [o, o, h]],
                Axis::Z => vec![[h, o, o], [o, h, o]],
                _ => return None,
            },
            _ => return None,
        };
        Some(glides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_orders() {
        for (axis, order) in [
            (Axis::X, 4),
            (Axis::Z, 3),
            (Axis::Z, 6),
            (Axis::Body, 3),
            (Axis::HexA, 2),
            (Axis::Diagonal, 2),
        ] {
            let r = axis.rotation(order).unwrap();
            let group = closure(&[r]);
            assert_eq!(group.len(), order as usize, "{:?} {}", axis, order);
        }
    }

    #[test]
    fn test_cubic_point_group_order() {
        let gens = [
            Axis::X.rotation(4).unwrap(),
            Axis::Body.rotation(3).unwrap(),
            mat_neg(&IDENTITY),
        ];
        assert_eq!(closure(&gens).len(), 48);
    }

    #[test]
    fn test_inverse_in_group() {
        let group = closure(&[Axis::Z.rotation(6).unwrap()]);
        for g in &group {
            let inv = inverse_in(&group, g).unwrap();
            assert_eq!(mat_mul(g, &inv), IDENTITY);
        }
    }

    #[test]
    fn test_hkl_mul_under_mirror() {
        let mirror = mat_neg(&Axis::Diagonal.rotation(2).unwrap());
        assert_eq!(hkl_mul([1, 1, 3], &mirror), [1, 1, 3]);
        assert_eq!(hkl_mul([1, 2, 3], &mirror), [2, 1, 3]);
    }
}
