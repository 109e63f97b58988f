//! # 对称操作
//!
//! 空间群操作 (R, t) 作用于分数坐标：x' = R·x + t。
//!
//! ## 功能
//! - moyo 操作 -> 可序列化的 `SymmetryOperation`
//! - 任意点的轨道与两点等价判断（间隙位点分组使用）
//!
//! ## 依赖关系
//! - 被 `symmetry/mod.rs`, `generation/voronoi.rs`, `generation/enumerators.rs` 使用
//! - 使用 `models/structure.rs`

use crate::models::structure::wrap_coords;
use crate::models::Lattice;

use serde::{Deserialize, Serialize};

/// 空间群操作，作用于分数坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryOperation {
    pub rotation: [[i32; 3]; 3],
    pub translation: [f64; 3],
}

impl SymmetryOperation {
    pub fn identity() -> Self {
        SymmetryOperation {
            rotation: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            translation: [0.0; 3],
        }
    }

    pub fn is_pure_translation(&self) -> bool {
        self.rotation == Self::identity().rotation
    }

    /// x' = R·x + t（不回卷）
    pub fn apply(&self, x: &[f64; 3]) -> [f64; 3] {
        let mut out = self.translation;
        for (i, row) in self.rotation.iter().enumerate() {
            out[i] += row[0] as f64 * x[0] + row[1] as f64 * x[1] + row[2] as f64 * x[2];
        }
        out
    }
}

impl From<&moyo::base::Operation> for SymmetryOperation {
    fn from(op: &moyo::base::Operation) -> Self {
        let r = &op.rotation;
        let t = &op.translation;
        SymmetryOperation {
            rotation: [
                [r[(0, 0)], r[(0, 1)], r[(0, 2)]],
                [r[(1, 0)], r[(1, 1)], r[(1, 2)]],
                [r[(2, 0)], r[(2, 1)], r[(2, 2)]],
            ],
            translation: wrap_coords([t[0], t[1], t[2]]),
        }
    }
}

/// 任意点的轨道：各操作像点回卷去重后的集合
pub fn point_orbit(
    lattice: &Lattice,
    ops: &[SymmetryOperation],
    frac: &[f64; 3],
    tol: f64,
) -> Vec<[f64; 3]> {
    let mut orbit: Vec<[f64; 3]> = Vec::new();
    for op in ops {
        let image = wrap_coords(op.apply(frac));
        if !orbit
            .iter()
            .any(|p| lattice.min_image_distance(p, &image) < tol)
        {
            orbit.push(image);
        }
    }
    orbit
}

/// 两点是否对称等价
pub fn equivalent_points(
    lattice: &Lattice,
    ops: &[SymmetryOperation],
    a: &[f64; 3],
    b: &[f64; 3],
    tol: f64,
) -> bool {
    ops.iter()
        .any(|op| lattice.min_image_distance(&op.apply(a), b) < tol)
}
