//! # 超胞构建
//!
//! 为整套缺陷求一个共享的整数变换矩阵 M（超胞晶格 = M·A），并把结构按 M 扩胞。
//!
//! ## 算法
//! - 对角模式：M = diag(ceil(min_length / |a_i|))
//! - 一般模式：目标边长 L 从 `min_length` 起每次加 0.1 Å，取 M = round(L·A⁻¹)，
//!   直到六个垂直投影长度都不小于 `min_length` 且原子数落在 [min_atoms, max_atoms]；
//!   原子数超过 `max_atoms` 时本轮失败，外层将 `max_atoms` 加 1 后重试
//!
//! ## 依赖关系
//! - 被 `generation/assembler.rs`, `generation/generator.rs` 使用
//! - 使用 `nalgebra`

use crate::error::{DefectError, Result};
use crate::models::structure::wrap_coords;
use crate::models::{Lattice, Site, Structure};

use nalgebra::{Matrix3, RowVector3, Vector3};
use serde::{Deserialize, Serialize};

/// 3x3 整数变换矩阵
pub type SupercellMatrix = [[i32; 3]; 3];

/// 外层放宽 `max_atoms` 的最大次数
const MAX_RELAXATIONS: usize = 500;

/// 单轮内目标边长的最大步数
const MAX_LENGTH_STEPS: usize = 5000;

/// 超胞约束
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupercellSettings {
    pub min_atoms: usize,
    pub max_atoms: usize,
    /// 最小垂直宽度 (Å)
    pub min_length: f64,
    pub force_diagonal: bool,
}

impl Default for SupercellSettings {
    fn default() -> Self {
        SupercellSettings {
            min_atoms: 50,
            max_atoms: 240,
            min_length: 10.0,
            force_diagonal: false,
        }
    }
}

/// 求共享超胞矩阵
pub fn find_supercell_matrix(prim: &Structure, settings: &SupercellSettings) -> Result<SupercellMatrix> {
    let n_sites = prim.len().max(1);
    let mut max_atoms = settings.max_atoms.max(settings.min_atoms);

    for _ in 0..MAX_RELAXATIONS {
        if let Some(matrix) = cubic_supercell(&prim.lattice, n_sites, settings, max_atoms)? {
            return Ok(matrix);
        }
        max_atoms += 1;
    }

    Err(DefectError::SupercellNotFound {
        min_length: settings.min_length,
        max_atoms,
    })
}

/// 一轮搜索；原子数超过 `max_atoms` 时返回 None
fn cubic_supercell(
    lattice: &Lattice,
    n_sites: usize,
    settings: &SupercellSettings,
    max_atoms: usize,
) -> Result<Option<SupercellMatrix>> {
    if settings.force_diagonal {
        let abc = lattice.abc();
        let mut m = [[0; 3]; 3];
        for i in 0..3 {
            m[i][i] = ((settings.min_length / abc[i]).ceil() as i32).max(1);
        }
        return Ok(Some(m));
    }

    let a = lattice.to_matrix3();
    let inv = a
        .try_inverse()
        .ok_or_else(|| DefectError::Symmetry("Degenerate lattice in supercell search".to_string()))?;

    let mut target = settings.min_length;
    for _ in 0..MAX_LENGTH_STEPS {
        let proposal = Matrix3::identity() * target * inv;
        let m = round_nonsingular(&proposal);
        let det = int_det(&m).unsigned_abs() as usize;
        if det == 0 {
            target += 0.1;
            continue;
        }

        let sc = to_f64(&m) * a;
        let num_atoms = det * n_sites;
        if min_projected_length(&sc) >= settings.min_length
            && (settings.min_atoms..=max_atoms).contains(&num_atoms)
        {
            return Ok(Some(m));
        }
        if num_atoms > max_atoms {
            return Ok(None);
        }
        target += 0.1;
    }
    Ok(None)
}

/// 六个平面内的垂直投影长度的最小值
fn min_projected_length(sc: &Matrix3<f64>) -> f64 {
    let a: Vector3<f64> = sc.row(0).transpose();
    let b: Vector3<f64> = sc.row(1).transpose();
    let c: Vector3<f64> = sc.row(2).transpose();
    let reject = |u: &Vector3<f64>, v: &Vector3<f64>| (u - v * (u.dot(v) / v.dot(v))).norm();

    [
        reject(&c, &a),
        reject(&a, &c),
        reject(&b, &a),
        reject(&a, &b),
        reject(&b, &c),
        reject(&c, &b),
    ]
    .into_iter()
    .fold(f64::INFINITY, f64::min)
}

/// 取整；全零行（列）将原矩阵中绝对值最大的元素向远离零的方向取整
fn round_nonsingular(m: &Matrix3<f64>) -> SupercellMatrix {
    let mut r = [[0i32; 3]; 3];
    for (i, row) in r.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = m[(i, j)].round() as i32;
        }
    }

    let away_from_zero = |x: f64| (x.abs().ceil() * x.signum()) as i32;

    for i in 0..3 {
        if r[i].iter().all(|&v| v == 0) {
            let j = (0..3)
                .max_by(|&p, &q| m[(i, p)].abs().total_cmp(&m[(i, q)].abs()).then(q.cmp(&p)))
                .unwrap_or(0);
            r[i][j] = away_from_zero(m[(i, j)]);
        }
    }
    for j in 0..3 {
        if (0..3).all(|i| r[i][j] == 0) {
            let i = (0..3)
                .max_by(|&p, &q| m[(p, j)].abs().total_cmp(&m[(q, j)].abs()).then(q.cmp(&p)))
                .unwrap_or(0);
            r[i][j] = away_from_zero(m[(i, j)]);
        }
    }
    r
}

/// 按 M 扩胞；每个原格点依次展开到全部晶格平移
pub fn make_supercell(structure: &Structure, matrix: &SupercellMatrix) -> Result<Structure> {
    let m = to_f64(matrix);
    let det = int_det(matrix).unsigned_abs() as usize;
    let inv = m
        .try_inverse()
        .ok_or_else(|| DefectError::InvalidArgument("Supercell matrix is singular".to_string()))?;

    let points = lattice_points_in_supercell(matrix, &inv);
    if points.len() != det {
        return Err(DefectError::SiteCountMismatch {
            expected: det,
            found: points.len(),
        });
    }

    let lattice = Lattice::from_matrix3(&(m * structure.lattice.to_matrix3()));
    let mut sites = Vec::with_capacity(structure.len() * det);
    for site in &structure.sites {
        let base = RowVector3::from(site.frac_coords) * inv;
        for p in &points {
            sites.push(Site {
                frac_coords: wrap_coords([base[0] + p[0], base[1] + p[1], base[2] + p[2]]),
                ..site.clone()
            });
        }
    }
    Ok(Structure::new(lattice, sites))
}

/// 原胞晶格点在超胞分数坐标中的位置（落在 [0, 1) 内）
fn lattice_points_in_supercell(matrix: &SupercellMatrix, inv: &Matrix3<f64>) -> Vec<[f64; 3]> {
    const EPS: f64 = 1e-8;

    let mut lo = [0i32; 3];
    let mut hi = [0i32; 3];
    for corner in 0..8 {
        let mut v = [0i32; 3];
        for (i, row) in matrix.iter().enumerate() {
            if corner >> i & 1 == 1 {
                for k in 0..3 {
                    v[k] += row[k];
                }
            }
        }
        for k in 0..3 {
            lo[k] = lo[k].min(v[k]);
            hi[k] = hi[k].max(v[k]);
        }
    }

    let mut points = Vec::new();
    for n0 in lo[0]..=hi[0] {
        for n1 in lo[1]..=hi[1] {
            for n2 in lo[2]..=hi[2] {
                let f = RowVector3::new(n0 as f64, n1 as f64, n2 as f64) * inv;
                if f.iter().all(|&x| x > -EPS && x < 1.0 - EPS) {
                    points.push(wrap_coords([f[0], f[1], f[2]]));
                }
            }
        }
    }
    points
}

pub fn int_det(r: &SupercellMatrix) -> i32 {
    r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1]) - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
        + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
}

pub fn to_f64(r: &SupercellMatrix) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| r[i][j] as f64)
}
