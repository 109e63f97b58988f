//! # Voronoi 间隙位搜索
//!
//! 间隙候选位为 Voronoi 顶点，即 Delaunay 四面体（空球四原子组）的外接球心。
//!
//! ## 算法
//! 1. 按 `image_cutoff` 展开周期镜像
//! 2. 对原胞内每个原子取最近 `neighbours` 个邻居，枚举三元组求外接球心，
//!    保留球内无其他原子的球心
//! 3. 去掉离原子小于 `min_dist` 的点，`clustering_tol` 内的点合并为均值
//! 4. 按对称操作归并为轨道，记录多重度
//!
//! ## 依赖关系
//! - 被 `generation/enumerators.rs`, `generation/generator.rs` 使用
//! - 使用 `symmetry/ops.rs`, `nalgebra`

use crate::error::Result;
use crate::models::structure::wrap_coords;
use crate::models::{Lattice, Structure};
use crate::symmetry::ops::{equivalent_points, point_orbit};
use crate::symmetry::SymmetryOperation;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Voronoi 间隙搜索参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoronoiSettings {
    /// 间隙位到最近原子的最小距离 (Å)
    pub min_dist: f64,
    /// 合并距离 (Å)
    pub clustering_tol: f64,
    /// 对称等价判断容差 (Å)
    pub symmetry_tol: f64,
    /// 每个原子参与三元组枚举的邻居数
    pub neighbours: usize,
    /// 周期镜像展开半径 (Å)
    pub image_cutoff: f64,
}

impl Default for VoronoiSettings {
    fn default() -> Self {
        VoronoiSettings {
            min_dist: 0.9,
            clustering_tol: 0.5,
            symmetry_tol: 0.3,
            neighbours: 16,
            image_cutoff: 10.0,
        }
    }
}

/// 对称不等价的间隙位（原胞分数坐标）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterstitialSite {
    pub frac_coords: [f64; 3],
    pub multiplicity: usize,
}

/// 间隙位搜索能力
pub trait InterstitialFinder {
    fn find_sites(&self, structure: &Structure, ops: &[SymmetryOperation]) -> Result<Vec<InterstitialSite>>;
}

/// 基于 Voronoi 顶点的默认实现
#[derive(Debug, Clone, Default)]
pub struct VoronoiInterstitialFinder {
    pub settings: VoronoiSettings,
}

impl VoronoiInterstitialFinder {
    pub fn new(settings: VoronoiSettings) -> Self {
        VoronoiInterstitialFinder { settings }
    }
}

impl InterstitialFinder for VoronoiInterstitialFinder {
    fn find_sites(&self, structure: &Structure, ops: &[SymmetryOperation]) -> Result<Vec<InterstitialSite>> {
        let s = &self.settings;
        if structure.is_empty() {
            return Ok(Vec::new());
        }

        let vertices = voronoi_vertices(structure, s);

        let mut unique: Vec<[f64; 3]> = Vec::new();
        for v in vertices {
            if !unique
                .iter()
                .any(|u| structure.lattice.min_image_distance(u, &v) < 0.01)
            {
                unique.push(v);
            }
        }

        let centres: Vec<[f64; 3]> = cluster_points(&structure.lattice, &unique, s.clustering_tol)
            .into_iter()
            .filter(|c| nearest_atom_distance(structure, c) >= s.min_dist)
            .collect();

        Ok(group_by_symmetry(&structure.lattice, ops, &centres, s.symmetry_tol))
    }
}

/// 外接球心满足空球条件的全部顶点（已回卷）
fn voronoi_vertices(structure: &Structure, s: &VoronoiSettings) -> Vec<[f64; 3]> {
    let lattice = &structure.lattice;
    let widths = lattice.perpendicular_widths();
    let reach: Vec<i32> = widths
        .iter()
        .map(|w| ((s.image_cutoff / w).ceil() as i32).max(1))
        .collect();

    let mut images: Vec<Vector3<f64>> = Vec::new();
    for site in &structure.sites {
        let f = site.frac_coords;
        for n0 in -reach[0]..=reach[0] {
            for n1 in -reach[1]..=reach[1] {
                for n2 in -reach[2]..=reach[2] {
                    let shifted = [f[0] + n0 as f64, f[1] + n1 as f64, f[2] + n2 as f64];
                    images.push(lattice.frac_to_cart(&shifted));
                }
            }
        }
    }

    let mut vertices = Vec::new();
    for site in &structure.sites {
        let p0 = lattice.frac_to_cart(&site.frac_coords);

        let mut neighbours: Vec<(f64, Vector3<f64>)> = images
            .iter()
            .map(|q| ((q - p0).norm(), *q))
            .filter(|(d, _)| *d > 1e-6)
            .collect();
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbours.truncate(s.neighbours);

        let n = neighbours.len();
        for j in 0..n {
            for k in (j + 1)..n {
                for l in (k + 1)..n {
                    let Some(centre) =
                        circumcentre(&p0, &neighbours[j].1, &neighbours[k].1, &neighbours[l].1)
                    else {
                        continue;
                    };
                    let radius = (centre - p0).norm();
                    if radius > s.image_cutoff / 2.0 || radius < s.min_dist {
                        continue;
                    }
                    if images.iter().any(|q| (q - centre).norm() < radius - 1e-4) {
                        continue;
                    }
                    if let Some(frac) = lattice.cart_to_frac(&centre) {
                        vertices.push(wrap_coords(frac));
                    }
                }
            }
        }
    }
    vertices
}

/// 四点外接球心：2(p_i − p0)·c = |p_i|² − |p0|²
fn circumcentre(
    p0: &Vector3<f64>,
    p1: &Vector3<f64>,
    p2: &Vector3<f64>,
    p3: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let rows = [p1 - p0, p2 - p0, p3 - p0];
    let a = Matrix3::from_rows(&[
        (rows[0] * 2.0).transpose(),
        (rows[1] * 2.0).transpose(),
        (rows[2] * 2.0).transpose(),
    ]);
    if a.determinant().abs() < 1e-6 {
        return None;
    }
    let b = Vector3::new(
        p1.norm_squared() - p0.norm_squared(),
        p2.norm_squared() - p0.norm_squared(),
        p3.norm_squared() - p0.norm_squared(),
    );
    a.lu().solve(&b)
}

/// 贪心聚类：依次把点并入第一个代表点在 `tol` 内的簇，返回各簇均值
fn cluster_points(lattice: &Lattice, points: &[[f64; 3]], tol: f64) -> Vec<[f64; 3]> {
    let mut clusters: Vec<Vec<[f64; 3]>> = Vec::new();
    for p in points {
        match clusters
            .iter_mut()
            .find(|c| lattice.min_image_distance(&c[0], p) < tol)
        {
            Some(cluster) => {
                // 展开到代表点附近再求均值
                let anchor = cluster[0];
                let mut unwrapped = *p;
                for i in 0..3 {
                    unwrapped[i] -= (p[i] - anchor[i]).round();
                }
                cluster.push(unwrapped);
            }
            None => clusters.push(vec![*p]),
        }
    }

    clusters
        .into_iter()
        .map(|members| {
            let n = members.len() as f64;
            let mut mean = [0.0; 3];
            for m in &members {
                for i in 0..3 {
                    mean[i] += m[i] / n;
                }
            }
            wrap_coords(mean)
        })
        .collect()
}

fn nearest_atom_distance(structure: &Structure, frac: &[f64; 3]) -> f64 {
    structure
        .nearest_site(frac, None)
        .map(|(_, d)| d)
        .unwrap_or(f64::INFINITY)
}

/// 归并对称等价的点；代表点取轨道中字典序最小者，按（多重度，坐标）排序
pub fn group_by_symmetry(
    lattice: &Lattice,
    ops: &[SymmetryOperation],
    points: &[[f64; 3]],
    tol: f64,
) -> Vec<InterstitialSite> {
    let mut reps: Vec<InterstitialSite> = Vec::new();
    for p in points {
        if reps
            .iter()
            .any(|r| equivalent_points(lattice, ops, &r.frac_coords, p, tol))
        {
            continue;
        }
        let orbit = point_orbit(lattice, ops, p, tol);
        let representative = orbit
            .iter()
            .map(|c| wrap_coords([round4(c[0]), round4(c[1]), round4(c[2])]))
            .min_by(|a, b| cmp_coords(a, b))
            .unwrap_or(*p);
        reps.push(InterstitialSite {
            frac_coords: representative,
            multiplicity: orbit.len().max(1),
        });
    }

    reps.sort_by(|a, b| {
        a.multiplicity
            .cmp(&b.multiplicity)
            .then_with(|| cmp_coords(&a.frac_coords, &b.frac_coords))
    });
    reps
}

fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4 + 0.0
}

fn cmp_coords(a: &[f64; 3], b: &[f64; 3]) -> std::cmp::Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(std::cmp::Ordering::Equal)
}
