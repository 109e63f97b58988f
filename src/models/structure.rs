//! # 晶体结构数据模型
//!
//! 定义周期性晶体结构的统一表示：晶格 + 有序格点（物种、分数坐标、可选氧化态）。
//! 结构是值类型，所有修改前先复制。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `symmetry/`, `generation/` 使用
//! - 使用 `nalgebra` 做 3x3 线性代数

use indexmap::IndexMap;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 分数坐标回卷阈值
const WRAP_EPS: f64 = 1e-8;

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let (cos_alpha, cos_beta) = (alpha.to_radians().cos(), beta.to_radians().cos());
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [
                [a, 0.0, 0.0],
                [b * cos_gamma, b * sin_gamma, 0.0],
                [c1, c2, c3],
            ],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 从 nalgebra 矩阵（行 = 晶格向量）创建
    pub fn from_matrix3(m: &Matrix3<f64>) -> Self {
        let mut matrix = [[0.0; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = m[(i, j)];
            }
        }
        Lattice { matrix }
    }

    /// 转为 nalgebra 矩阵，行 = 晶格向量
    pub fn to_matrix3(&self) -> Matrix3<f64> {
        let m = &self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    /// 单个晶格向量
    pub fn vector(&self, i: usize) -> Vector3<f64> {
        Vector3::from(self.matrix[i])
    }

    /// 晶格常数 (a, b, c)
    pub fn abc(&self) -> [f64; 3] {
        [
            self.vector(0).norm(),
            self.vector(1).norm(),
            self.vector(2).norm(),
        ]
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let (va, vb, vc) = (self.vector(0), self.vector(1), self.vector(2));
        let [a, b, c] = self.abc();

        let alpha = (vb.dot(&vc) / (b * c)).acos().to_degrees();
        let beta = (va.dot(&vc) / (a * c)).acos().to_degrees();
        let gamma = (va.dot(&vb) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号，右手系为正）
    pub fn volume(&self) -> f64 {
        self.to_matrix3().determinant()
    }

    /// 三个方向的垂直宽度（晶面间距），即体积除以对面面积
    pub fn perpendicular_widths(&self) -> [f64; 3] {
        let (va, vb, vc) = (self.vector(0), self.vector(1), self.vector(2));
        let vol = self.volume().abs();
        [
            vol / vb.cross(&vc).norm(),
            vol / vc.cross(&va).norm(),
            vol / va.cross(&vb).norm(),
        ]
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: &[f64; 3]) -> Vector3<f64> {
        self.to_matrix3().transpose() * Vector3::from(*frac)
    }

    /// 笛卡尔坐标转分数坐标；退化晶格返回 None
    pub fn cart_to_frac(&self, cart: &Vector3<f64>) -> Option<[f64; 3]> {
        let inv = self.to_matrix3().transpose().try_inverse()?;
        let f = inv * cart;
        Some([f[0], f[1], f[2]])
    }

    /// 最小镜像距离 (Å)
    pub fn min_image_distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let mut d = [0.0; 3];
        for i in 0..3 {
            d[i] = b[i] - a[i];
            d[i] -= d[i].round();
        }

        let mut best = f64::INFINITY;
        for n0 in -1..=1 {
            for n1 in -1..=1 {
                for n2 in -1..=1 {
                    let shifted = [d[0] + n0 as f64, d[1] + n1 as f64, d[2] + n2 as f64];
                    best = best.min(self.frac_to_cart(&shifted).norm());
                }
            }
        }
        best
    }
}

/// 物种：化学元素或虚拟标记 `X`
///
/// 序列化为元素符号字符串，`"X"` 对应虚拟标记。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Species {
    Element(String),
    Dummy,
}

impl Species {
    pub const DUMMY_SYMBOL: &'static str = "X";

    pub fn element(symbol: impl Into<String>) -> Self {
        Species::from(symbol.into())
    }

    pub fn symbol(&self) -> &str {
        match self {
            Species::Element(s) => s,
            Species::Dummy => Self::DUMMY_SYMBOL,
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, Species::Dummy)
    }
}

impl From<String> for Species {
    fn from(s: String) -> Self {
        if s == Species::DUMMY_SYMBOL {
            Species::Dummy
        } else {
            Species::Element(s)
        }
    }
}

impl From<Species> for String {
    fn from(s: Species) -> Self {
        s.symbol().to_string()
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 格点信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 物种
    pub species: Species,

    /// 分数坐标 [x, y, z]
    pub frac_coords: [f64; 3],

    /// 可选：形式氧化态
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxidation_state: Option<i32>,
}

impl Site {
    pub fn new(element: impl Into<String>, frac_coords: [f64; 3]) -> Self {
        Site {
            species: Species::element(element),
            frac_coords,
            oxidation_state: None,
        }
    }

    pub fn dummy(frac_coords: [f64; 3]) -> Self {
        Site {
            species: Species::Dummy,
            frac_coords,
            oxidation_state: None,
        }
    }

    pub fn with_oxidation_state(mut self, oxi: i32) -> Self {
        self.oxidation_state = Some(oxi);
        self
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 晶格
    pub lattice: Lattice,

    /// 格点列表
    pub sites: Vec<Site>,
}

impl Structure {
    pub fn new(lattice: Lattice, sites: Vec<Site>) -> Self {
        Structure { lattice, sites }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn volume(&self) -> f64 {
        self.lattice.volume().abs()
    }

    /// 元素列表，按首次出现顺序（不含虚拟标记）
    pub fn elements(&self) -> Vec<String> {
        self.composition().into_keys().collect()
    }

    /// 组成：元素 -> 原子数，按首次出现顺序
    pub fn composition(&self) -> IndexMap<String, usize> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for site in self.sites.iter().filter(|s| !s.species.is_dummy()) {
            *counts.entry(site.species.symbol().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// 约化化学式，例如 `CdTe`, `Cu2SiSe3`
    pub fn formula(&self) -> String {
        let composition = self.composition();
        let divisor = composition.values().copied().fold(0, gcd).max(1);

        composition
            .iter()
            .map(|(el, &count)| match count / divisor {
                1 => el.clone(),
                n => format!("{}{}", el, n),
            })
            .collect()
    }

    /// 格点笛卡尔坐标
    pub fn cart_coords(&self, index: usize) -> Vector3<f64> {
        self.lattice.frac_to_cart(&self.sites[index].frac_coords)
    }

    /// 格点到任意分数坐标的最小镜像距离
    pub fn distance_to(&self, index: usize, frac: &[f64; 3]) -> f64 {
        self.lattice
            .min_image_distance(&self.sites[index].frac_coords, frac)
    }

    /// 距离给定坐标最近的格点，可按物种过滤
    pub fn nearest_site(&self, frac: &[f64; 3], species: Option<&Species>) -> Option<(usize, f64)> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| species.map_or(true, |sp| &s.species == sp))
            .map(|(i, _)| (i, self.distance_to(i, frac)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// 移除全部氧化态标注
    pub fn remove_oxidation_states(&mut self) {
        for site in &mut self.sites {
            site.oxidation_state = None;
        }
    }

    /// 虚拟标记格点的索引
    pub fn dummy_indices(&self) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.species.is_dummy())
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b, c, alpha, beta, gamma) = self.lattice.parameters();
        writeln!(f, "Structure: {} ({} sites)", self.formula(), self.len())?;
        writeln!(
            f,
            "abc: {:.5} {:.5} {:.5}  angles: {:.3} {:.3} {:.3}",
            a, b, c, alpha, beta, gamma
        )?;
        for site in &self.sites {
            let [x, y, z] = site.frac_coords;
            writeln!(f, "  {:<3} {:>9.5} {:>9.5} {:>9.5}", site.species, x, y, z)?;
        }
        Ok(())
    }
}

/// 将分数坐标回卷到 [0, 1)
pub fn wrap_frac(x: f64) -> f64 {
    let w = x - x.floor();
    if (1.0 - w) < WRAP_EPS || w.abs() < WRAP_EPS {
        0.0
    } else {
        w
    }
}

pub fn wrap_coords(c: [f64; 3]) -> [f64; 3] {
    [wrap_frac(c[0]), wrap_frac(c[1]), wrap_frac(c[2])]
}

/// 保留 5 位小数并消除 -0.0
pub fn round5(x: f64) -> f64 {
    (x * 1e5).round() / 1e5 + 0.0
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Lattice {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    #[test]
    fn test_lattice_from_parameters_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let (a, b, c, alpha, beta, gamma) = lattice.parameters();

        assert!((a - 5.0).abs() < 1e-6);
        assert!((b - 5.0).abs() < 1e-6);
        assert!((c - 5.0).abs() < 1e-6);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert!((beta - 90.0).abs() < 1e-6);
        assert!((gamma - 90.0).abs() < 1e-6);
        assert!((lattice.volume() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_hexagonal() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let (a, _, c, _, _, gamma) = lattice.parameters();

        assert!((a - 3.0).abs() < 0.01);
        assert!((c - 5.0).abs() < 0.01);
        assert!((gamma - 120.0).abs() < 0.01);
    }

    #[test]
    fn test_perpendicular_widths_fcc() {
        // fcc 原胞，a = 6.5：晶面间距 a/sqrt(3)
        let h = 3.25;
        let lattice = Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]);
        for w in lattice.perpendicular_widths() {
            assert!((w - 6.5 / 3f64.sqrt()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_frac_cart_round_trip() {
        let lattice = Lattice::from_parameters(4.0, 5.0, 6.0, 80.0, 95.0, 110.0);
        let frac = [0.1, 0.7, 0.35];
        let cart = lattice.frac_to_cart(&frac);
        let back = lattice.cart_to_frac(&cart).unwrap();
        for i in 0..3 {
            assert!((back[i] - frac[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_min_image_distance_crosses_boundary() {
        let lattice = cubic(10.0);
        let d = lattice.min_image_distance(&[0.02, 0.0, 0.0], &[0.98, 0.0, 0.0]);
        assert!((d - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_formula_and_composition_order() {
        let structure = Structure::new(
            cubic(5.0),
            vec![
                Site::new("Te", [0.25, 0.25, 0.25]),
                Site::new("Cd", [0.0, 0.0, 0.0]),
                Site::new("Te", [0.75, 0.75, 0.25]),
                Site::new("Cd", [0.5, 0.5, 0.0]),
                Site::dummy([0.1, 0.1, 0.1]),
            ],
        );
        assert_eq!(structure.elements(), vec!["Te", "Cd"]);
        assert_eq!(structure.formula(), "TeCd");
        assert_eq!(structure.dummy_indices(), vec![4]);
    }

    #[test]
    fn test_species_serializes_as_symbol() {
        let site = Site::dummy([0.0, 0.5, 0.5]);
        let json = serde_json::to_string(&site).unwrap();
        assert!(json.contains("\"X\""));
        let back: Site = serde_json::from_str(&json).unwrap();
        assert!(back.species.is_dummy());
    }

    #[test]
    fn test_wrap_and_round() {
        assert_eq!(wrap_frac(-0.25), 0.75);
        assert_eq!(wrap_frac(1.0 - 1e-12), 0.0);
        assert_eq!(round5(-0.000001).to_string(), "0");
        assert!((round5(0.123456789) - 0.12346).abs() < 1e-12);
    }
}
