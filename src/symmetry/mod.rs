//! # 对称性分析模块
//!
//! 缺陷生成所需的对称性能力：规范原胞、空间群操作、对称等价格点分组。
//! 通过 `SymmetryAnalyzer` trait 提供，默认实现由 `moyo` 完成空间群识别，
//! 可替换为外部实现。
//!
//! ## 依赖关系
//! - 被 `generation/` 使用
//! - 子模块: ops (操作的作用与点轨道), primitive (moyo 原胞 -> 规范结构)
//! - 使用 `moyo` crate

pub mod ops;
pub mod primitive;

pub use ops::SymmetryOperation;

use crate::error::{DefectError, Result};
use crate::models::{Species, Structure};

use moyo::base::{AngleTolerance, Cell, Lattice as MoyoLattice};
use moyo::data::Setting;
use moyo::MoyoDataset;
use nalgebra::Vector3;

/// 对称性分析能力
pub trait SymmetryAnalyzer {
    /// 规范原胞（坐标已取整到 5 位小数）
    fn primitive_standard_structure(&self, structure: &Structure) -> Result<Structure>;

    /// 空间群操作（输入结构的分数坐标）
    fn operations(&self, structure: &Structure) -> Result<Vec<SymmetryOperation>>;

    /// 对称等价格点分组，按组内最小索引排序
    fn equivalent_sites(&self, structure: &Structure) -> Result<Vec<Vec<usize>>>;

    /// 位置容差 (Å)
    fn symprec(&self) -> f64;
}

/// 基于 moyo 的空间群分析器
#[derive(Debug, Clone, Copy)]
pub struct SpaceGroupAnalyzer {
    pub symprec: f64,
}

impl Default for SpaceGroupAnalyzer {
    fn default() -> Self {
        SpaceGroupAnalyzer { symprec: 0.01 }
    }
}

impl SpaceGroupAnalyzer {
    pub fn new(symprec: f64) -> Self {
        SpaceGroupAnalyzer { symprec }
    }

    fn dataset(&self, structure: &Structure) -> Result<MoyoDataset> {
        if structure.is_empty() {
            return Err(DefectError::Symmetry("Structure has no sites".to_string()));
        }
        if structure.volume() < 1e-6 {
            return Err(DefectError::Symmetry(
                "Degenerate lattice (zero volume)".to_string(),
            ));
        }

        let cell = to_moyo_cell(structure);
        MoyoDataset::new(&cell, self.symprec, AngleTolerance::Default, Setting::Standard)
            .map_err(|e| DefectError::Symmetry(format!("Space group search failed: {}", e)))
    }
}

impl SymmetryAnalyzer for SpaceGroupAnalyzer {
    fn primitive_standard_structure(&self, structure: &Structure) -> Result<Structure> {
        let dataset = self.dataset(structure)?;
        primitive::from_moyo_cell(structure, &dataset.prim_std_cell)
    }

    fn operations(&self, structure: &Structure) -> Result<Vec<SymmetryOperation>> {
        let dataset = self.dataset(structure)?;
        let mut ops: Vec<SymmetryOperation> =
            dataset.operations.iter().map(SymmetryOperation::from).collect();
        // 恒等操作排在最前
        ops.sort_by_key(|op| !op.is_pure_translation());
        Ok(ops)
    }

    fn equivalent_sites(&self, structure: &Structure) -> Result<Vec<Vec<usize>>> {
        let dataset = self.dataset(structure)?;
        Ok(group_orbits(&dataset.orbits))
    }

    fn symprec(&self) -> f64 {
        self.symprec
    }
}

/// 物种编号：按物种首次出现顺序
pub(crate) fn species_numbers(structure: &Structure) -> (Vec<i32>, Vec<Species>) {
    let mut kinds: Vec<Species> = Vec::new();
    let numbers = structure
        .sites
        .iter()
        .map(|site| match kinds.iter().position(|k| *k == site.species) {
            Some(i) => i as i32,
            None => {
                kinds.push(site.species.clone());
                (kinds.len() - 1) as i32
            }
        })
        .collect();
    (numbers, kinds)
}

fn to_moyo_cell(structure: &Structure) -> Cell {
    let (numbers, _) = species_numbers(structure);
    let positions = structure
        .sites
        .iter()
        .map(|s| Vector3::new(s.frac_coords[0], s.frac_coords[1], s.frac_coords[2]))
        .collect();
    Cell::new(
        MoyoLattice::new(structure.lattice.to_matrix3()),
        positions,
        numbers,
    )
}

/// moyo 的轨道代表索引 -> 分组
fn group_orbits(orbits: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut representatives: Vec<usize> = Vec::new();
    for (i, &rep) in orbits.iter().enumerate() {
        match representatives.iter().position(|&r| r == rep) {
            Some(g) => groups[g].push(i),
            None => {
                representatives.push(rep);
                groups.push(vec![i]);
            }
        }
    }
    groups
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Lattice, Site};

    pub(crate) fn cdte_primitive() -> Structure {
        let h = 3.25;
        Structure::new(
            Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]),
            vec![
                Site::new("Cd", [0.0, 0.0, 0.0]),
                Site::new("Te", [0.25, 0.25, 0.25]),
            ],
        )
    }

    pub(crate) fn conventional_cdte() -> Structure {
        let a = 6.5;
        let fcc = [[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]];
        let mut sites: Vec<Site> = fcc.iter().map(|f| Site::new("Cd", *f)).collect();
        sites.extend(
            fcc.iter()
                .map(|f| Site::new("Te", [f[0] + 0.25, f[1] + 0.25, f[2] + 0.25])),
        );
        Structure::new(
            Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]),
            sites,
        )
    }

    #[test]
    fn test_zincblende_has_24_operations() {
        let ops = SpaceGroupAnalyzer::default()
            .operations(&cdte_primitive())
            .unwrap();
        assert_eq!(ops.len(), 24);
        assert!(ops[0].is_pure_translation());
    }

    #[test]
    fn test_conventional_cell_carries_centring_translations() {
        let ops = SpaceGroupAnalyzer::default()
            .operations(&conventional_cdte())
            .unwrap();
        assert_eq!(ops.len(), 96);
        assert_eq!(ops.iter().filter(|op| op.is_pure_translation()).count(), 4);
    }

    #[test]
    fn test_equivalent_sites_group_by_species() {
        let analyzer = SpaceGroupAnalyzer::default();
        assert_eq!(
            analyzer.equivalent_sites(&cdte_primitive()).unwrap(),
            vec![vec![0], vec![1]]
        );
        assert_eq!(
            analyzer.equivalent_sites(&conventional_cdte()).unwrap(),
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]
        );
    }

    #[test]
    fn test_group_orbits_keeps_first_appearance() {
        assert_eq!(
            group_orbits(&[0, 1, 0, 3, 1]),
            vec![vec![0, 2], vec![1, 4], vec![3]]
        );
    }

    #[test]
    fn test_empty_structure_is_rejected() {
        let empty = Structure::new(
            Lattice::from_vectors([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            Vec::new(),
        );
        assert!(SpaceGroupAnalyzer::default().operations(&empty).is_err());
    }
}
