//! # 规范原胞
//!
//! moyo 给出的标准原胞 -> 缺陷生成使用的规范结构：
//! 1. 按物种编号还原格点（保留输入格点上的氧化态等信息）
//! 2. 保证右手系
//! 3. 第一个元素的首个格点移到原点，格点按（元素出现顺序，坐标）排序
//! 4. 晶格与坐标保留 5 位小数，避免浮点噪声进入后续对称性判断
//!
//! ## 依赖关系
//! - 被 `symmetry/mod.rs` 使用
//! - 使用 `models/structure.rs`, `moyo`

use crate::error::{DefectError, Result};
use crate::models::structure::{round5, wrap_coords};
use crate::models::{Lattice, Site, Structure};
use crate::symmetry::species_numbers;

use moyo::base::Cell;

/// moyo 原胞 -> 规范结构；`input` 用于还原物种与格点属性
pub fn from_moyo_cell(input: &Structure, cell: &Cell) -> Result<Structure> {
    let (_, kinds) = species_numbers(input);

    let mut sites = Vec::with_capacity(cell.positions.len());
    for (position, &number) in cell.positions.iter().zip(cell.numbers.iter()) {
        let species = usize::try_from(number)
            .ok()
            .and_then(|i| kinds.get(i))
            .ok_or_else(|| {
                DefectError::Symmetry(format!("Unknown species number {} in primitive cell", number))
            })?;
        let template = input
            .sites
            .iter()
            .find(|s| s.species == *species)
            .ok_or_else(|| DefectError::Symmetry(format!("No {} site in input structure", species)))?;
        sites.push(Site {
            frac_coords: [position[0], position[1], position[2]],
            ..template.clone()
        });
    }

    if sites.is_empty() || input.len() % sites.len() != 0 {
        return Err(DefectError::Symmetry(format!(
            "{} sites are not divisible by the {} sites of the primitive cell",
            input.len(),
            sites.len()
        )));
    }

    // moyo 的晶格矩阵以列为基向量
    let mut rows = cell.lattice.basis.transpose();
    if rows.determinant() < 0.0 {
        rows = -rows;
        for site in &mut sites {
            site.frac_coords = [-site.frac_coords[0], -site.frac_coords[1], -site.frac_coords[2]];
        }
    }

    Ok(standardize(Lattice::from_matrix3(&rows), sites, &input.elements()))
}

/// 原点平移、排序与 5 位小数取整
pub fn standardize(lattice: Lattice, sites: Vec<Site>, element_order: &[String]) -> Structure {
    let origin = element_order
        .first()
        .and_then(|el| sites.iter().find(|s| s.species.symbol() == el))
        .map(|s| s.frac_coords)
        .unwrap_or([0.0; 3]);

    let clean = |c: [f64; 3]| {
        let wrapped = wrap_coords(c);
        wrap_coords([round5(wrapped[0]), round5(wrapped[1]), round5(wrapped[2])])
    };

    let mut sites: Vec<Site> = sites
        .into_iter()
        .map(|s| {
            let f = s.frac_coords;
            Site {
                frac_coords: clean([f[0] - origin[0], f[1] - origin[1], f[2] - origin[2]]),
                ..s
            }
        })
        .collect();

    let rank = |s: &Site| {
        element_order
            .iter()
            .position(|e| e == s.species.symbol())
            .unwrap_or(usize::MAX)
    };
    sites.sort_by(|a, b| {
        rank(a).cmp(&rank(b)).then_with(|| {
            a.frac_coords
                .iter()
                .zip(b.frac_coords.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    let mut matrix = lattice.matrix;
    for v in matrix.iter_mut().flatten() {
        *v = round5(*v);
    }

    Structure::new(Lattice::from_vectors(matrix), sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::tests::{cdte_primitive, conventional_cdte};
    use crate::symmetry::{SpaceGroupAnalyzer, SymmetryAnalyzer};

    fn assert_zincblende_pair(prim: &Structure) {
        assert_eq!(prim.len(), 2);
        assert_eq!(prim.sites[0].species.symbol(), "Cd");
        assert_eq!(prim.sites[0].frac_coords, [0.0, 0.0, 0.0]);
        // Cd-Te 键长 a·√3/4
        let bond = prim.distance_to(0, &prim.sites[1].frac_coords);
        assert!((bond - 6.5 * 3f64.sqrt() / 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_conventional_cdte_reduces_to_two_sites() {
        let prim = SpaceGroupAnalyzer::default()
            .primitive_standard_structure(&conventional_cdte())
            .unwrap();
        assert_zincblende_pair(&prim);
        assert!((prim.volume() - 6.5f64.powi(3) / 4.0).abs() < 1e-3);
        assert!(prim.lattice.to_matrix3().determinant() > 0.0);
    }

    #[test]
    fn test_reduction_is_idempotent() {
        let analyzer = SpaceGroupAnalyzer::default();
        let prim = analyzer.primitive_standard_structure(&cdte_primitive()).unwrap();
        let again = analyzer.primitive_standard_structure(&prim).unwrap();
        assert_zincblende_pair(&again);
        assert!((prim.volume() - again.volume()).abs() < 1e-3);
    }

    #[test]
    fn test_shifted_input_moves_origin_to_first_element() {
        let mut shifted = conventional_cdte();
        for site in &mut shifted.sites {
            site.frac_coords = wrap_coords([
                site.frac_coords[0] + 0.1,
                site.frac_coords[1] + 0.1,
                site.frac_coords[2] + 0.1,
            ]);
        }
        let prim = SpaceGroupAnalyzer::default()
            .primitive_standard_structure(&shifted)
            .unwrap();
        assert_zincblende_pair(&prim);
    }

    #[test]
    fn test_standardize_sorts_and_rounds() {
        let lattice = Lattice::from_vectors([[4.000001, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let sites = vec![
            Site::new("O", [0.5, 0.5, 0.5]),
            Site::new("Mg", [0.1000004, 0.1, 0.1]),
        ];
        let s = standardize(lattice, sites, &["Mg".to_string(), "O".to_string()]);
        assert_eq!(s.sites[0].species.symbol(), "Mg");
        assert_eq!(s.sites[0].frac_coords, [0.0, 0.0, 0.0]);
        assert_eq!(s.sites[1].frac_coords, [0.4, 0.4, 0.4]);
        assert_eq!(s.lattice.matrix[0][0], 4.0);
    }
}
