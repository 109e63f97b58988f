//! # 缺陷条目组装
//!
//! 缺陷 + 共享超胞矩阵 + 电荷态 -> `DefectEntry`。
//!
//! 超胞中的缺陷位置用一个虚拟格点 `X` 标记；组装时要求恰好一个虚拟格点，
//! 记录其坐标后移除。
//!
//! ## 依赖关系
//! - 被 `generation/generator.rs` 使用
//! - 使用 `generation/supercell.rs`

use crate::error::{DefectError, Result};
use crate::generation::supercell::{make_supercell, to_f64, SupercellMatrix};
use crate::models::structure::wrap_coords;
use crate::models::{Defect, DefectEntry, DefectKind, ScEntry, Site, Species, Structure};

use nalgebra::RowVector3;

/// 匹配超胞格点的距离容差 (Å)
const SITE_MATCH_TOL: f64 = 0.01;

/// 缺陷在超胞中的分数坐标：frac·M⁻¹
pub fn supercell_frac_coords(frac: &[f64; 3], matrix: &SupercellMatrix) -> Result<[f64; 3]> {
    let inv = to_f64(matrix)
        .try_inverse()
        .ok_or_else(|| DefectError::InvalidArgument("Supercell matrix is singular".to_string()))?;
    let f = RowVector3::from(*frac) * inv;
    Ok(wrap_coords([f[0], f[1], f[2]]))
}

/// 构造带虚拟标记的缺陷超胞
pub fn defect_supercell_structure(defect: &Defect, matrix: &SupercellMatrix) -> Result<Structure> {
    let mut sc = make_supercell(&defect.structure, matrix)?;
    let pos = supercell_frac_coords(&defect.site.frac_coords, matrix)?;

    match defect.kind {
        DefectKind::Vacancy => {
            let idx = matching_site(&sc, &pos, Some(&defect.site.species))?;
            sc.sites.remove(idx);
        }
        DefectKind::Substitution => {
            let idx = matching_site(&sc, &pos, None)?;
            sc.sites[idx].species = defect.site.species.clone();
            sc.sites[idx].oxidation_state = None;
        }
        DefectKind::Interstitial | DefectKind::Other => {
            sc.sites.push(Site {
                frac_coords: pos,
                oxidation_state: None,
                ..defect.site.clone()
            });
        }
    }

    sc.sites.push(Site::dummy(pos));
    Ok(sc)
}

fn matching_site(sc: &Structure, pos: &[f64; 3], species: Option<&Species>) -> Result<usize> {
    match sc.nearest_site(pos, species) {
        Some((idx, d)) if d < SITE_MATCH_TOL => Ok(idx),
        Some((_, d)) => Err(DefectError::StructureMismatch(format!(
            "no host site within {} Å of the defect position (nearest at {:.3} Å)",
            SITE_MATCH_TOL, d
        ))),
        None => Err(DefectError::StructureMismatch(
            "no matching host site for the defect".to_string(),
        )),
    }
}

/// 由带虚拟标记的超胞组装条目；名称稍后由生成器分配
pub fn defect_entry_from_defect(defect: &Defect, sc_structure: &Structure, charge_state: i32) -> Result<DefectEntry> {
    let mut structure = sc_structure.clone();
    let dummies = structure.dummy_indices();
    if dummies.len() != 1 {
        return Err(DefectError::DummySiteCount {
            found: dummies.len(),
        });
    }

    let dummy = structure.sites.remove(dummies[0]);
    for site in &mut structure.sites {
        site.frac_coords = wrap_coords(site.frac_coords);
    }

    Ok(DefectEntry {
        name: String::new(),
        defect: defect.clone(),
        charge_state,
        sc_entry: ScEntry {
            structure,
            energy: 0.0,
        },
        sc_defect_frac_coords: wrap_coords(dummy.frac_coords),
    })
}

/// 一步完成：超胞 + 条目
pub fn assemble_entry(defect: &Defect, matrix: &SupercellMatrix, charge_state: i32) -> Result<DefectEntry> {
    let sc = defect_supercell_structure(defect, matrix)?;
    defect_entry_from_defect(defect, &sc, charge_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    const M: SupercellMatrix = [[-2, 2, 2], [2, -2, 2], [2, 2, -2]];

    fn defect(kind: DefectKind, species: &str, frac: [f64; 3], site_index: Option<usize>) -> Defect {
        let h = 3.25;
        Defect {
            kind,
            structure: Structure::new(
                Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]),
                vec![
                    Site::new("Cd", [0.0, 0.0, 0.0]),
                    Site::new("Te", [0.25, 0.25, 0.25]),
                ],
            ),
            site: Site::new(species, frac),
            site_index,
            multiplicity: 1,
            oxi_state: 0,
        }
    }

    #[test]
    fn test_vacancy_substitution_interstitial_site_counts() {
        let vac = assemble_entry(&defect(DefectKind::Vacancy, "Cd", [0.0; 3], Some(0)), &M, -2).unwrap();
        assert_eq!(vac.sc_entry.structure.len(), 63);
        assert_eq!(vac.sc_entry.structure.composition().get("Cd"), Some(&31));
        assert_eq!(vac.sc_entry.energy, 0.0);

        let sub = assemble_entry(&defect(DefectKind::Substitution, "Zn", [0.0; 3], Some(0)), &M, 0).unwrap();
        assert_eq!(sub.sc_entry.structure.len(), 64);
        assert_eq!(sub.sc_entry.structure.composition().get("Zn"), Some(&1));

        let int = assemble_entry(
            &defect(DefectKind::Interstitial, "Cd", [0.5, 0.5, 0.5], None),
            &M,
            2,
        )
        .unwrap();
        assert_eq!(int.sc_entry.structure.len(), 65);
        assert!(int.sc_entry.structure.dummy_indices().is_empty());
        for v in int.sc_defect_frac_coords {
            assert!((v - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dummy_site_count_is_enforced() {
        let d = defect(DefectKind::Interstitial, "Cd", [0.5, 0.5, 0.5], None);
        let mut sc = defect_supercell_structure(&d, &M).unwrap();
        sc.sites.push(Site::dummy([0.1, 0.1, 0.1]));
        match defect_entry_from_defect(&d, &sc, 0) {
            Err(DefectError::DummySiteCount { found }) => assert_eq!(found, 2),
            other => panic!("unexpected result: {:?}", other),
        }

        sc.sites.retain(|s| !s.species.is_dummy());
        assert!(matches!(
            defect_entry_from_defect(&d, &sc, 0),
            Err(DefectError::DummySiteCount { found: 0 })
        ));
    }
}
