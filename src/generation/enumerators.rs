//! # 缺陷枚举
//!
//! 在（已标注氧化态的）原胞上枚举对称不等价的点缺陷：
//! - 空位：每个格点轨道一个
//! - 反位：每个格点轨道 × 其他宿主元素
//! - 替位：每个格点轨道 × 允许的外来元素
//! - 间隙：手动坐标或 `InterstitialFinder` 给出的位置 × 宿主元素 + 外来元素
//!
//! `Defect.structure` 一律为去掉氧化态的原胞，与生成器的 `primitive_structure` 一致。
//!
//! ## 依赖关系
//! - 被 `generation/generator.rs` 使用
//! - 使用 `generation/charges.rs`, `generation/voronoi.rs`, `symmetry/ops.rs`

use crate::generation::charges::oxidation_state_of;
use crate::generation::voronoi::{group_by_symmetry, InterstitialSite, VoronoiSettings};
use crate::models::structure::wrap_coords;
use crate::models::{Defect, DefectKind, Site, Structure};
use crate::symmetry::SymmetryOperation;
use crate::utils::output;

use indexmap::IndexMap;

fn plain(structure: &Structure) -> Structure {
    let mut s = structure.clone();
    s.remove_oxidation_states();
    s
}

fn host_oxidation_state(site: &Site, host_states: &IndexMap<String, i32>) -> i32 {
    site.oxidation_state
        .unwrap_or_else(|| oxidation_state_of(site.species.symbol(), host_states))
}

/// 空位：氧化态为 −ox(host)
pub fn vacancies(
    prim: &Structure,
    orbits: &[Vec<usize>],
    host_states: &IndexMap<String, i32>,
) -> Vec<Defect> {
    let structure = plain(prim);
    orbits
        .iter()
        .filter_map(|orbit| {
            let &idx = orbit.first()?;
            let site = &prim.sites[idx];
            Some(Defect {
                kind: DefectKind::Vacancy,
                structure: structure.clone(),
                site: Site::new(site.species.symbol(), site.frac_coords),
                site_index: Some(idx),
                multiplicity: orbit.len(),
                oxi_state: -host_oxidation_state(site, host_states),
            })
        })
        .collect()
}

fn substitution(
    prim: &Structure,
    structure: &Structure,
    orbit: &[usize],
    new_element: &str,
    host_states: &IndexMap<String, i32>,
) -> Option<Defect> {
    let &idx = orbit.first()?;
    let host = &prim.sites[idx];
    if host.species.symbol() == new_element {
        return None;
    }
    Some(Defect {
        kind: DefectKind::Substitution,
        structure: structure.clone(),
        site: Site::new(new_element, host.frac_coords),
        site_index: Some(idx),
        multiplicity: orbit.len(),
        oxi_state: oxidation_state_of(new_element, host_states) - host_oxidation_state(host, host_states),
    })
}

/// 反位：每个格点轨道被其他宿主元素占据
pub fn antisites(
    prim: &Structure,
    orbits: &[Vec<usize>],
    host_states: &IndexMap<String, i32>,
) -> Vec<Defect> {
    let structure = plain(prim);
    let elements = prim.elements();
    let mut defects = Vec::new();
    for orbit in orbits {
        for el in &elements {
            if let Some(d) = substitution(prim, &structure, orbit, el, host_states) {
                defects.push(d);
            }
        }
    }
    defects
}

/// 外来元素替位；`allowed` 为宿主元素 -> 外来元素列表
pub fn substitutions(
    prim: &Structure,
    orbits: &[Vec<usize>],
    host_states: &IndexMap<String, i32>,
    allowed: &IndexMap<String, Vec<String>>,
) -> Vec<Defect> {
    let structure = plain(prim);
    let mut defects = Vec::new();
    for orbit in orbits {
        let Some(&idx) = orbit.first() else { continue };
        let Some(dopants) = allowed.get(prim.sites[idx].species.symbol()) else {
            continue;
        };
        for dopant in dopants {
            if let Some(d) = substitution(prim, &structure, orbit, dopant, host_states) {
                defects.push(d);
            }
        }
    }
    defects
}

/// 手动坐标 -> 对称不等价的间隙位；离原子过近的坐标给出警告并丢弃
pub fn sites_from_coords(
    prim: &Structure,
    ops: &[SymmetryOperation],
    coords: &[[f64; 3]],
    settings: &VoronoiSettings,
) -> Vec<InterstitialSite> {
    let mut kept = Vec::new();
    for c in coords {
        let frac = wrap_coords(*c);
        let nearest = prim
            .nearest_site(&frac, None)
            .map(|(_, d)| d)
            .unwrap_or(f64::INFINITY);
        if nearest < settings.min_dist {
            output::print_warning(&format!(
                "Interstitial site at [{:.3}, {:.3}, {:.3}] is {:.2} Å from the nearest atom \
                 (< {:.2} Å) and will be skipped",
                frac[0], frac[1], frac[2], nearest, settings.min_dist
            ));
            continue;
        }
        kept.push(frac);
    }
    group_by_symmetry(&prim.lattice, ops, &kept, settings.symmetry_tol)
}

/// 在给定间隙位插入各元素；元素顺序即生成顺序
pub fn interstitials(
    prim: &Structure,
    sites: &[InterstitialSite],
    elements: &[String],
    host_states: &IndexMap<String, i32>,
) -> Vec<Defect> {
    let structure = plain(prim);
    let mut defects = Vec::new();
    for el in elements {
        for site in sites {
            defects.push(Defect {
                kind: DefectKind::Interstitial,
                structure: structure.clone(),
                site: Site::new(el.as_str(), site.frac_coords),
                site_index: None,
                multiplicity: site.multiplicity,
                oxi_state: oxidation_state_of(el, host_states),
            });
        }
    }
    defects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::charges::{decorate, guess_oxidation_states};
    use crate::models::Lattice;
    use crate::symmetry::{SpaceGroupAnalyzer, SymmetryAnalyzer};

    fn decorated_cdte() -> (Structure, IndexMap<String, i32>) {
        let h = 3.25;
        let mut s = Structure::new(
            Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]),
            vec![
                Site::new("Cd", [0.0, 0.0, 0.0]),
                Site::new("Te", [0.25, 0.25, 0.25]),
            ],
        );
        let states = guess_oxidation_states(&s);
        decorate(&mut s, &states);
        (s, states)
    }

    #[test]
    fn test_vacancies_and_antisites() {
        let (prim, states) = decorated_cdte();
        let orbits = SpaceGroupAnalyzer::default().equivalent_sites(&prim).unwrap();

        let vac = vacancies(&prim, &orbits, &states);
        assert_eq!(vac.len(), 2);
        assert_eq!(vac[0].base_name(), "v_Cd_s0");
        assert_eq!(vac[0].oxi_state, -2);
        assert_eq!(vac[1].oxi_state, 2);
        assert!(vac[0].structure.sites.iter().all(|s| s.oxidation_state.is_none()));

        let anti = antisites(&prim, &orbits, &states);
        let names: Vec<String> = anti.iter().map(|d| d.base_name()).collect();
        assert_eq!(names, vec!["Te_Cd_s0", "Cd_Te_s1"]);
        assert_eq!(anti[0].oxi_state, -4);
        assert_eq!(anti[1].oxi_state, 4);
    }

    #[test]
    fn test_substitutions_skip_self_replacement() {
        let (prim, states) = decorated_cdte();
        let orbits = SpaceGroupAnalyzer::default().equivalent_sites(&prim).unwrap();
        let mut allowed = IndexMap::new();
        allowed.insert("Cd".to_string(), vec!["Zn".to_string(), "Cd".to_string()]);

        let subs = substitutions(&prim, &orbits, &states, &allowed);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name(), "Zn_Cd");
        assert_eq!(subs[0].oxi_state, 0);
    }

    #[test]
    fn test_manual_interstitial_coords() {
        let (prim, states) = decorated_cdte();
        let ops = SpaceGroupAnalyzer::default().operations(&prim).unwrap();
        let sites = sites_from_coords(
            &prim,
            &ops,
            &[[0.5, 0.5, 0.5], [0.01, 0.0, 0.0], [0.5, 0.5, 0.5]],
            &VoronoiSettings::default(),
        );
        assert_eq!(sites.len(), 1);

        let elements = vec!["Cd".to_string(), "Te".to_string()];
        let defects = interstitials(&prim, &sites, &elements, &states);
        assert_eq!(defects.len(), 2);
        assert_eq!(defects[0].base_name(), "Cd_i_m1");
        assert_eq!(defects[1].charge_states(), vec![-2, -1, 0, 1]);
    }
}
