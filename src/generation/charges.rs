//! # 氧化态猜测
//!
//! 从常见氧化态表中为宿主组成挑选电中性的氧化态组合（优先更常见的氧化态），
//! 并给出外来元素的氧化态。缺陷的形式氧化态由此导出，电荷态集合见
//! `models::defect::charge_states`。
//!
//! ## 依赖关系
//! - 被 `generation/enumerators.rs`, `generation/generator.rs` 使用
//! - 使用 `models/elements.rs`

use crate::models::elements::{common_oxidation_states, most_common_oxidation_state};
use crate::models::Structure;

use indexmap::IndexMap;

/// 宿主各元素的氧化态猜测；单质或找不到电中性组合时全部为 0
pub fn guess_oxidation_states(structure: &Structure) -> IndexMap<String, i32> {
    let composition = structure.composition();
    let zeros = || -> IndexMap<String, i32> {
        composition.keys().map(|el| (el.clone(), 0)).collect()
    };

    if composition.len() < 2 {
        return zeros();
    }

    let options: Vec<Vec<i32>> = composition
        .keys()
        .map(|el| {
            let states = common_oxidation_states(el);
            if states.is_empty() {
                vec![0]
            } else {
                states.to_vec()
            }
        })
        .collect();
    let counts: Vec<i64> = composition.values().map(|&n| n as i64).collect();

    // 枚举所有组合，按（索引之和，字典序）排序：更常见的氧化态优先
    let mut combos: Vec<Vec<usize>> = vec![Vec::new()];
    for opts in &options {
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                (0..opts.len()).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    combos.sort_by_key(|c| (c.iter().sum::<usize>(), c.clone()));

    for combo in combos {
        let total: i64 = combo
            .iter()
            .enumerate()
            .map(|(k, &i)| options[k][i] as i64 * counts[k])
            .sum();
        if total == 0 {
            return composition
                .keys()
                .zip(combo.iter().enumerate())
                .map(|(el, (k, &i))| (el.clone(), options[k][i]))
                .collect();
        }
    }

    zeros()
}

/// 元素氧化态：宿主元素取猜测值，外来元素取最常见值
pub fn oxidation_state_of(element: &str, host_states: &IndexMap<String, i32>) -> i32 {
    host_states
        .get(element)
        .copied()
        .unwrap_or_else(|| most_common_oxidation_state(element))
}

/// 按猜测结果标注格点氧化态
pub fn decorate(structure: &mut Structure, host_states: &IndexMap<String, i32>) {
    for site in &mut structure.sites {
        site.oxidation_state = host_states.get(site.species.symbol()).copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lattice, Site};

    fn structure(species: &[&str]) -> Structure {
        let sites = species
            .iter()
            .enumerate()
            .map(|(i, el)| Site::new(*el, [0.1 * i as f64, 0.0, 0.0]))
            .collect();
        Structure::new(
            Lattice::from_vectors([[8.0, 0.0, 0.0], [0.0, 8.0, 0.0], [0.0, 0.0, 8.0]]),
            sites,
        )
    }

    #[test]
    fn test_binary_and_ternary_guesses() {
        let cdte = guess_oxidation_states(&structure(&["Cd", "Te"]));
        assert_eq!(cdte.get("Cd"), Some(&2));
        assert_eq!(cdte.get("Te"), Some(&-2));

        let cu2sise3 = guess_oxidation_states(&structure(&["Cu", "Cu", "Si", "Se", "Se", "Se"]));
        assert_eq!(cu2sise3.get("Cu"), Some(&1));
        assert_eq!(cu2sise3.get("Si"), Some(&4));
        assert_eq!(cu2sise3.get("Se"), Some(&-2));
    }

    #[test]
    fn test_elemental_host_is_neutral() {
        let si = guess_oxidation_states(&structure(&["Si", "Si"]));
        assert_eq!(si.get("Si"), Some(&0));
    }

    #[test]
    fn test_extrinsic_uses_most_common_state() {
        let host = guess_oxidation_states(&structure(&["Cd", "Te"]));
        assert_eq!(oxidation_state_of("Te", &host), -2);
        assert_eq!(oxidation_state_of("Cl", &host), -1);
        assert_eq!(oxidation_state_of("Zn", &host), 2);
    }
}
