//! # 缺陷数据模型
//!
//! - `Defect`：原胞中经对称性表征的点缺陷（类型、格点、多重度、形式氧化态）
//! - `DefectEntry`：缺陷在共享超胞中的某一电荷态，带唯一名称和（待计算的）能量
//!
//! ## 依赖关系
//! - 被 `generation/` 和 `fermi/` 使用
//! - 使用 `models/structure.rs`

use crate::models::structure::{Site, Structure};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 缺陷类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefectKind {
    Vacancy,
    Substitution,
    Interstitial,
    Other,
}

impl DefectKind {
    /// 该类型在 `defects` 映射中的分类键
    pub fn category(self) -> DefectCategory {
        match self {
            DefectKind::Vacancy => DefectCategory::Vacancies,
            DefectKind::Substitution => DefectCategory::Substitutions,
            DefectKind::Interstitial => DefectCategory::Interstitials,
            DefectKind::Other => DefectCategory::Others,
        }
    }
}

/// `defects` 映射的分类键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefectCategory {
    Vacancies,
    Substitutions,
    Interstitials,
    Others,
}

impl DefectCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DefectCategory::Vacancies => "vacancies",
            DefectCategory::Substitutions => "substitutions",
            DefectCategory::Interstitials => "interstitials",
            DefectCategory::Others => "others",
        }
    }

    /// 首字母大写，用作汇总表表头
    pub fn title(self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 原胞中的点缺陷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub kind: DefectKind,

    /// 被扰动的原胞结构
    pub structure: Structure,

    /// 缺陷格点：空位为被移除的原子，替位为新物种，间隙为插入物种
    pub site: Site,

    /// 空位/替位对应的原胞格点索引
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_index: Option<usize>,

    /// 原胞中对称等价格点数
    pub multiplicity: usize,

    /// 形式氧化态
    pub oxi_state: i32,
}

impl Defect {
    /// 被替换的宿主元素（仅替位缺陷）
    pub fn host_element(&self) -> Option<&str> {
        self.site_index
            .and_then(|i| self.structure.sites.get(i))
            .map(|s| s.species.symbol())
    }

    /// 缺陷名称，如 `v_Cd`, `Te_Cd`, `Cd_i`
    pub fn name(&self) -> String {
        let el = self.site.species.symbol();
        match self.kind {
            DefectKind::Vacancy => format!("v_{}", el),
            DefectKind::Substitution => {
                format!("{}_{}", el, self.host_element().unwrap_or("X"))
            }
            DefectKind::Interstitial => format!("{}_i", el),
            DefectKind::Other => format!("{}_o", el),
        }
    }

    /// 不含电荷、不含消歧字母的基础名称：格点索引或多重度描述
    pub fn base_name(&self) -> String {
        match (self.kind, self.site_index) {
            (DefectKind::Vacancy | DefectKind::Substitution, Some(idx)) => {
                format!("{}_s{}", self.name(), idx)
            }
            _ => format!("{}_m{}", self.name(), self.multiplicity),
        }
    }

    /// 元素变化：加入为正，移除为负
    pub fn element_changes(&self) -> IndexMap<String, i32> {
        let mut changes = IndexMap::new();
        let el = self.site.species.symbol().to_string();
        match self.kind {
            DefectKind::Vacancy => {
                changes.insert(el, -1);
            }
            DefectKind::Substitution => {
                changes.insert(el, 1);
                if let Some(host) = self.host_element() {
                    changes.insert(host.to_string(), -1);
                }
            }
            DefectKind::Interstitial | DefectKind::Other => {
                changes.insert(el, 1);
            }
        }
        changes
    }

    /// 由形式氧化态给出的电荷态集合
    pub fn charge_states(&self) -> Vec<i32> {
        charge_states(self.oxi_state)
    }
}

/// 电荷态集合：正氧化态从 -1 到 q，负氧化态从 q 到 +1，零则为 [-1, 0, 1]
pub fn charge_states(oxi_state: i32) -> Vec<i32> {
    if oxi_state > 0 {
        (-1..=oxi_state).collect()
    } else if oxi_state < 0 {
        (oxi_state..=1).collect()
    } else {
        vec![-1, 0, 1]
    }
}

/// 电荷显示：正数带 `+`
pub fn format_charge(charge: i32) -> String {
    if charge > 0 {
        format!("+{}", charge)
    } else {
        charge.to_string()
    }
}

/// `<base>_<charge>`
pub fn name_with_charge(base: &str, charge: i32) -> String {
    format!("{}_{}", base, format_charge(charge))
}

/// 拆分 `<base>_<charge>`；末段不是整数时返回 None
pub fn split_charge(name: &str) -> Option<(&str, i32)> {
    let (base, charge) = name.rsplit_once('_')?;
    charge.parse().ok().map(|q| (base, q))
}

/// 超胞结构 + 能量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScEntry {
    pub structure: Structure,
    pub energy: f64,
}

/// 缺陷在共享超胞中的某一电荷态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectEntry {
    /// 生成器内唯一的名称，`<base>_<charge>`
    #[serde(default)]
    pub name: String,
    pub defect: Defect,
    pub charge_state: i32,
    pub sc_entry: ScEntry,
    /// 缺陷在超胞中的分数坐标
    pub sc_defect_frac_coords: [f64; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::structure::Lattice;

    fn cdte_defect(kind: DefectKind, species: &str, site_index: Option<usize>) -> Defect {
        let h = 3.25;
        let structure = Structure::new(
            Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]),
            vec![
                Site::new("Cd", [0.0, 0.0, 0.0]),
                Site::new("Te", [0.25, 0.25, 0.25]),
            ],
        );
        Defect {
            kind,
            structure,
            site: Site::new(species, [0.25, 0.25, 0.25]),
            site_index,
            multiplicity: 1,
            oxi_state: 0,
        }
    }

    #[test]
    fn test_charge_state_sets() {
        assert_eq!(charge_states(2), vec![-1, 0, 1, 2]);
        assert_eq!(charge_states(-2), vec![-2, -1, 0, 1]);
        assert_eq!(charge_states(0), vec![-1, 0, 1]);
        assert!(charge_states(4).contains(&0));
    }

    #[test]
    fn test_charge_formatting() {
        assert_eq!(name_with_charge("v_Cd_s0", 2), "v_Cd_s0_+2");
        assert_eq!(name_with_charge("v_Cd_s0", 0), "v_Cd_s0_0");
        assert_eq!(name_with_charge("v_Cd_s0", -1), "v_Cd_s0_-1");
        assert_eq!(split_charge("Cd_i_m1a_+2"), Some(("Cd_i_m1a", 2)));
        assert_eq!(split_charge("Cd_i_m1a"), None);
    }

    #[test]
    fn test_defect_names() {
        let vac = cdte_defect(DefectKind::Vacancy, "Te", Some(1));
        assert_eq!(vac.base_name(), "v_Te_s1");
        assert_eq!(vac.element_changes().get("Te"), Some(&-1));

        let sub = cdte_defect(DefectKind::Substitution, "Cd", Some(1));
        assert_eq!(sub.base_name(), "Cd_Te_s1");
        assert_eq!(sub.element_changes().get("Te"), Some(&-1));

        let int = cdte_defect(DefectKind::Interstitial, "Cd", None);
        assert_eq!(int.base_name(), "Cd_i_m1");
        assert_eq!(int.kind.category().title(), "Interstitials");
    }
}
