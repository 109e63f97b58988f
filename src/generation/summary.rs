//! # 缺陷汇总表
//!
//! 每个类别一张表，行为去掉电荷的缺陷名称，按缺陷涉及元素在宿主组成中首次出现的顺序排列
//! （同序按名称）。
//!
//! ## 依赖关系
//! - 被 `generation/generator.rs` 使用
//! - 使用 `tabled` crate

use crate::models::defect::{format_charge, split_charge};
use crate::models::{DefectCategory, DefectEntry, DefectKind};

use indexmap::IndexMap;
use tabled::builder::Builder;

/// 汇总表中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub name: String,
    pub charge_states: Vec<i32>,
    pub unit_cell_coords: [f64; 3],
    pub multiplicity: usize,
    sort_key: Vec<usize>,
}

/// 某一类别的汇总行
pub fn summary_rows(
    category: DefectCategory,
    entries: &IndexMap<String, DefectEntry>,
    host_elements: &[String],
) -> Vec<SummaryRow> {
    let position = |el: &str| {
        host_elements
            .iter()
            .position(|e| e == el)
            .unwrap_or(usize::MAX)
    };

    let mut rows: IndexMap<String, SummaryRow> = IndexMap::new();
    for (key, entry) in entries {
        if entry.defect.kind.category() != category {
            continue;
        }
        let (base, charge) = match split_charge(key) {
            Some((base, q)) => (base.to_string(), q),
            None => (key.clone(), entry.charge_state),
        };

        let row = rows.entry(base.clone()).or_insert_with(|| {
            let defect = &entry.defect;
            let mut sort_key = vec![position(defect.site.species.symbol())];
            if defect.kind == DefectKind::Substitution {
                if let Some(host) = defect.host_element() {
                    sort_key.push(position(host));
                }
            }
            SummaryRow {
                name: base,
                charge_states: Vec::new(),
                unit_cell_coords: defect.site.frac_coords,
                multiplicity: defect.multiplicity,
                sort_key,
            }
        });
        if !row.charge_states.contains(&charge) {
            row.charge_states.push(charge);
        }
    }

    let mut rows: Vec<SummaryRow> = rows.into_values().collect();
    for row in &mut rows {
        row.charge_states.sort_unstable();
    }
    rows.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// `[-1,0,+1,+2]`
fn format_charges(charges: &[i32]) -> String {
    let parts: Vec<String> = charges.iter().map(|&q| format_charge(q)).collect();
    format!("[{}]", parts.join(","))
}

fn format_coords(c: &[f64; 3]) -> String {
    format!("[{:.3},{:.3},{:.3}]", c[0], c[1], c[2])
}

/// 全部类别的汇总文本；空类别跳过
pub fn render_summary(entries: &IndexMap<String, DefectEntry>, host_elements: &[String]) -> String {
    let mut out = String::new();
    for category in [
        DefectCategory::Vacancies,
        DefectCategory::Substitutions,
        DefectCategory::Interstitials,
        DefectCategory::Others,
    ] {
        let rows = summary_rows(category, entries, host_elements);
        if rows.is_empty() {
            continue;
        }

        let mut builder = Builder::default();
        builder.push_record([
            category.title(),
            "Charge States".to_string(),
            "Unit Cell Coords".to_string(),
            "Site Multiplicity (Unit Cell)".to_string(),
        ]);
        for row in &rows {
            builder.push_record([
                row.name.clone(),
                format_charges(&row.charge_states),
                format_coords(&row.unit_cell_coords),
                row.multiplicity.to_string(),
            ]);
        }
        out.push_str(&builder.build().to_string());
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::assembler::assemble_entry;
    use crate::models::defect::name_with_charge;
    use crate::models::{Defect, Lattice, Site, Structure};

    fn entries() -> IndexMap<String, DefectEntry> {
        let h = 3.25;
        let structure = Structure::new(
            Lattice::from_vectors([[0.0, h, h], [h, 0.0, h], [h, h, 0.0]]),
            vec![
                Site::new("Cd", [0.0, 0.0, 0.0]),
                Site::new("Te", [0.25, 0.25, 0.25]),
            ],
        );
        let vacancy = |idx: usize, oxi: i32| Defect {
            kind: DefectKind::Vacancy,
            structure: structure.clone(),
            site: structure.sites[idx].clone(),
            site_index: Some(idx),
            multiplicity: 1,
            oxi_state: oxi,
        };
        let m = [[-2, 2, 2], [2, -2, 2], [2, 2, -2]];

        let mut map = IndexMap::new();
        // Te 空位先生成，但 Cd 在组成中先出现
        for (d, el) in [(vacancy(1, 2), "Te"), (vacancy(0, -2), "Cd")] {
            for q in d.charge_states() {
                let mut entry = assemble_entry(&d, &m, q).unwrap();
                entry.name = name_with_charge(&d.base_name(), q);
                assert!(entry.name.contains(el));
                map.insert(entry.name.clone(), entry);
            }
        }
        map
    }

    #[test]
    fn test_rows_follow_host_element_order() {
        let hosts = vec!["Cd".to_string(), "Te".to_string()];
        let rows = summary_rows(DefectCategory::Vacancies, &entries(), &hosts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "v_Cd_s0");
        assert_eq!(rows[0].charge_states, vec![-2, -1, 0, 1]);
        assert_eq!(rows[1].name, "v_Te_s1");
        assert!(summary_rows(DefectCategory::Interstitials, &entries(), &hosts).is_empty());
    }

    #[test]
    fn test_render_summary_headers() {
        let hosts = vec!["Cd".to_string(), "Te".to_string()];
        let text = render_summary(&entries(), &hosts);
        assert!(text.contains("Vacancies"));
        assert!(text.contains("Site Multiplicity (Unit Cell)"));
        assert!(text.contains("[-1,0,+1,+2]"));
        assert!(!text.contains("Interstitials"));
    }
}
