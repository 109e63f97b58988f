//! # 化学势
//!
//! 化学势记录 `{limits, limits_wrt_el_refs, elemental_refs}`，以及扁平的 元素 -> μ 映射。
//! 求解器只读取，不修改。
//!
//! 极限名除精确匹配外还支持别名：`<El>-rich` 为 μ_El（相对单质参考）最大的极限，
//! `<El>-poor` 为最小的极限。
//!
//! ## 依赖关系
//! - 被 `fermi/solver.rs`, `fermi/scan.rs` 使用

use crate::error::{DefectError, Result};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 元素 -> μ (eV)
pub type ChempotMap = IndexMap<String, f64>;

/// 单一极限记录使用的名称
pub const USER_LIMIT_NAME: &str = "User Chemical Potentials";

/// 多极限化学势记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChempotRecord {
    /// 绝对化学势
    #[serde(default)]
    pub limits: IndexMap<String, ChempotMap>,
    /// 相对单质参考的化学势
    pub limits_wrt_el_refs: IndexMap<String, ChempotMap>,
    #[serde(default)]
    pub elemental_refs: ChempotMap,
}

impl ChempotRecord {
    /// 扁平映射（相对单质参考）视作单一极限
    pub fn from_flat(chempots: ChempotMap) -> Self {
        let mut limits_wrt_el_refs = IndexMap::new();
        limits_wrt_el_refs.insert(USER_LIMIT_NAME.to_string(), chempots.clone());
        let mut limits = IndexMap::new();
        limits.insert(USER_LIMIT_NAME.to_string(), chempots);
        ChempotRecord {
            limits,
            limits_wrt_el_refs,
            elemental_refs: ChempotMap::new(),
        }
    }

    pub fn limit_names(&self) -> Vec<String> {
        self.limits_wrt_el_refs.keys().cloned().collect()
    }

    pub fn n_limits(&self) -> usize {
        self.limits_wrt_el_refs.len()
    }

    /// 极限名或 `<El>-rich` / `<El>-poor` 别名 -> 实际极限名
    pub fn resolve_limit(&self, limit: &str) -> Result<String> {
        if self.limits_wrt_el_refs.contains_key(limit) {
            return Ok(limit.to_string());
        }

        let alias = limit
            .strip_suffix("-rich")
            .map(|el| (el, true))
            .or_else(|| limit.strip_suffix("-poor").map(|el| (el, false)));

        if let Some((element, rich)) = alias {
            let mut best: Option<(&String, f64)> = None;
            for (name, mus) in &self.limits_wrt_el_refs {
                let Some(&mu) = mus.get(element) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((_, b)) if rich => mu > b,
                    Some((_, b)) => mu < b,
                };
                if better {
                    best = Some((name, mu));
                }
            }
            if let Some((name, _)) = best {
                return Ok(name.clone());
            }
        }

        Err(DefectError::LimitNotFound {
            limit: limit.to_string(),
            available: self.limit_names(),
        })
    }

    /// 某极限的化学势（相对单质参考）
    pub fn limit(&self, limit: &str) -> Result<&ChempotMap> {
        let name = self.resolve_limit(limit)?;
        self.limits_wrt_el_refs
            .get(&name)
            .ok_or_else(|| DefectError::LimitNotFound {
                limit: limit.to_string(),
                available: self.limit_names(),
            })
    }

    /// 单质参考；缺失时由绝对值与相对值之差推出
    pub fn el_refs(&self) -> ChempotMap {
        if !self.elemental_refs.is_empty() {
            return self.elemental_refs.clone();
        }
        let mut refs = ChempotMap::new();
        for (name, rel) in &self.limits_wrt_el_refs {
            if let Some(abs) = self.limits.get(name) {
                for (el, mu) in rel {
                    if let Some(a) = abs.get(el) {
                        refs.entry(el.clone()).or_insert(a - mu);
                    }
                }
            }
        }
        refs
    }
}

/// 两组化学势之间的线性插值（含端点）
///
/// 元素取两端的并集；某端缺失的元素按 0（单质参考）处理，与形成能的约定一致。
pub fn interpolated_chempots(start: &ChempotMap, end: &ChempotMap, n_points: usize) -> Vec<ChempotMap> {
    if n_points == 0 {
        return Vec::new();
    }
    let elements: Vec<&String> = start
        .keys()
        .chain(end.keys().filter(|el| !start.contains_key(*el)))
        .collect();
    let value = |map: &ChempotMap, el: &str| map.get(el).copied().unwrap_or(0.0);

    (0..n_points)
        .map(|i| {
            elements
                .iter()
                .map(|&el| {
                    let (a, b) = (value(start, el), value(end, el));
                    let mu = if i == 0 {
                        a
                    } else if i == n_points - 1 {
                        b
                    } else {
                        a + (b - a) * (i as f64 / (n_points - 1) as f64)
                    };
                    (el.clone(), mu)
                })
                .collect()
        })
        .collect()
}

/// 以各极限为顶点的重心坐标网格（每条边 `n_points` 个点，含顶点）
pub fn barycentric_grid(vertices: &[ChempotMap], n_points: usize) -> Vec<ChempotMap> {
    if vertices.is_empty() {
        return Vec::new();
    }
    let divisions = n_points.max(2) - 1;
    let mut weights = Vec::new();
    compositions(vertices.len(), divisions, &mut Vec::new(), &mut weights);

    weights
        .into_iter()
        .map(|w| {
            let mut point = ChempotMap::new();
            for (vertex, &k) in vertices.iter().zip(&w) {
                let frac = k as f64 / divisions as f64;
                for (el, &mu) in vertex {
                    *point.entry(el.clone()).or_insert(0.0) += frac * mu;
                }
            }
            point
        })
        .collect()
}

/// 非负整数 k_1..k_parts，和为 total
fn compositions(parts: usize, total: usize, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if parts == 1 {
        let mut w = prefix.clone();
        w.push(total);
        out.push(w);
        return;
    }
    for k in (0..=total).rev() {
        prefix.push(k);
        compositions(parts - 1, total - k, prefix, out);
        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fermi::testing::cdte_chempots;

    #[test]
    fn test_limit_aliases() {
        let record = cdte_chempots();
        assert_eq!(record.resolve_limit("Cd-rich").unwrap(), "Cd-CdTe");
        assert_eq!(record.resolve_limit("Te-rich").unwrap(), "CdTe-Te");
        assert_eq!(record.resolve_limit("Cd-poor").unwrap(), "CdTe-Te");
        assert_eq!(record.limit("CdTe-Te").unwrap()["Te"], 0.0);
    }

    #[test]
    fn test_unknown_limit() {
        let err = cdte_chempots().resolve_limit("nonexistent_limit").unwrap_err();
        assert!(err.to_string().contains("Limit 'nonexistent_limit' not found"));
        assert!(cdte_chempots().resolve_limit("Zn-rich").is_err());
    }

    #[test]
    fn test_el_refs_derived_from_limits() {
        let mut record = cdte_chempots();
        record.elemental_refs.clear();
        let refs = record.el_refs();
        assert!((refs["Cd"] + 1.01).abs() < 1e-12);
        assert!((refs["Te"] + 4.58).abs() < 1e-12);
    }

    #[test]
    fn test_from_flat_is_single_limit() {
        let flat: ChempotMap = [("Cd".to_string(), -0.5)].into_iter().collect();
        let record = ChempotRecord::from_flat(flat);
        assert_eq!(record.n_limits(), 1);
        assert_eq!(record.limit(USER_LIMIT_NAME).unwrap()["Cd"], -0.5);
    }

    #[test]
    fn test_interpolation_includes_endpoints() {
        let record = cdte_chempots();
        let start = record.limit("Cd-CdTe").unwrap();
        let end = record.limit("CdTe-Te").unwrap();
        let points = interpolated_chempots(start, end, 3);
        assert_eq!(points.len(), 3);
        assert_eq!(&points[0], start);
        assert_eq!(&points[2], end);
        assert!((points[1]["Cd"] + 0.625).abs() < 1e-12);
        assert!((points[1]["Te"] + 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_covers_elements_of_both_ends() {
        let start: ChempotMap = [("Cd".to_string(), -1.0)].into_iter().collect();
        let end: ChempotMap = [("Cd".to_string(), 0.0), ("Zn".to_string(), -2.0)]
            .into_iter()
            .collect();
        let points = interpolated_chempots(&start, &end, 3);
        assert!(points.iter().all(|p| p.len() == 2));
        assert_eq!(points[0]["Zn"], 0.0);
        assert_eq!(points[1]["Zn"], -1.0);
        assert_eq!(points[2]["Zn"], -2.0);
        assert_eq!(points[1]["Cd"], -0.5);
        let single = interpolated_chempots(&start, &end, 1);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0]["Cd"], -1.0);
    }

    #[test]
    fn test_barycentric_grid_contains_vertices() {
        let record = cdte_chempots();
        let vertices: Vec<ChempotMap> = record.limits_wrt_el_refs.values().cloned().collect();
        let grid = barycentric_grid(&vertices, 5);
        assert_eq!(grid.len(), 5);
        for v in &vertices {
            assert!(grid.iter().any(|p| p == v));
        }

        let mut three = vertices.clone();
        three.push([("Cd".to_string(), -0.5), ("Te".to_string(), -0.5)].into_iter().collect());
        // C(4 + 2, 2)
        assert_eq!(barycentric_grid(&three, 5).len(), 15);
    }
}
