//! # 缺陷热力学记录
//!
//! 费米能级求解的输入：带边、带隙、各缺陷电荷态的能量差与元素增减，
//! 可选地附带化学势与体相 DOS。以 JSON 持久化。
//!
//! ## 算法
//! - 形成能：E_f = ΔE − Σ Δn_i (μ_i + μ_i^ref) + q (E_VBM + E_F)
//! - 浓度 (cm⁻³)：N_sites / V · g · exp(−E_f / kT)
//!
//! ## 依赖关系
//! - 被 `fermi/backend.rs`, `fermi/solver.rs` 使用
//! - 使用 `fermi/chempots.rs`, `fermi/dos.rs`

use crate::error::Result;
use crate::fermi::chempots::{ChempotMap, ChempotRecord};
use crate::fermi::dos::{FermiDos, BOLTZMANN_EV};
use crate::parsers;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_degeneracy() -> f64 {
    1.0
}

/// 单个缺陷电荷态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermoEntry {
    /// 带电荷的名称，如 `v_Cd_s0_-2`
    pub name: String,
    /// 不带电荷的名称
    pub defect_name: String,
    pub charge_state: i32,
    /// E_defect − E_bulk（含修正）(eV)
    pub energy_difference: f64,
    /// 元素 -> 增加的原子数（移除为负）
    #[serde(default)]
    pub element_changes: IndexMap<String, i32>,
    /// 缺陷超胞中的等价格点数
    pub multiplicity: f64,
    #[serde(default = "default_degeneracy")]
    pub degeneracy: f64,
    /// 缺陷超胞体积 (Å³)
    pub supercell_volume: f64,
}

impl ThermoEntry {
    /// 形成能 (eV)；`fermi_level` 相对 VBM
    pub fn formation_energy(&self, chempots: &ChempotMap, el_refs: &ChempotMap, vbm: f64, fermi_level: f64) -> f64 {
        let mu_term: f64 = self
            .element_changes
            .iter()
            .map(|(el, &dn)| {
                let mu = chempots.get(el).copied().unwrap_or(0.0) + el_refs.get(el).copied().unwrap_or(0.0);
                dn as f64 * mu
            })
            .sum();
        self.energy_difference - mu_term + self.charge_state as f64 * (vbm + fermi_level)
    }

    /// ln(N_sites · g) − E_f / kT
    pub fn log_weight(&self, formation_energy: f64, temperature: f64) -> f64 {
        (self.multiplicity * self.degeneracy).ln() - formation_energy / (BOLTZMANN_EV * temperature)
    }

    /// 浓度 (cm⁻³)
    pub fn concentration(&self, formation_energy: f64, temperature: f64) -> f64 {
        let exponent = (-formation_energy / (BOLTZMANN_EV * temperature)).min(700.0);
        self.multiplicity / (self.supercell_volume * 1e-24) * self.degeneracy * exponent.exp()
    }
}

/// 缺陷热力学记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectThermodynamics {
    /// 体相 VBM 本征值 (eV)
    pub vbm: f64,
    pub band_gap: f64,
    pub entries: Vec<ThermoEntry>,
    #[serde(default)]
    pub chempots: Option<ChempotRecord>,
    #[serde(default)]
    pub el_refs: Option<ChempotMap>,
    #[serde(default)]
    pub bulk_dos: Option<FermiDos>,
}

impl DefectThermodynamics {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        parsers::read_json(path)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        parsers::write_json(path, self)
    }

    /// 去重后的缺陷名，保持出现顺序
    pub fn defect_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.defect_name) {
                names.push(entry.defect_name.clone());
            }
        }
        names
    }

    /// 缺陷名 -> 条目索引
    pub fn grouped_indices(&self) -> IndexMap<String, Vec<usize>> {
        let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            groups.entry(entry.defect_name.clone()).or_default().push(i);
        }
        groups
    }

    /// 单质参考：显式给出 > 记录附带 > 化学势记录中推出 > 空
    pub fn resolve_el_refs(&self, el_refs: Option<&ChempotMap>) -> ChempotMap {
        if let Some(refs) = el_refs {
            return refs.clone();
        }
        if let Some(refs) = &self.el_refs {
            return refs.clone();
        }
        self.chempots
            .as_ref()
            .map(ChempotRecord::el_refs)
            .unwrap_or_default()
    }

    pub fn formation_energy(&self, entry: &ThermoEntry, chempots: &ChempotMap, el_refs: &ChempotMap, fermi_level: f64) -> f64 {
        entry.formation_energy(chempots, el_refs, self.vbm, fermi_level)
    }
}
