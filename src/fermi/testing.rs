//! 测试用的 CdTe 类模型体系：抛物线能带 DOS + 三种本征缺陷

use crate::fermi::chempots::{ChempotMap, ChempotRecord};
use crate::fermi::dos::FermiDos;
use crate::fermi::thermo::{DefectThermodynamics, ThermoEntry};

use indexmap::IndexMap;

/// 抛物线能带：VBM 在索引 300 处，CBM 在 450 处，步长 0.01 eV
pub fn parabolic_dos() -> FermiDos {
    let n = 751;
    let energies: Vec<f64> = (0..n).map(|i| (i as f64 - 300.0) * 0.01).collect();
    let densities: Vec<f64> = (0..n)
        .map(|i| {
            if i <= 300 {
                10.0 * ((300 - i) as f64 * 0.01).sqrt()
            } else if i >= 450 {
                10.0 * ((i - 450) as f64 * 0.01).sqrt()
            } else {
                0.0
            }
        })
        .collect();
    FermiDos {
        energies,
        densities,
        efermi: 0.0,
        nelecs: 18.0,
        volume: 70.0,
        spin_polarised: false,
    }
}

fn chempot_map(cd: f64, te: f64) -> ChempotMap {
    [("Cd".to_string(), cd), ("Te".to_string(), te)]
        .into_iter()
        .collect()
}

pub fn cdte_chempots() -> ChempotRecord {
    let mut record = ChempotRecord::default();
    record.limits_wrt_el_refs.insert("Cd-CdTe".to_string(), chempot_map(0.0, -1.25));
    record.limits_wrt_el_refs.insert("CdTe-Te".to_string(), chempot_map(-1.25, 0.0));
    record.limits.insert("Cd-CdTe".to_string(), chempot_map(-1.01, -5.83));
    record.limits.insert("CdTe-Te".to_string(), chempot_map(-2.26, -4.58));
    record.elemental_refs = chempot_map(-1.01, -4.58);
    record
}

/// 在 E_F = VBM、μ = 单质参考时形成能为 `formation` 的条目
fn entry(defect_name: &str, charge: i32, formation: f64, element: &str, dn: i32, vbm: f64) -> ThermoEntry {
    let refs = chempot_map(-1.01, -4.58);
    let mut element_changes = IndexMap::new();
    element_changes.insert(element.to_string(), dn);
    ThermoEntry {
        name: crate::models::defect::name_with_charge(defect_name, charge),
        defect_name: defect_name.to_string(),
        charge_state: charge,
        energy_difference: formation + dn as f64 * refs[element] - charge as f64 * vbm,
        element_changes,
        multiplicity: 32.0,
        degeneracy: 1.0,
        supercell_volume: 560.0,
    }
}

pub fn cdte_thermo() -> DefectThermodynamics {
    let vbm = -0.01;
    let mut entries = Vec::new();
    for (q, ef) in [(0, 2.2), (-1, 2.4), (-2, 2.8)] {
        entries.push(entry("v_Cd_s0", q, ef, "Cd", -1, vbm));
    }
    for (q, ef) in [(0, 2.5), (1, 1.8), (2, 1.0)] {
        entries.push(entry("Cd_i_m1", q, ef, "Cd", 1, vbm));
    }
    for (q, ef) in [(0, 3.0), (1, 2.5), (2, 1.6)] {
        entries.push(entry("v_Te_s1", q, ef, "Te", -1, vbm));
    }

    DefectThermodynamics {
        vbm,
        band_gap: 1.52,
        entries,
        chempots: Some(cdte_chempots()),
        el_refs: None,
        bulk_dos: Some(parabolic_dos()),
    }
}
