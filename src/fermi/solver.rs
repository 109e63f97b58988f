//! # 费米能级求解器
//!
//! 给定化学势与温度，求满足电中性 Σ q·c_q + dopant + p − n = 0 的费米能级，
//! 并输出各缺陷浓度与载流子浓度。
//!
//! ## 功能
//! - 热平衡求解：单一温度下全部缺陷与载流子同时平衡
//! - 准平衡求解：高温退火下平衡，缺陷总量冻结后在淬火温度下重新求电中性
//!
//! ## 依赖关系
//! - 被 `fermi/scan.rs`, `commands/fermi.rs` 使用
//! - 使用 `fermi/backend.rs`, `fermi/thermo.rs`, `fermi/table.rs`

use crate::error::{DefectError, Result};
use crate::fermi::backend::{create_backend, BackendKind, FermiBackend};
use crate::fermi::chempots::{ChempotMap, ChempotRecord};
#[cfg(feature = "sc-fermi")]
use crate::fermi::dos::ScFermiDos;
use crate::fermi::dos::FermiDos;
use crate::fermi::table::{self, ConcentrationTable};
use crate::fermi::thermo::DefectThermodynamics;
use crate::utils::output;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// DOS 与记录 VBM 的允许偏差 (eV)
const VBM_TOLERANCE: f64 = 0.05;

/// 求解器选项
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// `"doped"` 或 `"py-sc-fermi"`
    pub backend: String,
    /// 覆盖记录中附带的体相 DOS
    pub bulk_dos: Option<FermiDos>,
    pub skip_vbm_check: bool,
    /// 扫描的并行作业数；0 表示全部 CPU
    pub jobs: usize,
    /// 扫描时显示进度条
    pub show_progress: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::Doped.as_str().to_string(),
            bulk_dos: None,
            skip_vbm_check: false,
            jobs: 0,
            show_progress: true,
        }
    }
}

/// 准平衡求解中冻结/放开的缺陷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrozenDefects {
    /// 缺陷名 -> 总浓度，或 `name_q` -> 单一电荷态浓度 (cm⁻³)
    #[serde(default)]
    pub fixed_defects: IndexMap<String, f64>,
    /// 在淬火温度下重新平衡的缺陷名
    #[serde(default)]
    pub free_defects: Vec<String>,
    /// 冻结各电荷态浓度而非总浓度
    #[serde(default)]
    pub fix_charge_states: bool,
}

/// 求解条件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conditions {
    Equilibrium {
        temperature: f64,
    },
    PseudoEquilibrium {
        annealing_temperature: f64,
        quenched_temperature: f64,
    },
}

/// 费米能级（相对 VBM）与载流子浓度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FermiSolution {
    pub fermi_level: f64,
    pub electrons: f64,
    pub holes: f64,
}

/// DOS 与缺陷记录的 VBM 相差超过容差时的警告文本
fn vbm_mismatch_warning(dos: &FermiDos, vbm: f64, skip: bool) -> Option<String> {
    if skip {
        return None;
    }
    let (_, dos_vbm) = dos.get_cbm_vbm(1e-4);
    ((dos_vbm - vbm).abs() > VBM_TOLERANCE).then(|| {
        format!(
            "The VBM eigenvalue of the bulk DOS calculation ({:.3} eV) differs from that of \
             the defect thermodynamics record ({:.3} eV) by more than {} eV; the DOS and \
             defect calculations may use different settings.",
            dos_vbm, vbm, VBM_TOLERANCE
        )
    })
}

/// 费米能级求解器
#[derive(Debug)]
pub struct FermiSolver {
    thermo: DefectThermodynamics,
    backend: Box<dyn FermiBackend>,
    pub(crate) jobs: usize,
    pub(crate) show_progress: bool,
}

impl FermiSolver {
    pub fn new(thermo: DefectThermodynamics, options: SolverOptions) -> Result<Self> {
        let dos = options
            .bulk_dos
            .or_else(|| thermo.bulk_dos.clone())
            .ok_or(DefectError::MissingDos)?;
        dos.validate()?;
        let kind: BackendKind = options.backend.parse()?;

        if let Some(warning) = vbm_mismatch_warning(&dos, thermo.vbm, options.skip_vbm_check) {
            output::print_warning(&warning);
        }

        let backend = create_backend(kind, &thermo, dos)?;
        let jobs = if options.jobs == 0 { num_cpus::get() } else { options.jobs };
        Ok(Self {
            thermo,
            backend,
            jobs,
            show_progress: options.show_progress,
        })
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn thermodynamics(&self) -> &DefectThermodynamics {
        &self.thermo
    }

    /// 仅特定后端可用的功能在此检查
    pub fn check_required_backend(&self, required: BackendKind) -> Result<()> {
        let current = self.backend.kind();
        let has_state = match required {
            BackendKind::Doped => true,
            BackendKind::ScFermi => self.backend.multiplicity_scaling().is_some(),
        };
        if current != required || !has_state {
            return Err(DefectError::BackendUnsupported {
                required: required.to_string(),
                current: current.to_string(),
            });
        }
        Ok(())
    }

    #[cfg(feature = "sc-fermi")]
    pub fn sc_fermi_dos(&self) -> Result<&ScFermiDos> {
        self.check_required_backend(BackendKind::ScFermi)?;
        self.backend.sc_fermi_dos().ok_or(DefectError::BackendUnsupported {
            required: BackendKind::ScFermi.to_string(),
            current: self.backend.kind().to_string(),
        })
    }

    pub fn multiplicity_scaling(&self) -> Result<usize> {
        self.check_required_backend(BackendKind::ScFermi)?;
        self.backend.multiplicity_scaling().ok_or(DefectError::BackendUnsupported {
            required: BackendKind::ScFermi.to_string(),
            current: self.backend.kind().to_string(),
        })
    }

    /// 记录附带的化学势
    pub fn chempot_record(&self) -> Result<&ChempotRecord> {
        self.thermo.chempots.as_ref().ok_or_else(|| {
            DefectError::MissingChempots(
                "pass chemical potentials explicitly or attach them to the record".to_string(),
            )
        })
    }

    /// 某一极限（或别名）的化学势与单质参考；未指定极限时取第一个
    pub fn single_chempot_dict(&self, limit: Option<&str>) -> Result<(ChempotMap, ChempotMap)> {
        let record = self.chempot_record()?;
        let mus = match limit {
            Some(limit) => record.limit(limit)?.clone(),
            None => record
                .limits_wrt_el_refs
                .values()
                .next()
                .cloned()
                .ok_or_else(|| DefectError::MissingChempots("the chemical potential record has no limits".to_string()))?,
        };
        Ok((mus, self.thermo.resolve_el_refs(None)))
    }

    /// 全部条目在给定 E_F、温度下的平衡浓度
    fn equilibrium_concentrations(&self, chempots: &ChempotMap, el_refs: &ChempotMap, fermi_level: f64, temperature: f64) -> Vec<f64> {
        self.thermo
            .entries
            .iter()
            .map(|entry| {
                let ef = self.thermo.formation_energy(entry, chempots, el_refs, fermi_level);
                self.backend.defect_concentration(entry, ef, temperature)
            })
            .collect()
    }

    /// Σ q·c + dopant + p − n
    fn net_charge(&self, concentrations: &[f64], fermi_level: f64, temperature: f64, dopant: f64) -> f64 {
        let (electrons, holes) = self.backend.carriers(fermi_level, temperature);
        let defects: f64 = self
            .thermo
            .entries
            .iter()
            .zip(concentrations)
            .map(|(entry, c)| entry.charge_state as f64 * c)
            .sum();
        defects + dopant + holes - electrons
    }

    fn solution_at(&self, fermi_level: f64, temperature: f64) -> FermiSolution {
        let (electrons, holes) = self.backend.carriers(fermi_level, temperature);
        FermiSolution {
            fermi_level,
            electrons,
            holes,
        }
    }

    /// 热平衡费米能级与载流子浓度
    pub fn fermi_level_and_carriers(
        &self,
        chempots: &ChempotMap,
        el_refs: Option<&ChempotMap>,
        temperature: f64,
        dopant: Option<f64>,
    ) -> Result<FermiSolution> {
        let el_refs = self.thermo.resolve_el_refs(el_refs);
        let dopant = dopant.unwrap_or(0.0);
        let charge = |ef: f64| {
            let concs = self.equilibrium_concentrations(chempots, &el_refs, ef, temperature);
            self.net_charge(&concs, ef, temperature, dopant)
        };
        let fermi_level = self.backend.solve_neutrality(&charge)?;
        Ok(self.solution_at(fermi_level, temperature))
    }

    /// 热平衡求解
    pub fn equilibrium_solve(
        &self,
        chempots: &ChempotMap,
        el_refs: Option<&ChempotMap>,
        temperature: f64,
        dopant: Option<f64>,
        append_chempots: bool,
    ) -> Result<ConcentrationTable> {
        let solution = self.fermi_level_and_carriers(chempots, el_refs, temperature, dopant)?;
        let refs = self.thermo.resolve_el_refs(el_refs);
        let concs = self.equilibrium_concentrations(chempots, &refs, solution.fermi_level, temperature);
        self.build_table(
            &concs,
            &solution,
            &[(table::TEMPERATURE, temperature)],
            dopant,
            append_chempots.then_some(chempots),
        )
    }

    /// 准平衡求解：退火温度下平衡，冻结后在淬火温度下求电中性
    #[allow(clippy::too_many_arguments)]
    pub fn pseudo_equilibrium_solve(
        &self,
        chempots: &ChempotMap,
        el_refs: Option<&ChempotMap>,
        annealing_temperature: f64,
        quenched_temperature: f64,
        frozen: &FrozenDefects,
        dopant: Option<f64>,
        append_chempots: bool,
    ) -> Result<ConcentrationTable> {
        let refs = self.thermo.resolve_el_refs(el_refs);
        let annealed = self.fermi_level_and_carriers(chempots, Some(&refs), annealing_temperature, dopant)?;
        let annealed_concs =
            self.equilibrium_concentrations(chempots, &refs, annealed.fermi_level, annealing_temperature);

        let plan = self.freeze(&annealed_concs, frozen);
        let dopant_value = dopant.unwrap_or(0.0);
        let charge = |ef: f64| {
            let concs = self.quenched_concentrations(&plan, chempots, &refs, ef, quenched_temperature);
            self.net_charge(&concs, ef, quenched_temperature, dopant_value)
        };
        let fermi_level = self.backend.solve_neutrality(&charge)?;

        let solution = self.solution_at(fermi_level, quenched_temperature);
        let concs = self.quenched_concentrations(&plan, chempots, &refs, fermi_level, quenched_temperature);
        self.build_table(
            &concs,
            &solution,
            &[
                (table::ANNEALING_TEMPERATURE, annealing_temperature),
                (table::QUENCHED_TEMPERATURE, quenched_temperature),
            ],
            dopant,
            append_chempots.then_some(chempots),
        )
    }

    /// 按条件求解
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &self,
        conditions: Conditions,
        chempots: &ChempotMap,
        el_refs: Option<&ChempotMap>,
        frozen: &FrozenDefects,
        dopant: Option<f64>,
        append_chempots: bool,
    ) -> Result<ConcentrationTable> {
        match conditions {
            Conditions::Equilibrium { temperature } => {
                self.equilibrium_solve(chempots, el_refs, temperature, dopant, append_chempots)
            }
            Conditions::PseudoEquilibrium {
                annealing_temperature,
                quenched_temperature,
            } => self.pseudo_equilibrium_solve(
                chempots,
                el_refs,
                annealing_temperature,
                quenched_temperature,
                frozen,
                dopant,
                append_chempots,
            ),
        }
    }

    /// 退火浓度 -> 冻结方案
    fn freeze(&self, annealed: &[f64], frozen: &FrozenDefects) -> FreezePlan {
        let groups = self.thermo.grouped_indices();
        let mut totals: IndexMap<String, f64> = groups
            .iter()
            .map(|(name, idxs)| (name.clone(), idxs.iter().map(|&i| annealed[i]).sum()))
            .collect();
        let mut per_state = annealed.to_vec();
        let mut fixed_states: HashMap<usize, f64> = HashMap::new();

        for (key, &value) in &frozen.fixed_defects {
            if let Some(idxs) = groups.get(key) {
                // 按退火时的电荷态分布缩放；无分布时平均分配
                let old = totals.get(key).copied().unwrap_or(0.0);
                for &i in idxs {
                    per_state[i] = if old > 0.0 {
                        annealed[i] * value / old
                    } else {
                        value / idxs.len() as f64
                    };
                }
                totals.insert(key.clone(), value);
            } else if let Some(i) = self.thermo.entries.iter().position(|e| &e.name == key) {
                fixed_states.insert(i, value);
                per_state[i] = value;
            } else {
                output::print_warning(&format!(
                    "Fixed defect '{}' does not match any defect or charge state and will be ignored",
                    key
                ));
            }
        }

        FreezePlan {
            groups,
            totals,
            per_state,
            fixed_states,
            free: frozen.free_defects.clone(),
            fix_charge_states: frozen.fix_charge_states,
        }
    }

    /// 淬火温度下各条目浓度
    fn quenched_concentrations(
        &self,
        plan: &FreezePlan,
        chempots: &ChempotMap,
        el_refs: &ChempotMap,
        fermi_level: f64,
        temperature: f64,
    ) -> Vec<f64> {
        let entries = &self.thermo.entries;
        let mut concs = vec![0.0; entries.len()];

        for (name, idxs) in &plan.groups {
            if plan.free.contains(name) {
                for &i in idxs {
                    let ef = self.thermo.formation_energy(&entries[i], chempots, el_refs, fermi_level);
                    concs[i] = self.backend.defect_concentration(&entries[i], ef, temperature);
                }
                continue;
            }
            if plan.fix_charge_states {
                for &i in idxs {
                    concs[i] = plan.per_state[i];
                }
                continue;
            }

            // 总量固定，电荷态按淬火温度下的玻尔兹曼权重重新分配
            let fixed_sum: f64 = idxs.iter().filter_map(|i| plan.fixed_states.get(i)).sum();
            let remaining = (plan.totals.get(name).copied().unwrap_or(0.0) - fixed_sum).max(0.0);
            let open: Vec<usize> = idxs
                .iter()
                .copied()
                .filter(|i| !plan.fixed_states.contains_key(i))
                .collect();
            let log_weights: Vec<f64> = open
                .iter()
                .map(|&i| {
                    let ef = self.thermo.formation_energy(&entries[i], chempots, el_refs, fermi_level);
                    entries[i].log_weight(ef, temperature)
                })
                .collect();
            let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let norm: f64 = log_weights.iter().map(|w| (w - max).exp()).sum();

            for (&i, w) in open.iter().zip(&log_weights) {
                concs[i] = remaining * (w - max).exp() / norm;
            }
            for &i in idxs {
                if let Some(&v) = plan.fixed_states.get(&i) {
                    concs[i] = v;
                }
            }
        }
        concs
    }

    /// 按缺陷名汇总为结果表
    fn build_table(
        &self,
        concentrations: &[f64],
        solution: &FermiSolution,
        temperatures: &[(&str, f64)],
        dopant: Option<f64>,
        chempots: Option<&ChempotMap>,
    ) -> Result<ConcentrationTable> {
        let mut columns = vec![
            table::CONCENTRATION.to_string(),
            table::FERMI_LEVEL.to_string(),
            table::ELECTRONS.to_string(),
            table::HOLES.to_string(),
        ];
        columns.extend(temperatures.iter().map(|(c, _)| c.to_string()));
        if dopant.is_some() {
            columns.push(table::DOPANT.to_string());
        }
        if let Some(mus) = chempots {
            columns.extend(mus.keys().map(|el| table::chempot_column(el)));
        }

        let mut out = ConcentrationTable::new(columns);
        for (name, idxs) in self.thermo.grouped_indices() {
            let total: f64 = idxs.iter().map(|&i| concentrations[i]).sum();
            let mut row = vec![total, solution.fermi_level, solution.electrons, solution.holes];
            row.extend(temperatures.iter().map(|(_, t)| *t));
            if let Some(d) = dopant {
                row.push(d);
            }
            if let Some(mus) = chempots {
                row.extend(mus.values().copied());
            }
            out.push_row(name, row)?;
        }
        Ok(out)
    }
}

/// 准平衡冻结方案
#[derive(Debug)]
struct FreezePlan {
    groups: IndexMap<String, Vec<usize>>,
    totals: IndexMap<String, f64>,
    per_state: Vec<f64>,
    fixed_states: HashMap<usize, f64>,
    free: Vec<String>,
    fix_charge_states: bool,
}
