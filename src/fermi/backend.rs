//! # 费米能级求解后端
//!
//! `FermiBackend` 抽象了载流子积分、缺陷浓度与电中性求根三项能力：
//! - `doped`：整段 DOS 的矩形求和；Brent 法在 [−1, E_gap + 1] eV 内求根，必要时扩大区间
//! - `py-sc-fermi`（cargo feature `sc-fermi`）：带边截断的梯形积分；
//!   按每晶胞格点数 multiplicity / scaling 计算缺陷数；二分法覆盖整个 DOS 能量窗口
//!
//! 后端在求解器构造时由 `create_backend` 选定，之后不再切换。
//!
//! ## 依赖关系
//! - 被 `fermi/solver.rs` 使用
//! - 使用 `numerics.rs`, `fermi/dos.rs`, `fermi/thermo.rs`

use crate::error::{DefectError, Result};
use crate::fermi::dos::FermiDos;
#[cfg(feature = "sc-fermi")]
use crate::fermi::dos::{ScFermiDos, BOLTZMANN_EV};
use crate::fermi::thermo::{DefectThermodynamics, ThermoEntry};
use crate::numerics;
#[cfg(feature = "sc-fermi")]
use crate::utils::output;

use std::fmt;
use std::str::FromStr;

const ROOT_TOL: f64 = 1e-8;
const ROOT_MAX_ITER: usize = 500;
const DEFAULT_UNAVAILABLE_MESSAGE: &str =
    "py-sc-fermi is not installed, so only the doped backend is available.";

/// 后端种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Doped,
    ScFermi,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Doped => "doped",
            BackendKind::ScFermi => "py-sc-fermi",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DefectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "doped" => Ok(BackendKind::Doped),
            "py-sc-fermi" => Ok(BackendKind::ScFermi),
            _ => Err(DefectError::UnrecognisedBackend(s.to_string())),
        }
    }
}

/// 求解后端能力
pub trait FermiBackend: fmt::Debug + Send + Sync {
    fn kind(&self) -> BackendKind;

    /// (电子, 空穴) 浓度 (cm⁻³)；`fermi_level` 相对 VBM
    fn carriers(&self, fermi_level: f64, temperature: f64) -> (f64, f64);

    /// 单个电荷态的浓度 (cm⁻³)
    fn defect_concentration(&self, entry: &ThermoEntry, formation_energy: f64, temperature: f64) -> f64;

    /// 求 `total_charge(E_F) = 0` 的 E_F（相对 VBM）
    fn solve_neutrality(&self, total_charge: &dyn Fn(f64) -> f64) -> Result<f64>;

    #[cfg(feature = "sc-fermi")]
    fn sc_fermi_dos(&self) -> Option<&ScFermiDos> {
        None
    }

    fn multiplicity_scaling(&self) -> Option<usize> {
        None
    }
}

/// 保号压缩，便于跨越数十个数量级的电荷求根
fn compress(q: f64) -> f64 {
    q.signum() * q.abs().ln_1p()
}

/// 整段 DOS 矩形求和的后端
#[derive(Debug, Clone)]
pub struct DopedBackend {
    dos: FermiDos,
    vbm: f64,
    band_gap: f64,
}

impl DopedBackend {
    pub fn new(dos: FermiDos, vbm: f64, band_gap: f64) -> Self {
        Self { dos, vbm, band_gap }
    }
}

impl FermiBackend for DopedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Doped
    }

    fn carriers(&self, fermi_level: f64, temperature: f64) -> (f64, f64) {
        self.dos.e_h_concentrations(fermi_level + self.vbm, temperature)
    }

    fn defect_concentration(&self, entry: &ThermoEntry, formation_energy: f64, temperature: f64) -> f64 {
        entry.concentration(formation_energy, temperature)
    }

    fn solve_neutrality(&self, total_charge: &dyn Fn(f64) -> f64) -> Result<f64> {
        let f = |ef: f64| compress(total_charge(ef));
        let (mut lower, mut upper) = (-1.0, self.band_gap + 1.0);
        for _ in 0..10 {
            if f(lower) * f(upper) <= 0.0 {
                break;
            }
            lower -= 1.0;
            upper += 1.0;
        }
        numerics::brent(f, lower, upper, ROOT_TOL, ROOT_MAX_ITER)
    }
}

/// 带边截断梯形积分的后端
#[cfg(feature = "sc-fermi")]
#[derive(Debug, Clone)]
pub struct ScFermiBackend {
    dos: ScFermiDos,
    multiplicity_scaling: usize,
}

#[cfg(feature = "sc-fermi")]
impl ScFermiBackend {
    pub fn new(dos: ScFermiDos, multiplicity_scaling: usize) -> Self {
        Self {
            dos,
            multiplicity_scaling: multiplicity_scaling.max(1),
        }
    }

    /// 每晶胞的缺陷格点数
    fn nsites(&self, entry: &ThermoEntry) -> f64 {
        entry.multiplicity / self.multiplicity_scaling as f64
    }
}

#[cfg(feature = "sc-fermi")]
impl FermiBackend for ScFermiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ScFermi
    }

    fn carriers(&self, fermi_level: f64, temperature: f64) -> (f64, f64) {
        let (holes, electrons) = self.dos.carrier_concentrations(fermi_level, temperature);
        (electrons * self.dos.scale(), holes * self.dos.scale())
    }

    fn defect_concentration(&self, entry: &ThermoEntry, formation_energy: f64, temperature: f64) -> f64 {
        let exponent = (-formation_energy / (BOLTZMANN_EV * temperature)).min(700.0);
        self.nsites(entry) * entry.degeneracy * exponent.exp() * self.dos.scale()
    }

    fn solve_neutrality(&self, total_charge: &dyn Fn(f64) -> f64) -> Result<f64> {
        let lower = self.dos.edos.first().copied().unwrap_or(-1.0);
        let upper = self.dos.edos.last().copied().unwrap_or(self.dos.bandgap + 1.0);
        numerics::bisect(|ef| compress(total_charge(ef)), lower, upper, ROOT_TOL, ROOT_MAX_ITER)
    }

    fn sc_fermi_dos(&self) -> Option<&ScFermiDos> {
        Some(&self.dos)
    }

    fn multiplicity_scaling(&self) -> Option<usize> {
        Some(self.multiplicity_scaling)
    }
}

/// 确认 `py-sc-fermi` 后端可用；未编译 `sc-fermi` feature 时报依赖错误
pub fn activate_sc_fermi_backend(error_message: Option<&str>) -> Result<()> {
    if cfg!(feature = "sc-fermi") {
        Ok(())
    } else {
        Err(DefectError::BackendUnavailable {
            message: error_message.unwrap_or(DEFAULT_UNAVAILABLE_MESSAGE).to_string(),
        })
    }
}

/// 超胞体积 / DOS 晶胞体积，取整；非整数时警告
#[cfg(feature = "sc-fermi")]
pub fn multiplicity_scaling(thermo: &DefectThermodynamics, dos: &FermiDos) -> usize {
    let Some(first) = thermo.entries.first() else {
        return 1;
    };
    let (scaling, warning) = scaling_from_ratio(first.supercell_volume / dos.volume);
    if let Some(warning) = warning {
        output::print_warning(&warning);
    }
    scaling
}

/// 体积比取整，偏离整数超过 1e-2 时附带警告文本
#[cfg(feature = "sc-fermi")]
fn scaling_from_ratio(ratio: f64) -> (usize, Option<String>) {
    let warning = ((ratio - ratio.round()).abs() > 1e-2).then(|| {
        format!(
            "Detected non-integer volume scaling ({:.3}) between the defect supercell and the bulk \
             DOS cell; defect site counts will be rounded and may be inaccurate.",
            ratio
        )
    });
    ((ratio.round() as usize).max(1), warning)
}

/// 按种类创建后端
pub fn create_backend(kind: BackendKind, thermo: &DefectThermodynamics, dos: FermiDos) -> Result<Box<dyn FermiBackend>> {
    match kind {
        BackendKind::Doped => Ok(Box::new(DopedBackend::new(dos, thermo.vbm, thermo.band_gap))),
        BackendKind::ScFermi => {
            activate_sc_fermi_backend(None)?;
            create_sc_fermi_backend(thermo, dos)
        }
    }
}

#[cfg(feature = "sc-fermi")]
fn create_sc_fermi_backend(thermo: &DefectThermodynamics, dos: FermiDos) -> Result<Box<dyn FermiBackend>> {
    let scaling = multiplicity_scaling(thermo, &dos);
    let sc_dos = ScFermiDos::from_fermi_dos(&dos, Some(thermo.vbm), None, Some(thermo.band_gap));
    Ok(Box::new(ScFermiBackend::new(sc_dos, scaling)))
}

#[cfg(not(feature = "sc-fermi"))]
fn create_sc_fermi_backend(_thermo: &DefectThermodynamics, _dos: FermiDos) -> Result<Box<dyn FermiBackend>> {
    Err(DefectError::BackendUnavailable {
        message: DEFAULT_UNAVAILABLE_MESSAGE.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fermi::testing;

    #[test]
    fn test_backend_names() {
        assert_eq!("doped".parse::<BackendKind>().unwrap(), BackendKind::Doped);
        assert_eq!("py-sc-fermi".parse::<BackendKind>().unwrap(), BackendKind::ScFermi);
        let err = "invalid_backend".parse::<BackendKind>().unwrap_err();
        assert!(err.to_string().contains("Unrecognised `backend`"));
    }

    #[test]
    fn test_doped_neutrality_root() {
        let thermo = testing::cdte_thermo();
        let backend = DopedBackend::new(testing::parabolic_dos(), thermo.vbm, thermo.band_gap);
        // 仅载流子 + 施主：E_F 应位于带隙上半部
        let charge = |ef: f64| {
            let (e, h) = backend.carriers(ef, 300.0);
            1e15 + h - e
        };
        let ef = backend.solve_neutrality(&charge).unwrap();
        assert!(ef > 0.76 && ef < 1.52, "E_F = {}", ef);
        let (e, h) = backend.carriers(ef, 300.0);
        assert!(((1e15 + h - e) / 1e15).abs() < 1e-4);
    }

    #[cfg(feature = "sc-fermi")]
    #[test]
    fn test_sc_fermi_backend_matches_doped() {
        let thermo = testing::cdte_thermo();
        let dos = testing::parabolic_dos();
        assert_eq!(multiplicity_scaling(&thermo, &dos), 8);

        let doped = create_backend(BackendKind::Doped, &thermo, dos.clone()).unwrap();
        let sc = create_backend(BackendKind::ScFermi, &thermo, dos).unwrap();
        assert_eq!(sc.multiplicity_scaling(), Some(8));
        assert!(sc.sc_fermi_dos().is_some());
        assert!(doped.sc_fermi_dos().is_none());

        let entry = &thermo.entries[0];
        let a = doped.defect_concentration(entry, 1.2, 600.0);
        let b = sc.defect_concentration(entry, 1.2, 600.0);
        assert!(((a - b) / a).abs() < 1e-9);

        let charge_doped = |ef: f64| {
            let (e, h) = doped.carriers(ef, 500.0);
            1e16 + h - e
        };
        let charge_sc = |ef: f64| {
            let (e, h) = sc.carriers(ef, 500.0);
            1e16 + h - e
        };
        let ef_doped = doped.solve_neutrality(&charge_doped).unwrap();
        let ef_sc = sc.solve_neutrality(&charge_sc).unwrap();
        assert!((ef_doped - ef_sc).abs() < 0.05);
    }

    #[cfg(feature = "sc-fermi")]
    #[test]
    fn test_non_integer_volume_scaling_warns() {
        let (scaling, warning) = scaling_from_ratio(8.0);
        assert_eq!(scaling, 8);
        assert!(warning.is_none());

        let (scaling, warning) = scaling_from_ratio(7.6);
        assert_eq!(scaling, 8);
        assert!(warning.unwrap().contains("non-integer volume scaling (7.600)"));

        // 530 / 70 = 7.571：取整为 8 并警告
        let mut thermo = testing::cdte_thermo();
        for entry in &mut thermo.entries {
            entry.supercell_volume = 530.0;
        }
        assert_eq!(multiplicity_scaling(&thermo, &testing::parabolic_dos()), 8);
        assert_eq!(scaling_from_ratio(0.2).0, 1);
    }

    #[cfg(feature = "sc-fermi")]
    #[test]
    fn test_activation_succeeds_with_feature() {
        assert!(activate_sc_fermi_backend(None).is_ok());
    }

    #[cfg(not(feature = "sc-fermi"))]
    #[test]
    fn test_activation_fails_without_feature() {
        let err = activate_sc_fermi_backend(Some("custom message")).unwrap_err();
        assert_eq!(err.to_string(), "custom message");
        let err = activate_sc_fermi_backend(None).unwrap_err();
        assert!(err.to_string().contains("py-sc-fermi is not installed"));
    }
}
