//! # 体相态密度
//!
//! - `FermiDos`：体相总态密度（自旋已求和），用于 `doped` 后端的载流子积分
//! - `ScFermiDos`：以 VBM 为零点的态密度，用于 `py-sc-fermi` 后端
//!
//! 两者的载流子积分方式不同：`FermiDos` 以带隙中点为界对整段 DOS 做矩形求和；
//! `ScFermiDos` 在带边处截断（空穴 E ≤ 0，电子 E ≥ E_gap）做梯形积分。
//!
//! ## 依赖关系
//! - 被 `fermi/backend.rs`, `fermi/solver.rs` 使用

use crate::error::{DefectError, Result};

use serde::{Deserialize, Serialize};

/// 玻尔兹曼常数 (eV/K)
pub const BOLTZMANN_EV: f64 = 8.617333262e-5;

/// Fermi-Dirac 占据
pub fn fermi_dirac(energy: f64, fermi_level: f64, temperature: f64) -> f64 {
    let x = (energy - fermi_level) / (BOLTZMANN_EV * temperature);
    if x > 700.0 {
        0.0
    } else {
        1.0 / (1.0 + x.exp())
    }
}

/// 体相总态密度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FermiDos {
    /// 能量 (eV)，升序
    pub energies: Vec<f64>,
    /// 总态密度 (states/eV/cell)
    pub densities: Vec<f64>,
    /// 费米能 (eV)
    pub efermi: f64,
    /// 价电子数
    pub nelecs: f64,
    /// 晶胞体积 (Å³)
    pub volume: f64,
    #[serde(default)]
    pub spin_polarised: bool,
}

impl FermiDos {
    pub fn new(
        energies: Vec<f64>,
        densities: Vec<f64>,
        efermi: f64,
        nelecs: f64,
        volume: f64,
        spin_polarised: bool,
    ) -> Result<Self> {
        let dos = FermiDos {
            energies,
            densities,
            efermi,
            nelecs,
            volume,
            spin_polarised,
        };
        dos.validate()?;
        Ok(dos)
    }

    /// 自旋分辨的态密度求和后构造
    pub fn from_spin_densities(
        energies: Vec<f64>,
        up: &[f64],
        down: &[f64],
        efermi: f64,
        nelecs: f64,
        volume: f64,
    ) -> Result<Self> {
        if up.len() != down.len() {
            return Err(DefectError::InvalidArgument(
                "Spin-up and spin-down densities have different lengths".to_string(),
            ));
        }
        let densities = up.iter().zip(down).map(|(u, d)| u + d).collect();
        Self::new(energies, densities, efermi, nelecs, volume, true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.energies.len() < 2 || self.energies.len() != self.densities.len() {
            return Err(DefectError::InvalidArgument(format!(
                "DOS needs at least two points and matching lengths (energies: {}, densities: {})",
                self.energies.len(),
                self.densities.len()
            )));
        }
        if self.energies.windows(2).any(|w| w[1] <= w[0]) {
            return Err(DefectError::InvalidArgument(
                "DOS energies must be strictly increasing".to_string(),
            ));
        }
        if self.volume <= 0.0 {
            return Err(DefectError::InvalidArgument(format!(
                "DOS cell volume must be positive, got {}",
                self.volume
            )));
        }
        Ok(())
    }

    /// (CBM, VBM)：从费米能处向两侧寻找态密度不超过 `tol` 的区间
    pub fn get_cbm_vbm(&self, tol: f64) -> (f64, f64) {
        let n = self.energies.len();
        let i_fermi = self
            .energies
            .iter()
            .position(|&e| e > self.efermi)
            .unwrap_or(n - 1);

        let mut i_gap_start = i_fermi;
        while i_gap_start > 0 && self.densities[i_gap_start - 1] <= tol {
            i_gap_start -= 1;
        }
        let mut i_gap_end = i_gap_start;
        while i_gap_end < n && self.densities[i_gap_end] <= tol {
            i_gap_end += 1;
        }

        let vbm = self.energies[i_gap_start.saturating_sub(1)];
        let cbm = self.energies[i_gap_end.min(n - 1)];
        (cbm, vbm)
    }

    pub fn get_gap(&self, tol: f64) -> f64 {
        let (cbm, vbm) = self.get_cbm_vbm(tol);
        (cbm - vbm).max(0.0)
    }

    fn nearest_index(&self, energy: f64) -> usize {
        self.energies
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - energy).abs().total_cmp(&(b.1 - energy).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// 带隙中点的索引
    pub fn idx_mid_gap(&self) -> usize {
        let (cbm, vbm) = self.get_cbm_vbm(1e-4);
        let idx_vbm = self.nearest_index(vbm);
        let idx_cbm = self.nearest_index(cbm);
        idx_vbm + (idx_cbm.saturating_sub(idx_vbm)) / 2
    }

    /// 能量步长（前向差分，末点为 0）
    fn de(&self, i: usize) -> f64 {
        if i + 1 < self.energies.len() {
            self.energies[i + 1] - self.energies[i]
        } else {
            0.0
        }
    }

    /// (电子, 空穴) 浓度 (cm⁻³)；`fermi_level` 为绝对本征值能量
    pub fn e_h_concentrations(&self, fermi_level: f64, temperature: f64) -> (f64, f64) {
        let mid = self.idx_mid_gap();
        let to_cm3 = 1.0 / (self.volume * 1e-24);

        let electrons: f64 = (mid..self.energies.len())
            .map(|i| self.densities[i] * fermi_dirac(self.energies[i], fermi_level, temperature) * self.de(i))
            .sum();
        let holes: f64 = (0..=mid.min(self.energies.len() - 1))
            .map(|i| self.densities[i] * fermi_dirac(-self.energies[i], -fermi_level, temperature) * self.de(i))
            .sum();

        (electrons * to_cm3, holes * to_cm3)
    }
}

/// 以 VBM 为零点的态密度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScFermiDos {
    /// 能量 (eV, 相对 VBM)
    pub edos: Vec<f64>,
    pub dos: Vec<f64>,
    pub bandgap: f64,
    pub nelect: f64,
    pub spin_polarised: bool,
    /// 晶胞体积 (Å³)
    pub volume: f64,
}

impl ScFermiDos {
    /// 由 `FermiDos` 构造；未给出的 VBM / 电子数 / 带隙取自 DOS 本身
    pub fn from_fermi_dos(
        fdos: &FermiDos,
        vbm: Option<f64>,
        nelect: Option<f64>,
        bandgap: Option<f64>,
    ) -> Self {
        let (cbm, dos_vbm) = fdos.get_cbm_vbm(1e-4);
        let vbm = vbm.unwrap_or(dos_vbm);
        ScFermiDos {
            edos: fdos.energies.iter().map(|e| e - vbm).collect(),
            dos: fdos.densities.clone(),
            bandgap: bandgap.unwrap_or(cbm - dos_vbm),
            nelect: nelect.unwrap_or(fdos.nelecs),
            spin_polarised: fdos.spin_polarised,
            volume: fdos.volume,
        }
    }

    /// 最后一个 E ≤ 0 的索引
    fn p0_index(&self) -> usize {
        self.edos.iter().rposition(|&e| e <= 0.0).unwrap_or(0)
    }

    /// 第一个 E ≥ E_gap 的索引
    fn n0_index(&self) -> usize {
        self.edos
            .iter()
            .position(|&e| e >= self.bandgap)
            .unwrap_or(self.edos.len() - 1)
    }

    /// 每个晶胞的 (空穴, 电子) 数；`e_fermi` 相对 VBM
    pub fn carrier_concentrations(&self, e_fermi: f64, temperature: f64) -> (f64, f64) {
        let p0 = self.p0_index();
        let n0 = self.n0_index();

        let holes = trapezoid(
            &self.edos[..=p0],
            &self.dos[..=p0]
                .iter()
                .zip(&self.edos[..=p0])
                .map(|(d, &e)| d * fermi_dirac(e_fermi, e, temperature))
                .collect::<Vec<_>>(),
        );
        let electrons = trapezoid(
            &self.edos[n0..],
            &self.dos[n0..]
                .iter()
                .zip(&self.edos[n0..])
                .map(|(d, &e)| d * fermi_dirac(e, e_fermi, temperature))
                .collect::<Vec<_>>(),
        );
        (holes, electrons)
    }

    /// 每晶胞数 -> cm⁻³
    pub fn scale(&self) -> f64 {
        1e24 / self.volume
    }
}

fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| 0.5 * (xs[1] - xs[0]) * (ys[0] + ys[1]))
        .sum()
}
