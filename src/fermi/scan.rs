//! # 参数扫描
//!
//! 在温度、掺杂浓度、化学势（两点插值或多极限网格）上重复求解，
//! 以及在化学势空间内寻找目标量的极值。
//!
//! ## 功能
//! - 各扫描点相互独立，用 rayon 线程池并行求解，结果按输入顺序拼接
//! - `min_max_x`：在重心网格上取最优点，围绕该点收缩单纯形，直到相对变化小于容差
//!
//! ## 依赖关系
//! - 被 `commands/fermi.rs` 使用
//! - 使用 `fermi/solver.rs`, `fermi/chempots.rs`, `utils/progress.rs`

use crate::error::{DefectError, Result};
use crate::fermi::chempots::{barycentric_grid, interpolated_chempots, ChempotMap, ChempotRecord};
use crate::fermi::solver::{Conditions, FermiSolver, FrozenDefects};
use crate::fermi::table::ConcentrationTable;
use crate::utils::progress;

use indicatif::ProgressBar;
use rayon::prelude::*;

/// `min_max_x` 最大迭代次数
const MAX_REFINEMENTS: usize = 20;

/// 化学势插值的输入
#[derive(Debug, Clone)]
pub enum ChempotInput {
    /// 起点与终点
    Explicit(Vec<ChempotMap>),
    /// 记录中的两个极限名（记录缺省时用求解器附带的）
    Limits {
        record: Option<ChempotRecord>,
        limits: Vec<String>,
    },
}

/// 极值方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMax {
    Min,
    Max,
}

impl MinMax {
    fn better(self, candidate: f64, current: f64) -> bool {
        match self {
            MinMax::Min => candidate < current,
            MinMax::Max => candidate > current,
        }
    }
}

impl FermiSolver {
    fn scan_progress_bar(&self, len: usize, message: &str) -> ProgressBar {
        if self.show_progress {
            progress::create_progress_bar(len as u64, message)
        } else {
            ProgressBar::hidden()
        }
    }

    /// 在线程池中并行求解，结果保持输入顺序
    fn run_points<T, F>(&self, points: &[T], message: &str, solve: F) -> Result<Vec<ConcentrationTable>>
    where
        T: Sync,
        F: Fn(&T) -> Result<ConcentrationTable> + Sync + Send,
    {
        let pb = self.scan_progress_bar(points.len(), message);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| DefectError::Other(format!("Failed to build thread pool: {}", e)))?;

        let results: Result<Vec<ConcentrationTable>> = pool.install(|| {
            points
                .par_iter()
                .map(|point| {
                    let table = solve(point);
                    pb.inc(1);
                    table
                })
                .collect()
        });
        pb.finish_and_clear();
        results
    }

    /// 温度扫描：`temperature_range` 为热平衡，`annealing_temperature_range` ×
    /// `quenched_temperature_range` 为准平衡（淬火温度缺省 300 K）
    #[allow(clippy::too_many_arguments)]
    pub fn scan_temperature(
        &self,
        temperature_range: Option<&[f64]>,
        annealing_temperature_range: Option<&[f64]>,
        quenched_temperature_range: Option<&[f64]>,
        chempots: &ChempotMap,
        el_refs: Option<&ChempotMap>,
        frozen: &FrozenDefects,
        dopant: Option<f64>,
    ) -> Result<ConcentrationTable> {
        let conditions: Vec<Conditions> = match (temperature_range, annealing_temperature_range) {
            (Some(_), Some(_)) => return Err(DefectError::ConflictingTemperatureRanges),
            (None, None) => {
                return Err(DefectError::InvalidArgument(
                    "Either `temperature_range` or `annealing_temperature_range` must be set".to_string(),
                ))
            }
            (Some(temperatures), None) => temperatures
                .iter()
                .map(|&temperature| Conditions::Equilibrium { temperature })
                .collect(),
            (None, Some(annealing)) => {
                let quenched = quenched_temperature_range.unwrap_or(&[300.0]);
                annealing
                    .iter()
                    .flat_map(|&annealing_temperature| {
                        quenched.iter().map(move |&quenched_temperature| Conditions::PseudoEquilibrium {
                            annealing_temperature,
                            quenched_temperature,
                        })
                    })
                    .collect()
            }
        };

        let tables = self.run_points(&conditions, "Scanning temperatures", |&c| {
            self.solve(c, chempots, el_refs, frozen, dopant, false)
        })?;
        ConcentrationTable::concat(tables)
    }

    /// 掺杂浓度扫描
    pub fn scan_dopant_concentration(
        &self,
        dopant_range: &[f64],
        chempots: &ChempotMap,
        el_refs: Option<&ChempotMap>,
        conditions: Conditions,
        frozen: &FrozenDefects,
    ) -> Result<ConcentrationTable> {
        let tables = self.run_points(dopant_range, "Scanning dopant concentrations", |&d| {
            self.solve(conditions, chempots, el_refs, frozen, Some(d), false)
        })?;
        ConcentrationTable::concat(tables)
    }

    /// 两组化学势之间的插值扫描（含端点）
    pub fn interpolate_chempots(
        &self,
        n_points: usize,
        input: &ChempotInput,
        el_refs: Option<&ChempotMap>,
        conditions: Conditions,
        frozen: &FrozenDefects,
        dopant: Option<f64>,
    ) -> Result<ConcentrationTable> {
        let (start, end, refs) = match input {
            ChempotInput::Explicit(maps) => {
                if maps.len() != 2 {
                    return Err(DefectError::InvalidChempotCount { found: maps.len() });
                }
                (maps[0].clone(), maps[1].clone(), self.thermodynamics().resolve_el_refs(el_refs))
            }
            ChempotInput::Limits { record, limits } => {
                if limits.len() != 2 {
                    return Err(DefectError::InvalidArgument(format!(
                        "`limits` must contain exactly two limit names (start and end points), but got {}",
                        limits.len()
                    )));
                }
                let record = match record {
                    Some(r) => r,
                    None => self.chempot_record().map_err(|_| {
                        DefectError::MissingChempots(format!(
                            "limits {:?} were requested but no chemical potential record is available",
                            limits
                        ))
                    })?,
                };
                let refs = match el_refs {
                    Some(r) => r.clone(),
                    None if !record.el_refs().is_empty() => record.el_refs(),
                    None => self.thermodynamics().resolve_el_refs(None),
                };
                (record.limit(&limits[0])?.clone(), record.limit(&limits[1])?.clone(), refs)
            }
        };

        let points = interpolated_chempots(&start, &end, n_points);
        let tables = self.run_points(&points, "Interpolating chemical potentials", |mus| {
            self.solve(conditions, mus, Some(&refs), frozen, dopant, true)
        })?;
        ConcentrationTable::concat(tables)
    }

    /// 网格扫描所用的化学势记录：需至少两个极限
    pub fn parse_grid_chempots(&self, chempots: Option<&ChempotRecord>) -> Result<ChempotRecord> {
        let record = match chempots {
            Some(r) => r.clone(),
            None => self
                .chempot_record()
                .map_err(|_| DefectError::SingleChempotLimit)?
                .clone(),
        };
        if record.n_limits() < 2 {
            return Err(DefectError::SingleChempotLimit);
        }
        Ok(record)
    }

    /// 以全部极限为顶点的重心网格扫描
    pub fn scan_chemical_potential_grid(
        &self,
        chempots: Option<&ChempotRecord>,
        n_points: usize,
        conditions: Conditions,
        frozen: &FrozenDefects,
        dopant: Option<f64>,
    ) -> Result<ConcentrationTable> {
        let record = self.parse_grid_chempots(chempots)?;
        let refs = self.grid_el_refs(&record);
        let vertices: Vec<ChempotMap> = record.limits_wrt_el_refs.values().cloned().collect();
        let points = barycentric_grid(&vertices, n_points);

        let tables = self.run_points(&points, "Scanning chemical potential grid", |mus| {
            self.solve(conditions, mus, Some(&refs), frozen, dopant, true)
        })?;
        ConcentrationTable::concat(tables)
    }

    fn grid_el_refs(&self, record: &ChempotRecord) -> ChempotMap {
        let refs = record.el_refs();
        if refs.is_empty() {
            self.thermodynamics().resolve_el_refs(None)
        } else {
            refs
        }
    }

    /// 在化学势空间内求 `target`（表列名或缺陷名）的最小/最大值，返回最优点的结果表
    #[allow(clippy::too_many_arguments)]
    pub fn min_max_x(
        &self,
        target: &str,
        mode: MinMax,
        chempots: Option<&ChempotRecord>,
        conditions: Conditions,
        tolerance: f64,
        n_points: usize,
        frozen: &FrozenDefects,
        dopant: Option<f64>,
    ) -> Result<ConcentrationTable> {
        let record = self.parse_grid_chempots(chempots)?;
        let refs = self.grid_el_refs(&record);
        let mut vertices: Vec<ChempotMap> = record.limits_wrt_el_refs.values().cloned().collect();

        let mut best: Option<(f64, ChempotMap, ConcentrationTable)> = None;
        for _ in 0..MAX_REFINEMENTS {
            let points = barycentric_grid(&vertices, n_points);
            let tables = self.run_points(&points, "Refining chemical potentials", |mus| {
                self.solve(conditions, mus, Some(&refs), frozen, dopant, true)
            })?;

            let previous = best.as_ref().map(|(v, _, _)| *v);
            for (mus, table) in points.into_iter().zip(tables) {
                let value = table.target_value(target).ok_or_else(|| {
                    DefectError::InvalidArgument(format!(
                        "Target '{}' is neither a result column nor a defect name",
                        target
                    ))
                })?;
                let improves = match &best {
                    None => true,
                    Some((current, _, _)) => mode.better(value, *current),
                };
                if improves {
                    best = Some((value, mus, table));
                }
            }

            let Some((value, centre, _)) = &best else {
                break;
            };
            if let Some(prev) = previous {
                let scale = prev.abs().max(f64::MIN_POSITIVE);
                if (value - prev).abs() / scale < tolerance {
                    break;
                }
            }
            vertices = vertices
                .iter()
                .map(|v| {
                    v.iter()
                        .map(|(el, &mu)| {
                            let c = centre.get(el).copied().unwrap_or(mu);
                            (el.clone(), c + 0.5 * (mu - c))
                        })
                        .collect()
                })
                .collect();
        }

        best.map(|(_, _, table)| table)
            .ok_or_else(|| DefectError::InvalidArgument("No chemical potential points to evaluate".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fermi::chempots::USER_LIMIT_NAME;
    use crate::fermi::solver::SolverOptions;
    use crate::fermi::table;
    use crate::fermi::testing;

    fn solver() -> FermiSolver {
        FermiSolver::new(
            testing::cdte_thermo(),
            SolverOptions {
                jobs: 2,
                show_progress: false,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn cd_rich(s: &FermiSolver) -> ChempotMap {
        s.single_chempot_dict(Some("Cd-rich")).unwrap().0
    }

    #[test]
    fn test_scan_temperature_modes() {
        let s = solver();
        let mus = cd_rich(&s);
        let none = FrozenDefects::default();

        let t = s
            .scan_temperature(Some(&[300.0, 600.0, 900.0][..]), None, None, &mus, None, &none, None)
            .unwrap();
        assert_eq!(t.len(), 9);
        let temps = t.column(table::TEMPERATURE).unwrap();
        for temperature in [300.0, 600.0, 900.0] {
            assert!(temps.contains(&temperature));
        }

        let t = s
            .scan_temperature(None, Some(&[800.0, 1000.0][..]), Some(&[300.0, 400.0][..]), &mus, None, &none, None)
            .unwrap();
        assert_eq!(t.len(), 12);
        assert!(t.column(table::QUENCHED_TEMPERATURE).unwrap().contains(&400.0));

        let err = s
            .scan_temperature(Some(&[300.0][..]), Some(&[800.0][..]), None, &mus, None, &none, None)
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Both `annealing_temperature_range` and `temperature_range` were set"));
        assert!(s.scan_temperature(None, None, None, &mus, None, &none, None).is_err());
    }

    #[test]
    fn test_scan_dopant_concentration() {
        let s = solver();
        let dopants = [1e15, 1e16, 1e17];
        let t = s
            .scan_dopant_concentration(
                &dopants,
                &cd_rich(&s),
                None,
                Conditions::Equilibrium { temperature: 500.0 },
                &FrozenDefects::default(),
            )
            .unwrap();
        let column = t.column(table::DOPANT).unwrap();
        for d in dopants {
            assert!(column.contains(&d));
        }
        // 施主越多费米能级越高
        let ef = t.column(table::FERMI_LEVEL).unwrap();
        assert!(ef[0] <= ef[3] && ef[3] <= ef[6]);
    }

    #[test]
    fn test_interpolate_chempots() {
        let s = solver();
        let conditions = Conditions::Equilibrium { temperature: 600.0 };
        let none = FrozenDefects::default();
        let input = ChempotInput::Limits {
            record: None,
            limits: vec!["Cd-CdTe".to_string(), "CdTe-Te".to_string()],
        };
        let t = s.interpolate_chempots(3, &input, None, conditions, &none, None).unwrap();
        assert_eq!(t.len(), 9);
        let mut cd = t.column("μ_Cd").unwrap();
        cd.dedup();
        assert_eq!(cd.len(), 3);
        assert!((cd[1] + 0.625).abs() < 1e-12);

        let record = testing::cdte_chempots();
        let maps: Vec<ChempotMap> = record.limits_wrt_el_refs.values().cloned().collect();
        let mut three = maps.clone();
        three.push(maps[0].clone());
        let err = s
            .interpolate_chempots(3, &ChempotInput::Explicit(three), None, conditions, &none, None)
            .unwrap_err();
        assert!(err.to_string().contains("must contain exactly two"));
        assert!(s
            .interpolate_chempots(2, &ChempotInput::Explicit(maps), None, conditions, &none, None)
            .is_ok());
    }

    #[test]
    fn test_interpolate_five_points_pseudo_equilibrium() {
        let s = solver();
        let conditions = Conditions::PseudoEquilibrium {
            annealing_temperature: 800.0,
            quenched_temperature: 300.0,
        };
        let input = ChempotInput::Limits {
            record: None,
            limits: vec!["Cd-rich".to_string(), "Te-rich".to_string()],
        };
        let t = s
            .interpolate_chempots(5, &input, None, conditions, &FrozenDefects::default(), Some(1e16))
            .unwrap();
        assert_eq!(t.len(), 15);
        assert!(t.has_column(table::DOPANT));

        let record = testing::cdte_chempots();
        let (start, end) = (&record.limits_wrt_el_refs["Cd-CdTe"], &record.limits_wrt_el_refs["CdTe-Te"]);
        for el in ["Cd", "Te"] {
            let mut mu = t.column(&table::chempot_column(el)).unwrap();
            mu.dedup();
            assert_eq!(mu.len(), 5, "μ_{} = {:?}", el, mu);
            assert_eq!(mu[0], start[el]);
            assert_eq!(mu[4], end[el]);
            assert!((mu[2] - 0.5 * (start[el] + end[el])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_progress_bar_respects_option() {
        let quiet = solver();
        assert!(quiet.scan_progress_bar(4, "Scanning").is_hidden());

        let mut loud = solver();
        loud.show_progress = true;
        let pb = loud.scan_progress_bar(4, "Scanning");
        assert_eq!(pb.length(), Some(4));
    }

    #[test]
    fn test_interpolate_requires_record_for_limits() {
        let mut thermo = testing::cdte_thermo();
        thermo.chempots = None;
        let s = FermiSolver::new(thermo, SolverOptions::default()).unwrap();
        let input = ChempotInput::Limits {
            record: None,
            limits: vec!["Cd-CdTe".to_string(), "CdTe-Te".to_string()],
        };
        let err = s
            .interpolate_chempots(
                3,
                &input,
                None,
                Conditions::Equilibrium { temperature: 300.0 },
                &FrozenDefects::default(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, DefectError::MissingChempots(_)));
    }

    #[test]
    fn test_grid_requires_multiple_limits() {
        let s = solver();
        let flat = ChempotRecord::from_flat(cd_rich(&s));
        assert_eq!(flat.limit_names(), vec![USER_LIMIT_NAME.to_string()]);
        let err = s.parse_grid_chempots(Some(&flat)).unwrap_err();
        assert!(err
            .to_string()
            .contains("Only one chemical potential limit is present in"));

        let mut thermo = testing::cdte_thermo();
        thermo.chempots = None;
        let bare = FermiSolver::new(thermo, SolverOptions::default()).unwrap();
        assert!(bare.parse_grid_chempots(None).is_err());
        assert_eq!(s.parse_grid_chempots(None).unwrap().n_limits(), 2);
    }

    #[test]
    fn test_chemical_potential_grid() {
        let s = solver();
        let t = s
            .scan_chemical_potential_grid(
                None,
                4,
                Conditions::Equilibrium { temperature: 700.0 },
                &FrozenDefects::default(),
                None,
            )
            .unwrap();
        assert_eq!(t.len(), 12);
        let cd = t.column("μ_Cd").unwrap();
        assert!(cd.contains(&0.0));
        assert!(cd.contains(&-1.25));
    }

    #[test]
    fn test_min_max_x_beats_vertices() {
        let s = solver();
        let conditions = Conditions::Equilibrium { temperature: 700.0 };
        let none = FrozenDefects::default();
        let best = s
            .min_max_x(table::ELECTRONS, MinMax::Max, None, conditions, 1e-3, 5, &none, None)
            .unwrap();
        let best_value = best.target_value(table::ELECTRONS).unwrap();

        for limit in ["Cd-CdTe", "CdTe-Te"] {
            let (mus, _) = s.single_chempot_dict(Some(limit)).unwrap();
            let t = s.equilibrium_solve(&mus, None, 700.0, None, false).unwrap();
            let v = t.target_value(table::ELECTRONS).unwrap();
            assert!(best_value >= v * (1.0 - 1e-9));
        }

        let lowest = s
            .min_max_x("v_Cd_s0", MinMax::Min, None, conditions, 1e-3, 5, &none, None)
            .unwrap();
        let lowest_value = lowest.concentration("v_Cd_s0").unwrap();
        for limit in ["Cd-CdTe", "CdTe-Te"] {
            let (mus, _) = s.single_chempot_dict(Some(limit)).unwrap();
            let t = s.equilibrium_solve(&mus, None, 700.0, None, false).unwrap();
            assert!(lowest_value <= t.concentration("v_Cd_s0").unwrap() * (1.0 + 1e-9));
        }

        let err = s
            .min_max_x("nonsense", MinMax::Max, None, conditions, 1e-3, 3, &none, None)
            .unwrap_err();
        assert!(err.to_string().contains("nonsense"));
    }
}
