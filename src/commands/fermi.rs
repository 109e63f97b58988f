//! # fermi 命令实现
//!
//! 读取缺陷热力学记录（及可选 DOS），求解费米能级与缺陷浓度，
//! 打印结果表并可导出 CSV。
//!
//! ## 功能
//! - 单点求解：热平衡或准平衡（给出退火/淬火温度时）
//! - `--scan-temperatures`：温度扫描（准平衡时扫描退火温度）
//! - `--grid-points`：化学势网格扫描
//!
//! ## 依赖关系
//! - 使用 `cli/fermi.rs` 定义的参数
//! - 使用 `fermi/`, `parsers/`
//! - 使用 `utils/output.rs`

use crate::cli::fermi::FermiArgs;
use crate::error::Result;
use crate::fermi::{
    ChempotMap, Conditions, DefectThermodynamics, FermiDos, FermiSolver, FrozenDefects,
    SolverOptions,
};
use crate::parsers;
use crate::utils::output;

/// 执行 fermi 命令
pub fn execute(args: FermiArgs) -> Result<()> {
    output::print_header(&format!("Solving Fermi level for {}", args.thermo.display()));

    let thermo = DefectThermodynamics::from_json_file(&args.thermo)?;
    let bulk_dos = match &args.dos {
        Some(path) => Some(parsers::read_json::<FermiDos>(path)?),
        None => None,
    };
    output::print_info(&format!(
        "Loaded {} defect charge states ({} defects)",
        thermo.entries.len(),
        thermo.defect_names().len()
    ));

    let solver = FermiSolver::new(
        thermo,
        SolverOptions {
            backend: args.backend.clone(),
            bulk_dos,
            skip_vbm_check: args.skip_vbm_check,
            jobs: args.jobs,
            show_progress: !args.quiet,
        },
    )?;
    output::print_info(&format!("Using the {} backend", solver.backend_kind()));

    let conditions = conditions_for(&args);
    let frozen = FrozenDefects::default();

    let table = if let Some(n_points) = args.grid_points {
        solver.scan_chemical_potential_grid(None, n_points, conditions, &frozen, args.dopant)?
    } else {
        let (chempots, el_refs) = chempots_for(&solver, args.limit.as_deref())?;
        match (&args.scan_temperatures, conditions) {
            (Some(range), Conditions::Equilibrium { .. }) => solver.scan_temperature(
                Some(range.0.as_slice()),
                None,
                None,
                &chempots,
                Some(&el_refs),
                &frozen,
                args.dopant,
            )?,
            (
                Some(range),
                Conditions::PseudoEquilibrium {
                    quenched_temperature, ..
                },
            ) => solver.scan_temperature(
                None,
                Some(range.0.as_slice()),
                Some(&[quenched_temperature][..]),
                &chempots,
                Some(&el_refs),
                &frozen,
                args.dopant,
            )?,
            (None, _) => solver.solve(
                conditions,
                &chempots,
                Some(&el_refs),
                &frozen,
                args.dopant,
                args.append_chempots,
            )?,
        }
    };

    let title = match conditions {
        Conditions::Equilibrium { temperature } if args.scan_temperatures.is_none() => {
            format!("Defect concentrations at {} K", temperature)
        }
        _ => "Defect concentrations".to_string(),
    };
    output::print_table(&title, &table.to_string());

    if let Some(path) = &args.output_csv {
        table.to_csv(path)?;
        output::print_success(&format!("Wrote {}", path.display()));
    }

    output::print_done(&format!("Solved {} row(s)", table.len()));
    Ok(())
}

/// 给出淬火温度即为准平衡；仅扫描退火温度时退火温度由扫描值替换
fn conditions_for(args: &FermiArgs) -> Conditions {
    match (args.annealing_temperature, args.quenched_temperature) {
        (annealing, Some(quenched_temperature)) => Conditions::PseudoEquilibrium {
            annealing_temperature: annealing.unwrap_or(args.temperature),
            quenched_temperature,
        },
        (_, None) => Conditions::Equilibrium {
            temperature: args.temperature,
        },
    }
}

/// 所选极限的化学势；记录中没有化学势时全部取 0
fn chempots_for(solver: &FermiSolver, limit: Option<&str>) -> Result<(ChempotMap, ChempotMap)> {
    if solver.thermodynamics().chempots.is_none() {
        output::print_warning(
            "No chemical potentials attached to the record; all chemical potentials are set to 0 \
             (elemental reference energies).",
        );
        return Ok((ChempotMap::new(), solver.thermodynamics().resolve_el_refs(None)));
    }
    solver.single_chempot_dict(limit)
}
