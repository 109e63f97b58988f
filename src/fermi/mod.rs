//! # 费米能级与缺陷浓度模块
//!
//! 由缺陷热力学记录与体相 DOS 自洽求解费米能级、载流子与缺陷浓度。
//!
//! ## 依赖关系
//! - 被 `commands/fermi.rs` 使用
//! - 子模块: backend, chempots, dos, scan, solver, table, thermo

pub mod backend;
pub mod chempots;
pub mod dos;
pub mod scan;
pub mod solver;
pub mod table;
pub mod thermo;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{activate_sc_fermi_backend, BackendKind, FermiBackend};
pub use chempots::{ChempotMap, ChempotRecord};
pub use dos::{FermiDos, ScFermiDos};
pub use scan::{ChempotInput, MinMax};
pub use solver::{Conditions, FermiSolution, FermiSolver, FrozenDefects, SolverOptions};
pub use table::ConcentrationTable;
pub use thermo::{DefectThermodynamics, ThermoEntry};
