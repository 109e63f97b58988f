//! # defectkit - 点缺陷生成与费米能级分析
//!
//! 从宿主晶体结构生成全部本征与外来点缺陷、共享超胞与带电荷的缺陷条目；
//! 由缺陷热力学记录与体相 DOS 自洽求解费米能级与缺陷浓度。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── generation/ (缺陷生成流程)
//!   │     ├── symmetry/  (对称性与原胞)
//!   │     └── models/    (数据模型)
//!   ├── fermi/      (费米能级求解)
//!   │     └── numerics.rs (一维求根)
//!   ├── parsers/    (POSCAR / JSON 读写)
//!   ├── cli/, commands/ (命令行)
//!   ├── utils/      (输出与进度条)
//!   └── error.rs    (错误处理)
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod fermi;
pub mod generation;
pub mod models;
pub mod numerics;
pub mod parsers;
pub mod symmetry;
pub mod utils;

pub use error::{DefectError, Result};
pub use fermi::{DefectThermodynamics, FermiSolver, SolverOptions};
pub use generation::{DefectsGenerator, GeneratorConfig};
