//! # generate 子命令 CLI 定义
//!
//! 从宿主结构生成全部点缺陷与超胞条目
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/generate.rs`

use clap::Args;
use std::path::PathBuf;

/// generate 子命令参数
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Host structure file (POSCAR or structure JSON)
    pub structure: PathBuf,

    /// Extrinsic elements: `Zn`, `Zn,Cu`, or a JSON value such as `{"Cd": ["Zn"]}`
    #[arg(short, long)]
    pub extrinsic: Option<String>,

    /// Interstitial site in fractional coordinates of the primitive cell (repeatable): x,y,z
    #[arg(long = "interstitial-coords", value_name = "X,Y,Z")]
    pub interstitial_coords: Vec<String>,

    /// Minimum number of atoms in the supercell
    #[arg(long, default_value_t = 50)]
    pub min_atoms: usize,

    /// Maximum number of atoms in the supercell
    #[arg(long, default_value_t = 240)]
    pub max_atoms: usize,

    /// Minimum perpendicular width of the supercell (Å)
    #[arg(long, default_value_t = 10.0)]
    pub min_length: f64,

    /// Only consider diagonal supercell matrices
    #[arg(long, default_value_t = false)]
    pub force_diagonal: bool,

    /// Symmetry tolerance (Å)
    #[arg(long, default_value_t = 0.01)]
    pub symprec: f64,

    /// Output directory
    #[arg(short, long, default_value = "defects")]
    pub output: PathBuf,

    /// Also write a POSCAR for every defect entry and the bulk supercell
    #[arg(long, default_value_t = false)]
    pub write_poscars: bool,
}
