//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `generate`: 生成点缺陷与超胞
//! - `fermi`: 自洽费米能级与缺陷浓度
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: generate, fermi

pub mod fermi;
pub mod generate;

use clap::{Parser, Subcommand};

/// defectkit - 点缺陷生成与费米能级分析
#[derive(Parser)]
#[command(name = "defectkit")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Point-defect generation and self-consistent Fermi-level analysis", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Generate all point defects and their supercells for a host structure
    Generate(generate::GenerateArgs),

    /// Solve for the self-consistent Fermi level and defect concentrations
    Fermi(fermi::FermiArgs),
}
