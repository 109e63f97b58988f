//! # 缺陷生成模块
//!
//! 从宿主结构生成全部点缺陷及其超胞条目。
//!
//! ## 依赖关系
//! - 被 `commands/generate.rs` 使用
//! - 子模块: assembler, charges, config, enumerators, generator, naming, summary, supercell, voronoi

pub mod assembler;
pub mod charges;
pub mod config;
pub mod enumerators;
pub mod generator;
pub mod naming;
pub mod summary;
pub mod supercell;
pub mod voronoi;

pub use config::{ExtrinsicSpec, GeneratorConfig};
pub use generator::{DefectsGenerator, GeneratorRecord};
pub use supercell::{SupercellMatrix, SupercellSettings};
pub use voronoi::{InterstitialFinder, InterstitialSite, VoronoiInterstitialFinder, VoronoiSettings};
