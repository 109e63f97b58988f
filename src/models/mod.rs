//! # 数据模型模块
//!
//! 定义晶体结构、元素数据、缺陷与缺陷条目的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `symmetry/`, `generation/`, `fermi/` 使用
//! - 子模块: structure, elements, defect

pub mod defect;
pub mod elements;
pub mod structure;

pub use defect::{Defect, DefectCategory, DefectEntry, DefectKind, ScEntry};
pub use structure::{Lattice, Site, Species, Structure};
