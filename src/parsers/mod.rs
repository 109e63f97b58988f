//! # 解析器模块
//!
//! 结构文件（POSCAR / JSON）与 JSON 记录（生成器记录、热力学记录、DOS）的读写。
//!
//! ## 依赖关系
//! - 被 `commands/`, `generation/`, `fermi/` 使用
//! - 使用 `models/` 数据模型, `serde_json`
//! - 子模块: poscar

pub mod poscar;

use crate::error::{DefectError, Result};
use crate::models::Structure;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// 从文件路径推断格式并解析结构：`.json` 为结构 JSON，其余按 POSCAR 处理
pub fn parse_structure_file(path: &Path) -> Result<Structure> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => read_json(path),
        _ => poscar::parse_poscar_file(path),
    }
}

/// 读取 JSON 记录
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| DefectError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// 写出带缩进的 JSON 记录
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(|e| DefectError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
