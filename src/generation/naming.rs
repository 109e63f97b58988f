//! # 缺陷命名
//!
//! 同一类别内，基础名称（如 `Cd_i_m1`）首次出现时直接使用；第二次出现时新缺陷取
//! `<base>b`，已有缺陷回溯改名为 `<base>a`；之后依次取下一个字母。
//!
//! 回溯改名先生成改名计划（`Registration::Collision`），再由
//! `apply_rename` 按原顺序重建有序映射，改名过程中不会出现两个键都不存在的窗口。
//!
//! ## 依赖关系
//! - 被 `generation/generator.rs` 使用

use crate::models::defect::{name_with_charge, split_charge};
use crate::models::DefectEntry;

use indexmap::IndexMap;
use std::collections::HashMap;

/// 一次登记的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// 首次出现，直接使用基础名称
    Fresh(String),
    /// 第二次出现：新缺陷使用 `name`，已有的 `rename_from` 系列改为 `rename_to`
    Collision {
        name: String,
        rename_from: String,
        rename_to: String,
    },
    /// 已带字母后缀，直接使用
    Lettered(String),
}

impl Registration {
    /// 新缺陷最终使用的基础名称
    pub fn name(&self) -> &str {
        match self {
            Registration::Fresh(n) | Registration::Lettered(n) => n,
            Registration::Collision { name, .. } => name,
        }
    }
}

/// 基础名称登记表（每个类别一个）
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    seen: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, base: &str) -> Registration {
        let count = self.seen.entry(base.to_string()).or_insert(0);
        *count += 1;
        match *count {
            1 => Registration::Fresh(base.to_string()),
            2 => Registration::Collision {
                name: format!("{}{}", base, letter_suffix(1)),
                rename_from: base.to_string(),
                rename_to: format!("{}{}", base, letter_suffix(0)),
            },
            n => Registration::Lettered(format!("{}{}", base, letter_suffix(n - 1))),
        }
    }
}

/// 0 -> "a", 25 -> "z", 26 -> "aa"
pub fn letter_suffix(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    loop {
        letters.push((b'a' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// 把 `<from>_<q>` 形式的键改为 `<to>_<q>`，保持原有位置；返回被改名的条目数
pub fn apply_rename(entries: &mut IndexMap<String, DefectEntry>, from: &str, to: &str) -> usize {
    let mut renamed = 0;
    let old = std::mem::take(entries);
    for (key, mut entry) in old {
        let new_key = match split_charge(&key) {
            Some((base, q)) if base == from => {
                renamed += 1;
                name_with_charge(to, q)
            }
            _ => key,
        };
        entry.name = new_key.clone();
        entries.insert(new_key, entry);
    }
    renamed
}
