//! # 缺陷生成配置
//!
//! - `ExtrinsicSpec`：外来元素（掺杂/杂质）的指定方式
//! - `GeneratorConfig`：生成流程的全部可调参数，均有默认值
//!
//! ## 依赖关系
//! - 被 `generation/generator.rs`, `commands/generate.rs` 使用
//! - 使用 `utils/output.rs` 输出警告

use crate::generation::supercell::SupercellSettings;
use crate::generation::voronoi::VoronoiSettings;
use crate::utils::output;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 外来元素指定方式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ExtrinsicSpec {
    /// 不生成外来缺陷
    #[default]
    None,
    /// 单个元素：替换所有宿主元素，并生成其间隙
    Single(String),
    /// 元素列表：每个元素替换所有宿主元素
    List(Vec<String>),
    /// 宿主元素 -> 可替换的外来元素
    PerHost(IndexMap<String, Vec<String>>),
}

impl ExtrinsicSpec {
    /// 从 JSON 值解析：字符串、字符串列表，或值为字符串/列表的对象。
    /// 其他类型给出警告并退化为不生成外来缺陷。
    pub fn from_json(value: &Value) -> Self {
        let as_list = |v: &Value| -> Option<Vec<String>> {
            match v {
                Value::String(s) => Some(vec![s.clone()]),
                Value::Array(items) => items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string))
                    .collect(),
                _ => None,
            }
        };

        let parsed = match value {
            Value::Null => Some(ExtrinsicSpec::None),
            Value::String(s) => Some(ExtrinsicSpec::Single(s.clone())),
            Value::Array(_) => as_list(value).map(ExtrinsicSpec::List),
            Value::Object(map) => map
                .iter()
                .map(|(host, v)| as_list(v).map(|dopants| (host.clone(), dopants)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(ExtrinsicSpec::PerHost),
            _ => None,
        };

        parsed.unwrap_or_else(|| {
            output::print_warning(&format!(
                "Invalid `extrinsic` defect input. Got {}, but string or list or dict required. \
                 No extrinsic defects will be generated.",
                json_type_name(value)
            ));
            ExtrinsicSpec::None
        })
    }

    /// 宿主元素 -> 允许的替位元素
    pub fn substitutions(&self, host_elements: &[String]) -> IndexMap<String, Vec<String>> {
        let for_all_hosts = |dopants: Vec<String>| -> IndexMap<String, Vec<String>> {
            host_elements
                .iter()
                .map(|host| (host.clone(), dopants.clone()))
                .collect()
        };
        match self {
            ExtrinsicSpec::None => IndexMap::new(),
            ExtrinsicSpec::Single(el) => for_all_hosts(vec![el.clone()]),
            ExtrinsicSpec::List(els) => for_all_hosts(els.clone()),
            ExtrinsicSpec::PerHost(map) => map.clone(),
        }
    }

    /// 去重后的外来元素，按首次出现顺序
    pub fn extrinsic_elements(&self) -> Vec<String> {
        let all: Vec<&String> = match self {
            ExtrinsicSpec::None => Vec::new(),
            ExtrinsicSpec::Single(el) => vec![el],
            ExtrinsicSpec::List(els) => els.iter().collect(),
            ExtrinsicSpec::PerHost(map) => map.values().flatten().collect(),
        };
        let mut unique: Vec<String> = Vec::new();
        for el in all {
            if !unique.contains(el) {
                unique.push(el.clone());
            }
        }
        unique
    }

    pub fn is_empty(&self) -> bool {
        self.extrinsic_elements().is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list with non-string items",
        Value::Object(_) => "dict with non-string/list values",
    }
}

/// 缺陷生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// 外来元素
    pub extrinsic: ExtrinsicSpec,

    /// 手动指定的间隙位分数坐标（原胞）；为空时用 Voronoi 自动搜索
    pub interstitial_coords: Vec<[f64; 3]>,

    /// 超胞约束
    pub supercell: SupercellSettings,

    /// Voronoi 间隙搜索参数
    pub voronoi: VoronoiSettings,

    /// 对称性容差 (Å)
    pub symprec: f64,

    /// 是否显示进度条
    pub show_progress: bool,

    /// 构造完成后是否打印汇总表
    pub print_summary: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            extrinsic: ExtrinsicSpec::None,
            interstitial_coords: Vec::new(),
            supercell: SupercellSettings::default(),
            voronoi: VoronoiSettings::default(),
            symprec: 0.01,
            show_progress: true,
            print_summary: true,
        }
    }
}

impl GeneratorConfig {
    /// 不显示进度条和汇总表
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self.print_summary = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hosts() -> Vec<String> {
        vec!["Cd".to_string(), "Te".to_string()]
    }

    #[test]
    fn test_single_and_list_apply_to_every_host() {
        let single = ExtrinsicSpec::from_json(&json!("Zn"));
        assert_eq!(single.substitutions(&hosts()).get("Te"), Some(&vec!["Zn".to_string()]));

        let list = ExtrinsicSpec::from_json(&json!(["Zn", "Cl"]));
        assert_eq!(list.substitutions(&hosts()).len(), 2);
        assert_eq!(list.extrinsic_elements(), vec!["Zn", "Cl"]);
    }

    #[test]
    fn test_per_host_mapping_flattens_unique_elements() {
        let spec = ExtrinsicSpec::from_json(&json!({"Cd": "Zn", "Te": ["Cl", "Zn"]}));
        let subs = spec.substitutions(&hosts());
        assert_eq!(subs.get("Cd"), Some(&vec!["Zn".to_string()]));
        assert_eq!(subs.get("Te").map(Vec::len), Some(2));
        assert_eq!(spec.extrinsic_elements(), vec!["Zn", "Cl"]);
    }

    #[test]
    fn test_invalid_type_degrades_to_none() {
        assert_eq!(ExtrinsicSpec::from_json(&json!(42)), ExtrinsicSpec::None);
        assert_eq!(ExtrinsicSpec::from_json(&json!({"Cd": 1})), ExtrinsicSpec::None);
        assert!(ExtrinsicSpec::from_json(&json!(null)).is_empty());
    }
}
