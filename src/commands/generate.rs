//! # generate 命令实现
//!
//! 读取宿主结构，运行缺陷生成流程，写出生成器记录（JSON）和可选的 POSCAR。
//!
//! ## 依赖关系
//! - 使用 `cli/generate.rs` 定义的参数
//! - 使用 `parsers/`, `generation/`
//! - 使用 `utils/output.rs`

use crate::cli::generate::GenerateArgs;
use crate::error::{DefectError, Result};
use crate::generation::{DefectsGenerator, ExtrinsicSpec, GeneratorConfig, SupercellSettings};
use crate::parsers;
use crate::utils::output;

use serde_json::Value;
use std::fs;

/// 生成器记录的文件名
pub const RECORD_FILE: &str = "defect_gen.json";

/// 执行 generate 命令
pub fn execute(args: GenerateArgs) -> Result<()> {
    output::print_header(&format!("Generating defects for {}", args.structure.display()));

    let structure = parsers::parse_structure_file(&args.structure)?;
    output::print_info(&format!(
        "Read {} ({} sites)",
        structure.formula(),
        structure.len()
    ));

    let interstitial_coords = args
        .interstitial_coords
        .iter()
        .map(|s| parse_coords(s))
        .collect::<Result<Vec<_>>>()?;

    let config = GeneratorConfig {
        extrinsic: args
            .extrinsic
            .as_deref()
            .map(parse_extrinsic)
            .unwrap_or_default(),
        interstitial_coords,
        supercell: SupercellSettings {
            min_atoms: args.min_atoms,
            max_atoms: args.max_atoms,
            min_length: args.min_length,
            force_diagonal: args.force_diagonal,
        },
        symprec: args.symprec,
        ..Default::default()
    };

    let generator = DefectsGenerator::new(&structure, config)?;

    fs::create_dir_all(&args.output).map_err(|e| DefectError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    let record_path = args.output.join(RECORD_FILE);
    generator.to_json_file(&record_path)?;
    output::print_success(&format!("Wrote {}", record_path.display()));

    if args.write_poscars {
        let written = generator.write_poscars(&args.output)?;
        output::print_success(&format!(
            "Wrote {} POSCAR file(s) under {}",
            written,
            args.output.display()
        ));
    }

    output::print_done(&generator.to_string());
    Ok(())
}

/// JSON 值，或逗号分隔的元素列表
pub fn parse_extrinsic(s: &str) -> ExtrinsicSpec {
    let value = serde_json::from_str::<Value>(s).unwrap_or_else(|_| {
        let elements: Vec<Value> = s
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| Value::String(e.to_string()))
            .collect();
        match elements.len() {
            0 => Value::Null,
            1 => elements[0].clone(),
            _ => Value::Array(elements),
        }
    });
    ExtrinsicSpec::from_json(&value)
}

/// `x,y,z` -> 分数坐标
pub fn parse_coords(s: &str) -> Result<[f64; 3]> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|e| DefectError::InvalidArgument(format!("Invalid coordinates '{}': {}", s, e)))?;
    match values.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(DefectError::InvalidArgument(format!(
            "Expected three fractional coordinates, got '{}'",
            s
        ))),
    }
}
