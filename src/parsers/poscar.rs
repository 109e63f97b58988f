//! # VASP POSCAR 格式读写
//!
//! 读取宿主结构，并为每个缺陷条目写出可直接计算的超胞 POSCAR。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `generation/generator.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{DefectError, Result};
use crate::models::{Lattice, Site, Structure};

use nalgebra::Vector3;
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| DefectError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(&content, &path.display().to_string())
}

fn parse_error(source: &str, reason: impl Into<String>) -> DefectError {
    DefectError::ParseError {
        format: "poscar".to_string(),
        path: source.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析 POSCAR 格式；`source` 仅用于错误信息
pub fn parse_poscar_content(content: &str, source: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(source, "File too short"));
    }

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .trim()
        .parse()
        .map_err(|_| parse_error(source, "Invalid scaling factor at line 2"))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                source,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        *row = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: Element symbols. VASP 4 files without symbols cannot carry species information.
    let elements: Vec<String> = lines[5]
        .split_whitespace()
        .map(|s| s.split(['_', '/']).next().unwrap_or(s).to_string())
        .collect();
    if elements.is_empty() || elements[0].parse::<usize>().is_ok() {
        return Err(parse_error(
            source,
            "Missing element symbols line (VASP 5 format required)",
        ));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|s| s.parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error(source, "Invalid atom counts at line 7"))?;
    if counts.len() != elements.len() {
        return Err(parse_error(
            source,
            format!(
                "{} element symbols but {} atom counts",
                elements.len(),
                counts.len()
            ),
        ));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    if lines[coord_line]
        .trim()
        .to_lowercase()
        .starts_with('s')
    {
        coord_line += 1;
    }
    if lines.len() <= coord_line {
        return Err(parse_error(source, "Missing coordinate type line"));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    let mut sites = Vec::with_capacity(counts.iter().sum());
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();
            if parts.len() < 3 {
                return Err(parse_error(
                    source,
                    format!("Invalid or missing atom position at line {}", line_idx + 1),
                ));
            }

            let frac_coords = if is_cartesian {
                let cart = Vector3::new(parts[0], parts[1], parts[2]) * scale;
                lattice
                    .cart_to_frac(&cart)
                    .ok_or_else(|| parse_error(source, "Degenerate lattice"))?
            } else {
                [parts[0], parts[1], parts[2]]
            };
            sites.push(Site::new(elem.clone(), frac_coords));
            line_idx += 1;
        }
    }

    Ok(Structure::new(lattice, sites))
}

/// 将结构转为 POSCAR 字符串；元素按首次出现顺序分组，虚拟标记不写出
pub fn to_poscar_string(structure: &Structure, comment: &str) -> String {
    let composition = structure.composition();

    let mut result = String::new();
    result.push_str(&format!("{}\n", comment));
    result.push_str("1.0\n");

    for row in &structure.lattice.matrix {
        result.push_str(&format!(
            "  {:16.10}  {:16.10}  {:16.10}\n",
            row[0], row[1], row[2]
        ));
    }

    let symbols: Vec<&str> = composition.keys().map(|s| s.as_str()).collect();
    let counts: Vec<String> = composition.values().map(|n| n.to_string()).collect();
    result.push_str(&format!("   {}\n", symbols.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));
    result.push_str("Direct\n");

    for symbol in &symbols {
        for site in structure
            .sites
            .iter()
            .filter(|s| s.species.symbol() == *symbol && !s.species.is_dummy())
        {
            let [x, y, z] = site.frac_coords;
            result.push_str(&format!(
                "  {:16.10}  {:16.10}  {:16.10}  {}\n",
                x, y, z, symbol
            ));
        }
    }

    result
}

/// 写出 POSCAR 文件
pub fn write_poscar(path: &Path, structure: &Structure, comment: &str) -> Result<()> {
    fs::write(path, to_poscar_string(structure, comment)).map_err(|e| {
        DefectError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        }
    })
}
