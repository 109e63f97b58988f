//! # 浓度结果表
//!
//! 每行一个缺陷（各电荷态浓度求和），行索引列为 `Defect`。
//! 其余列依次为 `Concentration (cm^-3)`、`Fermi Level`、`Electrons (cm^-3)`、
//! `Holes (cm^-3)`、温度列、可选的 `Dopant (cm^-3)` 与 `μ_<El>`。
//!
//! ## 依赖关系
//! - 被 `fermi/solver.rs`, `fermi/scan.rs`, `commands/fermi.rs` 使用
//! - 使用 `tabled` 渲染，`csv` 导出

use crate::error::{DefectError, Result};

use std::fmt;
use std::path::Path;
use tabled::builder::Builder;

pub const DEFECT: &str = "Defect";
pub const CONCENTRATION: &str = "Concentration (cm^-3)";
pub const FERMI_LEVEL: &str = "Fermi Level";
pub const ELECTRONS: &str = "Electrons (cm^-3)";
pub const HOLES: &str = "Holes (cm^-3)";
pub const TEMPERATURE: &str = "Temperature";
pub const ANNEALING_TEMPERATURE: &str = "Annealing Temperature";
pub const QUENCHED_TEMPERATURE: &str = "Quenched Temperature";
pub const DOPANT: &str = "Dopant (cm^-3)";

/// `μ_<El>` 列名
pub fn chempot_column(element: &str) -> String {
    format!("μ_{}", element)
}

/// 浓度结果表
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConcentrationTable {
    columns: Vec<String>,
    index: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ConcentrationTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            index: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, defect: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(DefectError::InvalidArgument(format!(
                "Row has {} values but the table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.index.push(defect.into());
        self.rows.push(values);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行索引（缺陷名）
    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| r[idx])
    }

    /// 某缺陷的浓度（同名多行取第一行）
    pub fn concentration(&self, defect: &str) -> Option<f64> {
        let row = self.index.iter().position(|d| d == defect)?;
        self.value(row, CONCENTRATION)
    }

    /// 优化目标值：表级列（载流子、费米能级）或某缺陷的浓度
    pub fn target_value(&self, target: &str) -> Option<f64> {
        if target != CONCENTRATION && self.has_column(target) {
            return self.value(0, target);
        }
        self.concentration(target)
    }

    /// 纵向拼接；列必须一致
    pub fn concat(tables: Vec<ConcentrationTable>) -> Result<Self> {
        let mut iter = tables.into_iter();
        let Some(mut out) = iter.next() else {
            return Ok(Self::default());
        };
        for table in iter {
            if table.columns != out.columns {
                return Err(DefectError::InvalidArgument(format!(
                    "Cannot concatenate tables with different columns: {:?} vs {:?}",
                    out.columns, table.columns
                )));
            }
            out.index.extend(table.index);
            out.rows.extend(table.rows);
        }
        Ok(out)
    }

    pub fn to_csv(&self, output_path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(output_path)?;

        let mut header = vec![DEFECT.to_string()];
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;

        for (defect, row) in self.index.iter().zip(&self.rows) {
            let mut record = vec![defect.clone()];
            record.extend(row.iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush().map_err(|e| DefectError::FileWriteError {
            path: output_path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }
}

fn format_cell(column: &str, value: f64) -> String {
    if column.ends_with("(cm^-3)") {
        format!("{:.3e}", value)
    } else if column.ends_with("Temperature") {
        format!("{:.1}", value)
    } else {
        format!("{:.4}", value)
    }
}

impl fmt::Display for ConcentrationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        let mut header = vec![DEFECT.to_string()];
        header.extend(self.columns.iter().cloned());
        builder.push_record(header);

        for (defect, row) in self.index.iter().zip(&self.rows) {
            let mut record = vec![defect.clone()];
            record.extend(
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, &v)| format_cell(c, v)),
            );
            builder.push_record(record);
        }
        write!(f, "{}", builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(temperature: f64) -> ConcentrationTable {
        let mut t = ConcentrationTable::new(vec![
            CONCENTRATION.to_string(),
            FERMI_LEVEL.to_string(),
            TEMPERATURE.to_string(),
        ]);
        t.push_row("v_Cd_s0", vec![1e12, 0.4, temperature]).unwrap();
        t.push_row("Cd_i_m1", vec![3e10, 0.4, temperature]).unwrap();
        t
    }

    #[test]
    fn test_columns_and_lookup() {
        let t = table(300.0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.concentration("Cd_i_m1"), Some(3e10));
        assert_eq!(t.target_value(FERMI_LEVEL), Some(0.4));
        assert_eq!(t.target_value("v_Cd_s0"), Some(1e12));
        assert_eq!(t.target_value("unknown"), None);
        assert!(t.clone().push_row("x", vec![1.0]).is_err());
    }

    #[test]
    fn test_concat_and_render() {
        let t = ConcentrationTable::concat(vec![table(300.0), table(600.0)]).unwrap();
        assert_eq!(t.len(), 4);
        assert_eq!(t.column(TEMPERATURE).unwrap(), vec![300.0, 300.0, 600.0, 600.0]);

        let other = ConcentrationTable::new(vec![CONCENTRATION.to_string()]);
        assert!(ConcentrationTable::concat(vec![table(300.0), other]).is_err());

        let text = t.to_string();
        assert!(text.contains("Defect"));
        assert!(text.contains("1.000e12"));
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concentrations.csv");
        table(300.0).to_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "Defect,Concentration (cm^-3),Fermi Level,Temperature");
        assert_eq!(text.lines().count(), 3);
    }
}
