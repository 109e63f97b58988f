//! # fermi 子命令 CLI 定义
//!
//! 由缺陷热力学记录自洽求解费米能级与缺陷浓度
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/fermi.rs`

use clap::{ArgGroup, Args};
use regex::Regex;
use std::path::PathBuf;

/// 数值区间 `start-end:step`（含两端）
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange(pub Vec<f64>);

/// 解析 `300-1000:100` 或逗号分隔的值列表
pub fn parse_range(s: &str) -> Result<ValueRange, String> {
    let re = Regex::new(r"^\s*([0-9.eE+]+)\s*-\s*([0-9.eE+]+)\s*:\s*([0-9.eE+]+)\s*$")
        .map_err(|e| e.to_string())?;
    if let Some(caps) = re.captures(s) {
        let num = |i: usize| -> Result<f64, String> {
            caps[i]
                .parse::<f64>()
                .map_err(|e| format!("invalid number '{}': {}", &caps[i], e))
        };
        let (start, end, step) = (num(1)?, num(2)?, num(3)?);
        if step <= 0.0 || end < start {
            return Err(format!("invalid range '{}': need start <= end and step > 0", s));
        }
        let n = ((end - start) / step + 1e-9).floor() as usize;
        let mut values: Vec<f64> = (0..=n).map(|i| start + step * i as f64).collect();
        if let Some(&last) = values.last() {
            if (end - last).abs() > 1e-9 * end.abs().max(1.0) {
                values.push(end);
            }
        }
        return Ok(ValueRange(values));
    }

    s.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid value '{}': {}", v.trim(), e))
        })
        .collect::<Result<Vec<f64>, String>>()
        .map(ValueRange)
}

/// fermi 子命令参数
#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("annealing")
        .args(["annealing_temperature", "scan_temperatures"])
        .multiple(true)
))]
pub struct FermiArgs {
    /// Defect thermodynamics record (JSON)
    pub thermo: PathBuf,

    /// Bulk DOS (JSON); overrides the DOS attached to the record
    #[arg(long)]
    pub dos: Option<PathBuf>,

    /// Solver backend: doped or py-sc-fermi
    #[arg(short, long, default_value = "doped")]
    pub backend: String,

    /// Chemical potential limit name, or an alias such as `Te-rich`
    #[arg(short, long)]
    pub limit: Option<String>,

    /// Temperature (K) for an equilibrium solve
    #[arg(short, long, default_value_t = 300.0)]
    pub temperature: f64,

    /// Annealing temperature (K); enables the pseudo-equilibrium solve
    #[arg(long, requires = "quenched_temperature")]
    pub annealing_temperature: Option<f64>,

    /// Quenched temperature (K); needs an annealing temperature or an annealing scan
    #[arg(long, requires = "annealing")]
    pub quenched_temperature: Option<f64>,

    /// Effective dopant concentration (cm^-3; positive for donors)
    #[arg(short, long, allow_negative_numbers = true)]
    pub dopant: Option<f64>,

    /// Scan temperatures: `start-end:step` or a comma-separated list
    /// (annealing temperatures when a quenched temperature is given)
    #[arg(long, value_parser = parse_range)]
    pub scan_temperatures: Option<ValueRange>,

    /// Scan over all chemical potential limits with this many points per edge
    #[arg(long)]
    pub grid_points: Option<usize>,

    /// Append chemical potentials to the result table
    #[arg(long, default_value_t = false)]
    pub append_chempots: bool,

    /// Write the result table to CSV
    #[arg(short, long)]
    pub output_csv: Option<PathBuf>,

    /// Do not compare the DOS VBM with the record VBM
    #[arg(long, default_value_t = false)]
    pub skip_vbm_check: bool,

    /// Number of parallel jobs for scans (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Hide progress bars during scans
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<FermiArgs, clap::Error> {
        let mut argv = vec!["defectkit", "fermi", "thermo.json"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        match cli.command {
            Commands::Fermi(args) => Ok(args),
            Commands::Generate(_) => panic!("expected the fermi subcommand"),
        }
    }

    #[test]
    fn test_pseudo_equilibrium_temperatures_come_in_pairs() {
        let args = parse(&["--annealing-temperature", "800", "--quenched-temperature", "300"]).unwrap();
        assert_eq!(args.annealing_temperature, Some(800.0));
        assert_eq!(args.quenched_temperature, Some(300.0));

        assert!(parse(&["--quenched-temperature", "300"]).is_err());
        assert!(parse(&["--annealing-temperature", "800"]).is_err());

        let scan = parse(&["--quenched-temperature", "300", "--scan-temperatures", "300-900:300"]).unwrap();
        assert_eq!(scan.scan_temperatures, Some(ValueRange(vec![300.0, 600.0, 900.0])));
    }

    #[test]
    fn test_quiet_flag() {
        assert!(!parse(&[]).unwrap().quiet);
        assert!(parse(&["-q"]).unwrap().quiet);
    }

    #[test]
    fn test_parse_stepped_range() {
        let r = parse_range("300-1000:100").unwrap();
        assert_eq!(r.0.len(), 8);
        assert_eq!(r.0[0], 300.0);
        assert_eq!(r.0[7], 1000.0);

        let r = parse_range("300-650:100").unwrap();
        assert_eq!(r.0, vec![300.0, 400.0, 500.0, 600.0, 650.0]);
    }

    #[test]
    fn test_parse_value_list() {
        assert_eq!(parse_range("300, 500").unwrap().0, vec![300.0, 500.0]);
        assert!(parse_range("1000-300:100").is_err());
        assert!(parse_range("abc").is_err());
    }
}
