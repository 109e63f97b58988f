//! # 统一错误处理模块
//!
//! 定义 defectkit 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// defectkit 统一错误类型
#[derive(Error, Debug)]
pub enum DefectError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 参数校验错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "Unrecognised `backend`: {0}. Must be either \"doped\" or \"py-sc-fermi\"."
    )]
    UnrecognisedBackend(String),

    #[error(
        "No bulk DOS calculation (`bulk_dos`) provided or attached to the defect thermodynamics \
         record, which is required for the Fermi solver."
    )]
    MissingDos,

    #[error("Limit '{limit}' not found in the chemical potentials! Available limits: {available:?}")]
    LimitNotFound {
        limit: String,
        available: Vec<String>,
    },

    #[error(
        "Both `annealing_temperature_range` and `temperature_range` were set, but only one mode \
         (pseudo-equilibrium or equilibrium) can be scanned at a time."
    )]
    ConflictingTemperatureRanges,

    #[error("No chemical potentials supplied and none are attached to the thermodynamics record: {0}")]
    MissingChempots(String),

    #[error(
        "Only one chemical potential limit is present in \
         `chempots`/`self.defect_thermodynamics.chempots`, which makes no sense for a chemical \
         potential grid scan"
    )]
    SingleChempotLimit,

    #[error(
        "If `chempots` is a list, it must contain exactly two chemical potential dictionaries \
         (start and end points), but got {found}"
    )]
    InvalidChempotCount { found: usize },

    // ─────────────────────────────────────────────────────────────
    // 一致性错误
    // ─────────────────────────────────────────────────────────────
    #[error(
        "Value must be a DefectEntry whose defect structure matches the primitive structure of \
         this generator: {0}"
    )]
    StructureMismatch(String),

    #[error(
        "The supercell of entry '{name}' does not match the supercell generated from its defect \
         with the shared supercell matrix"
    )]
    SupercellMismatch { name: String },

    #[error("Expected exactly one dummy site in the defect supercell, found {found}")]
    DummySiteCount { found: usize },

    #[error("Supercell site count mismatch: expected {expected}, generated {found}")]
    SiteCountMismatch { expected: usize, found: usize },

    // ─────────────────────────────────────────────────────────────
    // 对称性 / 超胞错误
    // ─────────────────────────────────────────────────────────────
    #[error("Symmetry analysis failed: {0}")]
    Symmetry(String),

    #[error(
        "Unable to find a supercell matrix with perpendicular widths >= {min_length} Å and at most \
         {max_atoms} atoms"
    )]
    SupercellNotFound { min_length: f64, max_atoms: usize },

    // ─────────────────────────────────────────────────────────────
    // 后端错误
    // ─────────────────────────────────────────────────────────────
    #[error("{message}")]
    BackendUnavailable { message: String },

    #[error(
        "This function is only supported for the {required} backend, but you are using the \
         {current} backend!"
    )]
    BackendUnsupported { required: String, current: String },

    // ─────────────────────────────────────────────────────────────
    // 数值错误
    // ─────────────────────────────────────────────────────────────
    #[error("Root not bracketed in [{lower}, {upper}]")]
    RootNotBracketed { lower: f64, upper: f64 },

    #[error("Root finding did not converge within {iterations} iterations")]
    NoConvergence { iterations: usize },

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, DefectError>;
